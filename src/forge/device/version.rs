// SPDX-License-Identifier: MIT

//! Version ordinals and best-candidate selection

use super::Device;

/// Ranking ordinal of a dotted `MAJOR.MINOR[.PATCH]` version:
/// `MAJOR * 1000 + MINOR * 10 + PATCH`.
///
/// Missing or non-numeric parts count as 0. Only meant for ordering.
pub fn parse_version(version: &str) -> u32 {
    let mut parts = version
        .trim()
        .split(['.', '-'])
        .map(|p| p.trim().parse::<u32>().unwrap_or(0));

    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);

    major
        .saturating_mul(1000)
        .saturating_add(minor.saturating_mul(10))
        .saturating_add(patch)
}

/// Pick the device to deploy to.
///
/// A booted device wins outright (the first one listed). Otherwise the highest
/// version wins, with the earliest-listed device winning ties. `None` means
/// "create one", not failure.
pub fn select_best(devices: &[Device]) -> Option<&Device> {
    if let Some(booted) = devices.iter().find(|d| d.is_booted()) {
        return Some(booted);
    }

    devices.iter().fold(None, |best: Option<&Device>, d| match best {
        Some(b) if b.version >= d.version => Some(b),
        _ => Some(d),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::device::DeviceState;

    fn device(name: &str, version: &str, state: DeviceState) -> Device {
        Device::new(name, name, version, state)
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("18.0"), 18000);
        assert_eq!(parse_version("17.5"), 17050);
        assert_eq!(parse_version("17.5.1"), 17051);
        assert_eq!(parse_version("14"), 14000);
        assert_eq!(parse_version("17-5"), 17050);
        assert_eq!(parse_version(""), 0);
        assert_eq!(parse_version("beta"), 0);
    }

    #[test]
    fn test_version_ordering() {
        assert!(parse_version("18.0") > parse_version("17.5"));
        assert!(parse_version("17.5.1") > parse_version("17.5"));
    }

    #[test]
    fn test_highest_version_wins_when_none_booted() {
        let devices = vec![
            device("iOS-17.5", "17.5", DeviceState::Shutdown),
            device("iOS-18.0", "18.0", DeviceState::Shutdown),
        ];
        assert_eq!(select_best(&devices).unwrap().name, "iOS-18.0");
    }

    #[test]
    fn test_booted_wins_regardless_of_version() {
        let devices = vec![
            device("iOS-17.5", "17.5", DeviceState::Shutdown),
            device("iOS-14", "14", DeviceState::Booted),
        ];
        assert_eq!(select_best(&devices).unwrap().name, "iOS-14");
    }

    #[test]
    fn test_tie_keeps_first_listed() {
        let devices = vec![
            device("first", "17.5", DeviceState::Shutdown),
            device("second", "17.5", DeviceState::Shutdown),
        ];
        assert_eq!(select_best(&devices).unwrap().name, "first");
    }

    #[test]
    fn test_booting_is_not_booted() {
        let devices = vec![
            device("old", "12.0", DeviceState::Booting),
            device("new", "13.0", DeviceState::Shutdown),
        ];
        assert_eq!(select_best(&devices).unwrap().name, "new");
    }

    #[test]
    fn test_empty_is_none() {
        assert!(select_best(&[]).is_none());
    }
}
