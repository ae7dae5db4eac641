// SPDX-License-Identifier: MIT

//! Readiness polling
//!
//! A bounded loop inside one step invocation. It never suspends the session.

use std::time::{Duration, Instant};

use super::{Device, DeviceProvider};
use crate::forge::config::ReadinessConfig;
use crate::forge::error::DeviceError;

/// How often and for how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

impl From<&ReadinessConfig> for PollPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self::new(
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.max_wait_secs),
        )
    }
}

/// Poll until the named device is booted *and* passes its readiness check.
///
/// Each poll re-lists devices. A failing readiness command counts as "not ready
/// yet"; a failing listing aborts the wait.
pub async fn wait_until_ready(
    provider: &dyn DeviceProvider,
    name: &str,
    policy: PollPolicy,
) -> Result<Device, DeviceError> {
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        let devices = provider.list().await?;

        if let Some(device) = devices.into_iter().find(|d| d.matches(name)) {
            if device.is_booted() {
                match provider.check_ready(&device).await {
                    Ok(true) => {
                        log::info!(
                            "{} device '{}' ready after {} polls ({:?})",
                            provider.platform(),
                            name,
                            polls,
                            started.elapsed()
                        );
                        return Ok(device);
                    }
                    Ok(false) => log::debug!("Device '{}' booted but not responsive yet", name),
                    Err(e) => log::debug!("Readiness check of '{}' failed: {}", name, e),
                }
            } else {
                log::debug!("Device '{}' is {:?}", name, device.state);
            }
        } else {
            log::debug!("Device '{}' not listed yet", name);
        }

        let elapsed = started.elapsed();
        if elapsed + policy.interval > policy.max_wait {
            log::warn!("Device '{}' not ready after {:?}", name, elapsed);
            return Err(DeviceError::ReadinessTimeout {
                name: name.to_string(),
                elapsed,
            });
        }
        tokio::time::sleep(policy.interval).await;
    }
}
