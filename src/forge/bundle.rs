// SPDX-License-Identifier: MIT

//! Bundle identifier extraction from Xcode projects

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use super::error::BundleError;
use crate::engine::fs::FileSystem;

static BUNDLE_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"PRODUCT_BUNDLE_IDENTIFIER\s*=\s*"?([^";\n]+?)"?\s*;"#).ok());

static PLACEHOLDER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\$\{[^}]*\}|\$\([^)]*\)").ok());

/// True when `value` still contains a `${VAR}` or `$(VAR)` build variable
pub fn has_placeholder(value: &str) -> bool {
    PLACEHOLDER.as_ref().is_some_and(|re| re.is_match(value))
}

/// The single `*.xcodeproj` directory directly under `dir`
pub fn find_xcodeproj(fs: &dyn FileSystem, dir: &Path) -> Result<PathBuf, BundleError> {
    let entries = fs.read_dir(dir).map_err(|source| BundleError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut projects: Vec<PathBuf> = entries
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "xcodeproj") && fs.is_dir(p))
        .collect();

    match projects.len() {
        0 => Err(BundleError::NoProject(dir.to_path_buf())),
        1 => Ok(projects.remove(0)),
        _ => Err(BundleError::AmbiguousProject {
            dir: dir.to_path_buf(),
            found: projects
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}

/// Pull the app's bundle identifier out of `project.pbxproj` contents.
///
/// Test targets (`...Tests`) are skipped. The first resolved identifier wins;
/// if every candidate still has a build variable the result is
/// `UnresolvedBundleId`, and `None` means no assignment was found at all.
pub fn parse_bundle_id(contents: &str) -> Option<Result<String, String>> {
    let re = BUNDLE_ID.as_ref()?;
    let mut unresolved = None;

    for caps in re.captures_iter(contents) {
        let Some(value) = caps.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if value.is_empty() || value.ends_with("Tests") {
            continue;
        }
        if has_placeholder(value) {
            unresolved.get_or_insert_with(|| value.to_string());
            continue;
        }
        return Some(Ok(value.to_string()));
    }

    unresolved.map(Err)
}

/// Bundle identifier of the iOS project under `project_dir`
pub fn extract_bundle_id(fs: &dyn FileSystem, project_dir: &Path) -> Result<String, BundleError> {
    let xcodeproj = find_xcodeproj(fs, project_dir)?;
    let pbxproj = xcodeproj.join("project.pbxproj");

    let bytes = fs.read(&pbxproj).map_err(|source| BundleError::Io {
        path: pbxproj.clone(),
        source,
    })?;
    let contents = String::from_utf8_lossy(&bytes);

    match parse_bundle_id(&contents) {
        Some(Ok(id)) => {
            log::info!("Bundle identifier: {}", id);
            Ok(id)
        }
        Some(Err(raw)) => Err(BundleError::UnresolvedBundleId(raw)),
        None => Err(BundleError::BundleIdNotFound(pbxproj)),
    }
}
