//! Configuration module for termsearch
//!
//! Handles loading and validating settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a settings file
pub const SETTINGS_PATH_ENV: &str = "TERMSEARCH_SETTINGS_PATH";

/// Candidate settings files, most specific first
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("settings.yml"));
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("termsearch").join("settings.yml"));
    }
    paths
}

/// Load settings from the first existing candidate file, apply environment
/// overrides and validate the result.
///
/// An explicitly given path must exist.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("settings file {} does not exist", path.display());
        }
    }

    let found = candidate_paths(explicit).into_iter().find(|p| p.exists());
    let mut settings = match found {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            Settings::from_file(&path)
                .with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            debug!("No settings file found, using defaults");
            Settings::default()
        }
    };

    settings.merge_env();
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        std::fs::write(&path, "search:\n  results_per_page: 7\n").unwrap();

        let settings = load(Some(&path)).unwrap();
        assert!(settings.search.results_per_page > 0);
        assert_eq!(candidate_paths(Some(&path))[0], path);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("nope.yml"))).is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        std::fs::write(&path, "search:\n  results_per_page: 0\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
