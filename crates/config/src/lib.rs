//! Shared configuration directory for estatedesk tools
//!
//! Every estatedesk binary keeps its settings and cached credentials under
//! one directory (`~/.config/estatedesk/` on Linux). This crate resolves that
//! directory and reads/writes JSON documents inside it.
//!
//! Call [`init`] once at startup so later writes never race on directory
//! creation.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the per-user directory under the platform config root
const APP_DIR: &str = "estatedesk";

/// Environment variable that relocates the config directory (tests, sandboxes)
const DIR_OVERRIDE_ENV: &str = "ESTATEDESK_CONFIG_DIR";

/// Create the config directory if needed and return its path.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// The estatedesk config directory.
///
/// `ESTATEDESK_CONFIG_DIR` wins over the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(DIR_OVERRIDE_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Path of `filename` inside the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Whether `filename` exists inside the config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Load and parse a JSON document from the config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load a JSON document from the config directory, or `T::default()` when
/// the file does not exist. A file that exists but fails to parse is an error.
pub fn load_json_or_default<T: DeserializeOwned + Default>(filename: &str) -> Result<T> {
    if !config_exists(filename) {
        return Ok(T::default());
    }
    load_json(filename)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Serialize `value` as pretty JSON into the config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Serialize `value` as pretty JSON to an arbitrary path, creating parents
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        label: String,
        limit: u32,
    }

    #[test]
    fn test_config_path_is_inside_config_dir() {
        let dir = config_dir().unwrap();
        let path = config_path("mailbox.json").unwrap();
        assert_eq!(path.parent(), Some(dir.as_path()));
        assert!(path.ends_with("mailbox.json"));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("sample.json");
        let value = Sample {
            label: "INBOX".to_string(),
            limit: 25,
        };

        save_json_file(&path, &value).unwrap();
        let loaded: Sample = load_json_file(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_load_json_file_reports_path() {
        let missing = Path::new("/definitely/not/here.json");
        let err = load_json_file::<Sample>(missing).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
