use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_STORAGE_KEY: &str = "enrollment-storage";
pub const CONFIG_ENV: &str = "ENROLLMENT_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the key-value storage files
    pub storage_dir: PathBuf,
    /// Name of the record the enrollment registry is persisted under
    pub storage_key: String,
    pub catalog_path: PathBuf,
    /// sqlx connection url for instructor applications
    pub database_url: String,
    /// Daily rotated log files go here, stderr when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("storage"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            catalog_path: PathBuf::from("data/catalog.json"),
            database_url: "sqlite://database/applications.db?mode=rwc".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Explicit path first, then `ENROLLMENT_CONFIG` (a `.env` file is honoured),
    /// defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let _ = dotenvy::dotenv();
        match dotenvy::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                info!("no config file given, using defaults");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollment.toml");
        std::fs::write(&path, "storage_key = \"alice-enrollments\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.storage_key, "alice-enrollments");
        assert_eq!(config.storage_dir, PathBuf::from("storage"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrollment.toml");
        std::fs::write(
            &path,
            "storage_dir = \"/tmp/enroll\"\ndatabase_url = \"sqlite::memory:\"\n",
        )
        .unwrap();
        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/enroll"));
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::from_file("/definitely/not/here.toml").is_err());
    }
}
