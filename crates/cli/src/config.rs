//! CLI configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use coursetrack_assessment::AssessmentConfig;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `storage_path`.
pub const STORAGE_ENV: &str = "COURSETRACK_STORAGE";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "coursetrack.toml";

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Volatile, lost on exit
    Memory,
    /// One JSON file per entity
    #[default]
    Json,
    /// SQLite database file (requires the `sqlite` feature)
    Sqlite,
}

/// Top-level coursetrack configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseTrackConfig {
    /// Directory holding the store.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// Storage backend.
    #[serde(default)]
    pub backend: Backend,
    /// Width of the "closing soon" window for deadlines.
    #[serde(default = "default_closing_soon_hours")]
    pub closing_soon_hours: i64,
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".coursetrack")
}
fn default_closing_soon_hours() -> i64 {
    48
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CourseTrackConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            backend: Backend::default(),
            closing_soon_hours: default_closing_soon_hours(),
            log_level: default_log_level(),
        }
    }
}

impl CourseTrackConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: CourseTrackConfig =
            toml::from_str(content).context("failed to parse coursetrack config")?;
        config.assessment()?;
        Ok(config)
    }

    /// Assessment settings derived from this config.
    pub fn assessment(&self) -> Result<AssessmentConfig> {
        AssessmentConfig::with_closing_soon_hours(self.closing_soon_hours)
            .context("invalid coursetrack config")
    }

    /// Replace the storage path when an override is present and non-empty.
    pub fn with_storage_override(mut self, path: Option<String>) -> Self {
        if let Some(path) = path.filter(|p| !p.trim().is_empty()) {
            self.storage_path = PathBuf::from(path);
        }
        self
    }
}

/// Load config from an explicit path, or from `./coursetrack.toml`, or fall
/// back to defaults. `COURSETRACK_STORAGE` is applied last.
pub fn load_config_from(path: Option<&Path>) -> Result<CourseTrackConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(LOCAL_CONFIG);
            local.exists().then_some(local)
        }
    };

    let config = match config_path {
        Some(p) => {
            let content = std::fs::read_to_string(&p)
                .with_context(|| format!("failed to read config: {}", p.display()))?;
            CourseTrackConfig::from_toml(&content)?
        }
        None => CourseTrackConfig::default(),
    };

    Ok(config.with_storage_override(std::env::var(STORAGE_ENV).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = CourseTrackConfig::from_toml("backend = \"sqlite\"").unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.closing_soon_hours, 48);
        assert_eq!(config.storage_path, PathBuf::from(".coursetrack"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_full_config() {
        let config = CourseTrackConfig::from_toml(
            r#"
            storage_path = "/var/lib/coursetrack"
            backend = "memory"
            closing_soon_hours = 24
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/coursetrack"));
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.closing_soon_hours, 24);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CourseTrackConfig::from_toml("backend = \"postgres\"").is_err());
        assert!(CourseTrackConfig::from_toml("closing_soon_hours = -1").is_err());
    }

    #[test]
    fn test_huge_closing_soon_window_is_an_error() {
        let err = CourseTrackConfig::from_toml("closing_soon_hours = 9999999999999").unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));

        let config = CourseTrackConfig {
            closing_soon_hours: i64::MAX,
            ..CourseTrackConfig::default()
        };
        assert!(config.assessment().is_err());
        assert_eq!(
            CourseTrackConfig::default().assessment().unwrap().closing_soon,
            chrono::Duration::hours(48)
        );
    }

    #[test]
    fn test_storage_override() {
        let config = CourseTrackConfig::default()
            .with_storage_override(Some("/tmp/ct".to_string()));
        assert_eq!(config.storage_path, PathBuf::from("/tmp/ct"));

        let unchanged = CourseTrackConfig::default().with_storage_override(Some("  ".to_string()));
        assert_eq!(unchanged.storage_path, PathBuf::from(".coursetrack"));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config_from(Some(&missing)).is_err());

        let present = dir.path().join("coursetrack.toml");
        std::fs::write(&present, "closing_soon_hours = 12\n").unwrap();
        let config = load_config_from(Some(&present)).unwrap();
        assert_eq!(config.closing_soon_hours, 12);
    }
}
