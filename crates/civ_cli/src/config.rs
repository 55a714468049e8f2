//! Runtime configuration for the front end.
//!
//! Loaded from an optional RON file. Every field has a default, so an
//! empty file `()` is a valid configuration, and command line flags
//! override whatever the file says.
//!
//! ```ron
//! (
//!     tick_millis: 500,
//!     save_dir: "data/saves",
//!     max_catch_up_ticks: Some(86400),
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use civ_core::clock::DEFAULT_TICK_MILLIS;
use civ_core::data::{ContentData, ContentError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// Failed to read config file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse RON data.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Front end configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Real-time length of one tick in milliseconds.
    pub tick_millis: u64,
    /// Directory holding save files.
    pub save_dir: PathBuf,
    /// Save slot used for autosaves and for resuming.
    pub autosave: String,
    /// Autosave every this many ticks; zero saves only on quit.
    pub autosave_interval: u64,
    /// Upper bound on ticks replayed for offline progress.
    pub max_catch_up_ticks: Option<u64>,
    /// Content file to play instead of the built-in classic content.
    pub content_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            tick_millis: DEFAULT_TICK_MILLIS,
            save_dir: PathBuf::from("data/saves"),
            autosave: "autosave".to_string(),
            autosave_interval: 300,
            max_catch_up_ticks: None,
            content_path: None,
        }
    }
}

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `--tick-millis`
    pub tick_millis: Option<u64>,
    /// `--content`
    pub content_path: Option<PathBuf>,
    /// `--save-dir`
    pub save_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Load configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and check configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Apply command line overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(millis) = overrides.tick_millis {
            self.tick_millis = millis;
        }
        if let Some(path) = overrides.content_path {
            self.content_path = Some(path);
        }
        if let Some(dir) = overrides.save_dir {
            self.save_dir = dir;
        }
        self
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_millis == 0 {
            return Err(ConfigError::Invalid("tick_millis must be at least 1".to_string()));
        }
        if self.autosave.trim().is_empty() {
            return Err(ConfigError::Invalid("autosave slot name is empty".to_string()));
        }
        Ok(())
    }

    /// Real-time length of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    /// The configured content, or the classic content when none is set.
    pub fn load_content(&self) -> Result<ContentData, ContentError> {
        match &self.content_path {
            Some(path) => ContentData::load(path),
            None => Ok(ContentData::classic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CliConfig::from_ron_str("()").unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_config() {
        let config =
            CliConfig::from_ron_str("(tick_millis: 250, max_catch_up_ticks: Some(100))").unwrap();
        assert_eq!(config.tick_millis, 250);
        assert_eq!(config.max_catch_up_ticks, Some(100));
        assert_eq!(config.autosave, "autosave");
    }

    #[test]
    fn test_zero_tick_rejected() {
        let err = CliConfig::from_ron_str("(tick_millis: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = CliConfig::load("/nonexistent/civ.ron").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civ.ron");
        std::fs::write(&path, "(save_dir: \"elsewhere\")").unwrap();

        let config = CliConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.save_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_overrides_win() {
        let config = CliConfig::default().with_overrides(Overrides {
            tick_millis: Some(50),
            content_path: Some(PathBuf::from("mod.ron")),
            save_dir: None,
        });
        assert_eq!(config.tick_millis, 50);
        assert_eq!(config.content_path, Some(PathBuf::from("mod.ron")));
        assert_eq!(config.save_dir, PathBuf::from("data/saves"));
    }

    #[test]
    fn test_default_content_is_classic() {
        let content = CliConfig::default().load_content().unwrap();
        assert_eq!(content, ContentData::classic());
    }
}
