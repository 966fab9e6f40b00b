//! Engine configuration loaded from TOML.
//!
//! ```toml
//! max_undo_steps = 200
//! undo_size_limit_mb = 128
//! lock_timeout_ms = 500
//! backup_period_secs = 30
//! ```
//!
//! Every key is optional; missing keys take their default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::undo::DEFAULT_MAX_UNDO;

/// Error returned when a configuration file cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Limits and timings for the undo engine and its background services.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UndoConfig {
    /// Maximum number of entries kept in an undo history.
    pub max_undo_steps: usize,
    /// Memory budget of an undo history, in megabytes.
    pub undo_size_limit_mb: usize,
    /// Default timeout for interactive lock attempts, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Period between two backup passes, in seconds.
    pub backup_period_secs: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_undo_steps: DEFAULT_MAX_UNDO,
            undo_size_limit_mb: 64,
            lock_timeout_ms: 250,
            backup_period_secs: 60,
        }
    }
}

impl UndoConfig {
    /// Parses a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads a config, falling back to defaults if the file is missing or
    /// malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded undo config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("No usable undo config ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Memory budget in bytes, saturating on overflow.
    pub fn undo_size_limit_bytes(&self) -> usize {
        self.undo_size_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn backup_period(&self) -> Duration {
        Duration::from_secs(self.backup_period_secs)
    }
}
