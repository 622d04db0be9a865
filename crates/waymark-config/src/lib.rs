//! # waymark-config
//!
//! Settings and on-disk layout for Waymark.
//!
//! Per-project state lives under a `.waymark/` directory in the project
//! root: the SQLite database plus an optional `config.toml`. A missing
//! config file means defaults — no setup step is required before the
//! first command.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading settings or preparing the data directory.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// QA review settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSettings {
    /// Review turns granted before completion auto-commits.
    pub default_turn_limit: u32,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            default_turn_limit: 5,
        }
    }
}

/// Claim lease settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimSettings {
    /// How long a stored claim holds before other workers may take over.
    pub claim_duration_minutes: i64,
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            claim_duration_minutes: 30,
        }
    }
}

/// Project settings, loaded from `.waymark/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub qa: QaSettings,
    pub claims: ClaimSettings,
}

impl Settings {
    /// Load settings from a TOML file; an absent file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Where a project keeps its Waymark state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// The project root the CLI was pointed at.
    pub project_root: PathBuf,
    /// The `.waymark/` data directory.
    pub data_dir: PathBuf,
    /// The SQLite database file.
    pub database: PathBuf,
    /// The optional settings file.
    pub config_file: PathBuf,
}

impl Layout {
    /// Standard `.waymark/` layout for a project root.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let data_dir = root.join(".waymark");
        Self {
            database: data_dir.join("waymark.db"),
            config_file: data_dir.join("config.toml"),
            project_root: root,
            data_dir,
        }
    }

    /// Create the data directory if needed and load the settings.
    pub fn prepare(&self) -> Result<Settings, ConfigError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::Io {
            path: self.data_dir.display().to_string(),
            source,
        })?;
        Settings::load(&self.config_file)
    }
}
