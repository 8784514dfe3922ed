//! Engine configuration: defaults loaded from ~/.blockbeat/config.yaml.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::backend::Waveform;
use crate::engine::state::DEFAULT_BPM;

/// Errors raised while reading an explicit config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Engine defaults. Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tempo at the start of every run.
    pub default_bpm: f64,
    /// Waveform for `tone`/`slide` when none is given or the given one is unknown.
    pub default_waveform: Waveform,
    /// Leaf volume when a command gives none.
    pub default_volume: f64,
    /// Maximum block/custom-sample nesting before an invocation is cut off.
    pub max_depth: usize,
    /// Block and custom-sample invocations allowed in one run.
    pub max_invocations: usize,
    /// Default `env_logger` filter for the command-line tool.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_bpm: DEFAULT_BPM,
            default_waveform: Waveform::Sine,
            default_volume: 1.0,
            max_depth: 64,
            max_invocations: 1_000_000,
            log_level: "warn".to_string(),
        }
    }
}

impl EngineConfig {
    /// Standard config path: ~/.blockbeat/config.yaml.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".blockbeat").join("config.yaml"))
    }

    /// Load from the standard path. Returns None if the file is missing or unreadable.
    pub fn load() -> Option<Self> {
        let path = Self::path()?;
        let content = std::fs::read_to_string(path).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    /// Load from an explicit path, reporting why it failed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}
