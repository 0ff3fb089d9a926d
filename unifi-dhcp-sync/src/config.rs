use std::fs;
use std::path::{Path, PathBuf};

use reservation_diff_core::{
    EnvironmentConfig, EnvironmentRegistry, JsonFileStore, ReconcileError, SecretSource,
};
use serde::Deserialize;
use thiserror::Error;

/// Contents of `unifi-sync.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Directory holding one desired-state file per environment.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default, rename = "environment")]
    pub environments: Vec<EnvironmentConfig>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("reservations")
}

/// Errors returned when loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid configuration {path}: {source}")]
    Invalid {
        path: String,
        source: ReconcileError,
    },
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ToolConfig, ConfigLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw, path.display().to_string())
}

pub fn parse_config(raw: &str, path: String) -> Result<ToolConfig, ConfigLoadError> {
    toml::from_str(raw).map_err(|source| ConfigLoadError::Parse { path, source })
}

/// Everything a command needs: resolvable environments and their desired state.
pub struct Workspace {
    pub registry: EnvironmentRegistry,
    pub store: JsonFileStore,
    pub state_dir: PathBuf,
}

impl Workspace {
    /// Load `path` and validate its environments. A relative `state_dir` is
    /// taken relative to the configuration file.
    pub fn open(path: &Path, secrets: Box<dyn SecretSource>) -> Result<Self, ConfigLoadError> {
        let config = load_config(path)?;
        let state_dir = if config.state_dir.is_absolute() {
            config.state_dir.clone()
        } else {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&config.state_dir)
        };
        let registry = EnvironmentRegistry::new(config.environments, secrets).map_err(
            |source| ConfigLoadError::Invalid {
                path: path.display().to_string(),
                source,
            },
        )?;

        Ok(Self {
            registry,
            store: JsonFileStore::new(&state_dir),
            state_dir,
        })
    }
}
