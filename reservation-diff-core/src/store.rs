use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::environment::EnvironmentId;
use crate::reservation::{RawReservation, ReservationSet};

/// Errors raised while reading or writing desired state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No desired state has been recorded for the environment yet.
    #[error("no desired state for environment '{environment}' at {path}")]
    Missing {
        environment: EnvironmentId,
        path: String,
    },
    #[error("failed to access desired state {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse desired state {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("failed to render desired state {path}: {source}")]
    Render {
        path: String,
        source: serde_json::Error,
    },
}

/// Version-controlled definition of what reservations should exist.
pub trait DesiredStateStore {
    /// Raw records for one environment. Validation happens in the engine.
    fn load(&self, environment: &EnvironmentId) -> Result<Vec<RawReservation>, StoreError>;

    /// Replace the environment's records with `reservations`.
    fn save(
        &self,
        environment: &EnvironmentId,
        reservations: &ReservationSet,
    ) -> Result<(), StoreError>;
}

/// One pretty-printed JSON array per environment: `<root>/<environment>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, environment: &EnvironmentId) -> PathBuf {
        self.root.join(format!("{environment}.json"))
    }
}

impl DesiredStateStore for JsonFileStore {
    fn load(&self, environment: &EnvironmentId) -> Result<Vec<RawReservation>, StoreError> {
        let path = self.path_for(environment);
        if !path.exists() {
            return Err(StoreError::Missing {
                environment: environment.clone(),
                path: path.display().to_string(),
            });
        }
        let raw = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        parse_records(&raw, &path)
    }

    fn save(
        &self,
        environment: &EnvironmentId,
        reservations: &ReservationSet,
    ) -> Result<(), StoreError> {
        let path = self.path_for(environment);
        fs::create_dir_all(&self.root).map_err(|source| io_error(&self.root, source))?;

        let mut body = render_records(reservations, &path)?;
        body.push('\n');

        // Staged write; the target only ever holds a complete file.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|source| io_error(&staging, source))?;
        fs::rename(&staging, &path).map_err(|source| io_error(&path, source))?;
        Ok(())
    }
}

/// Parse a JSON array of records.
pub fn parse_records(raw: &str, path: &Path) -> Result<Vec<RawReservation>, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Render records in MAC order, exactly the four reservation fields each.
pub fn render_records(reservations: &ReservationSet, path: &Path) -> Result<String, StoreError> {
    serde_json::to_string_pretty(&reservations.to_raw()).map_err(|source| StoreError::Render {
        path: path.display().to_string(),
        source,
    })
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
