use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use thiserror::Error;

use crate::environment::EnvironmentId;
use crate::reservation::MacAddress;
use crate::store::StoreError;

/// Boxed error returned by controller-facing collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which address field of a record failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Mac,
    Ip,
    MacPrefix,
}

impl Display for AddressField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mac => write!(f, "MAC address"),
            Self::Ip => write!(f, "IP address"),
            Self::MacPrefix => write!(f, "MAC prefix"),
        }
    }
}

/// Side of a reconciliation a reservation set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSide {
    Desired,
    Observed,
}

impl Display for StateSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desired => write!(f, "desired"),
            Self::Observed => write!(f, "observed"),
        }
    }
}

/// Structural errors. Any of these aborts a run before the controller is touched.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A MAC or IP literal could not be parsed.
    #[error("malformed {field} '{value}': {reason}")]
    MalformedAddress {
        field: AddressField,
        value: String,
        reason: String,
    },
    /// The same MAC appears twice on one side after normalization.
    #[error("duplicate reservation for {mac} in {side} state")]
    DuplicateReservation { mac: MacAddress, side: StateSide },
    /// The controller has no site matching the environment.
    #[error("no site matching environment '{0}' on the controller")]
    EnvironmentNotFound(EnvironmentId),
    /// The requested identifier is not configured.
    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),
    /// The environment's credential reference did not resolve.
    #[error("missing credential for environment '{environment}': {reference} is not set")]
    MissingCredential {
        environment: EnvironmentId,
        reference: String,
    },
    /// Identifier contains characters that could alias another environment's files.
    #[error("invalid environment identifier '{0}': use letters, digits, '-' or '_'")]
    InvalidEnvironmentId(String),
    /// The same identifier is configured more than once.
    #[error("environment '{0}' is configured more than once")]
    DuplicateEnvironment(String),
    /// Loading or saving desired state failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The observed-state fetcher failed.
    #[error("failed to fetch observed state for '{environment}': {source}")]
    Fetch {
        environment: EnvironmentId,
        source: BoxError,
    },
}

impl ReconcileError {
    pub(crate) fn malformed(
        field: AddressField,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedAddress {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
