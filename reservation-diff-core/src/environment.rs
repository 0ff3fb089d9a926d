//! Isolated deployment targets and the registry that resolves them.
//!
//! Every engine operation takes an [`Environment`] explicitly. The registry is
//! built once from configuration and never falls back to a default target:
//! unknown identifiers and unresolvable credentials are errors.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::reservation::MacPrefix;

/// Short symbolic name of an environment (`dev`, `stage`, `prod`, ...).
///
/// Restricted to `[A-Za-z0-9_-]` because it keys persisted files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnvironmentId(String);

impl EnvironmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EnvironmentId {
    type Err = ReconcileError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ReconcileError::InvalidEnvironmentId(raw.to_string()))
        }
    }
}

impl TryFrom<String> for EnvironmentId {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EnvironmentId> for String {
    fn from(id: EnvironmentId) -> Self {
        id.0
    }
}

impl Display for EnvironmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque API secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// How to reach the controller that owns an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub base_url: String,
    pub verify_tls: bool,
    pub timeout: Duration,
}

/// One resolved deployment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: EnvironmentId,
    pub display_name: String,
    /// Site short name on the controller.
    pub host_label: String,
    pub connection: Connection,
    pub credential: Credential,
    pub protected_prefixes: Vec<MacPrefix>,
}

/// Environment entry as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub id: String,
    pub display_name: String,
    pub host_label: String,
    pub base_url: String,
    /// Name of the secret holding the API key, e.g. `UNIFI_API_KEY_PROD`.
    pub api_key_env: String,
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub protected_prefixes: Vec<MacPrefix>,
}

fn default_verify_tls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

/// Resolves credential references to secret values.
pub trait SecretSource: Send + Sync {
    fn lookup(&self, reference: &str) -> Option<String>;
}

/// Reads secrets from process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn lookup(&self, reference: &str) -> Option<String> {
        std::env::var(reference).ok()
    }
}

impl SecretSource for HashMap<String, String> {
    fn lookup(&self, reference: &str) -> Option<String> {
        self.get(reference).cloned()
    }
}

/// Read-only mapping from identifier to environment.
pub struct EnvironmentRegistry {
    configs: Vec<EnvironmentConfig>,
    secrets: Box<dyn SecretSource>,
}

impl EnvironmentRegistry {
    /// Validate identifiers up front. Credentials resolve lazily in [`Self::resolve`]
    /// so a run against `dev` does not need the `prod` key.
    ///
    /// Identifiers equal up to ASCII case are duplicates: they share a state
    /// file on case-insensitive filesystems.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::InvalidEnvironmentId`] or [`ReconcileError::DuplicateEnvironment`].
    pub fn new(
        configs: Vec<EnvironmentConfig>,
        secrets: Box<dyn SecretSource>,
    ) -> Result<Self, ReconcileError> {
        let mut seen = HashSet::new();
        for config in &configs {
            config.id.parse::<EnvironmentId>()?;
            if !seen.insert(config.id.to_ascii_lowercase()) {
                return Err(ReconcileError::DuplicateEnvironment(config.id.clone()));
            }
        }
        Ok(Self { configs, secrets })
    }

    pub fn configs(&self) -> &[EnvironmentConfig] {
        &self.configs
    }

    /// Resolve one identifier into a complete environment.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::UnknownEnvironment`] when the identifier is not
    /// configured and [`ReconcileError::MissingCredential`] when its secret is
    /// unset or blank.
    pub fn resolve(&self, identifier: &str) -> Result<Environment, ReconcileError> {
        let config = self
            .configs
            .iter()
            .find(|c| c.id == identifier)
            .ok_or_else(|| ReconcileError::UnknownEnvironment(identifier.to_string()))?;
        let id: EnvironmentId = config.id.parse()?;

        let secret = self
            .secrets
            .lookup(&config.api_key_env)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ReconcileError::MissingCredential {
                environment: id.clone(),
                reference: config.api_key_env.clone(),
            })?;

        Ok(Environment {
            id,
            display_name: config.display_name.clone(),
            host_label: config.host_label.clone(),
            connection: Connection {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                verify_tls: config.verify_tls,
                timeout: Duration::from_secs(config.timeout_secs),
            },
            credential: Credential::new(secret),
            protected_prefixes: config.protected_prefixes.clone(),
        })
    }
}
