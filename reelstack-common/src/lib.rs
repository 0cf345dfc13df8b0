//! Common types shared between the reelstack CLI and its deployment engine

pub mod retry;

use serde::{Deserialize, Serialize};

/// Kind of cloud resource managed by the deployment flow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Storage,   // blob storage with static-site hosting
    Database,  // document database
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::Database => write!(f, "database"),
        }
    }
}

/// Immutable description of a resource to create.
///
/// Built once at invocation start and only re-read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub kind: ResourceKind,
    pub region: String,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, kind: ResourceKind, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            region: region.into(),
        }
    }
}

/// Asynchronous provisioning lifecycle of a cloud resource.
///
/// Only the provider mutates this; the deployment flow reads it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProvisioningState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl ProvisioningState {
    /// Whether the provider will make no further transitions from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A provisioned resource as reported by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub region: String,
    pub state: ProvisioningState,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Deployment error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transient remote failure, eligible for retry
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The provider reported a terminal Failed state; never auto-retried
    #[error("provisioning failed for resource '{0}'")]
    ProvisioningFailed(String),

    /// A record that cannot be imported; skipped, never fatal to a batch
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// Required configuration (credential, endpoint) is absent or invalid
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("system error: {0}")]
    System(String),
}

impl Error {
    /// Whether the retry coordinator may absorb this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
