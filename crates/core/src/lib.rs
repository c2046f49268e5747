//! Argonaut core types: the external client contract shared by every managed kind.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod compare;
pub mod lateinit;

pub use compare::{Comparison, FieldDiff};
pub use lateinit::{IsEmpty, LateInit};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Secret values keyed by connection detail name (e.g. `token`).
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Reference to a single key of a Kubernetes Secret.
///
/// Resolved only at the moment a remote call needs the value; the literal
/// is never written back into a spec or status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

impl fmt::Display for SecretKeySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

/// Coarse classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Other,
}

/// Remote operation tag attached to every wrapped error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{op} failed: {source}")]
    Remote {
        op: Operation,
        kind: ErrorKind,
        source: BoxError,
    },
    #[error("cannot resolve secret {selector}: {source}")]
    Secret {
        selector: SecretKeySelector,
        source: BoxError,
    },
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid external name {name:?}: {reason}")]
    InvalidExternalName { name: String, reason: String },
    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

impl ReconcileError {
    pub fn remote(op: Operation, kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        ReconcileError::Remote { op, kind, source: source.into() }
    }

    /// Classification of the underlying failure; non-remote failures are `Other`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Remote { kind, .. } => *kind,
            _ => ErrorKind::Other,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            ReconcileError::Remote { op, .. } => Some(*op),
            _ => None,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Outcome of an observe pass against the remote system.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalObservation<O> {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    /// The caller's parameters were filled in from the remote object.
    pub resource_late_initialized: bool,
    /// Remote-only state for `status.atProvider`; replaces any previous value.
    pub at_provider: Option<O>,
    /// Paths of the set parameters that differ from the remote object.
    pub diff: Vec<FieldDiff>,
    pub connection_details: ConnectionDetails,
}

impl<O> ExternalObservation<O> {
    /// The remote object does not exist.
    pub fn absent() -> Self {
        Self {
            resource_exists: false,
            resource_up_to_date: false,
            resource_late_initialized: false,
            at_provider: None,
            diff: Vec::new(),
            connection_details: ConnectionDetails::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    /// Natural key of the created object; the caller persists it.
    pub external_name: String,
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Observe/Create/Update/Delete contract for one managed kind.
///
/// Implementations hold no state between calls: every call performs exactly
/// one logical remote interaction and returns. Scheduling, retries and status
/// persistence belong to the caller.
#[async_trait::async_trait]
pub trait ExternalClient: Send + Sync {
    /// Desired parameters (`spec.forProvider`).
    type Params: Send + Sync;
    /// Observed remote state (`status.atProvider`).
    type Observation: Send + Sync;

    /// Fetch the remote object. May fill unset fields of `params` from it.
    async fn observe(
        &self,
        params: &mut Self::Params,
        external_name: &str,
    ) -> ReconcileResult<ExternalObservation<Self::Observation>>;

    /// Fill parameters that must be fixed before the first create, so a
    /// retried create targets the same remote identity. Returns whether
    /// `params` changed and must be persisted first.
    fn initialize(&self, _params: &mut Self::Params) -> bool { false }

    async fn create(&self, params: &Self::Params) -> ReconcileResult<ExternalCreation>;

    /// Full replace of the remote object identified by `external_name`.
    async fn update(&self, params: &Self::Params, external_name: &str) -> ReconcileResult<ExternalUpdate>;

    /// Delete the remote object; absence counts as success.
    async fn delete(&self, external_name: &str) -> ReconcileResult<()>;
}

pub mod prelude {
    pub use super::{
        Comparison, ConnectionDetails, ErrorKind, ExternalClient, ExternalCreation, ExternalObservation,
        ExternalUpdate, FieldDiff, LateInit, Operation, ReconcileError, ReconcileResult, SecretKeySelector,
    };
}
