use argonaut_core::{ErrorKind, ReconcileError};
use argonaut_kubehub::SecretError;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("kube api: {0}")]
    Kube(#[from] kube::Error),
    #[error("connection secret: {0}")]
    Secret(#[from] SecretError),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
}

impl ManagerError {
    /// Classification of the remote failure behind this error, if any.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::Reconcile(e) => e.kind(),
            _ => ErrorKind::Other,
        }
    }
}
