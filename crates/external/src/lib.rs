//! Argonaut external reconcilers.
//!
//! One [`ExternalClient`](argonaut_core::ExternalClient) per managed kind,
//! composing the Argo CD service, the secret resolver, late-initialization
//! and comparison. Reconcilers keep no state between calls.

#![forbid(unsafe_code)]

use argonaut_argocd::{classify, RemoteError};
use argonaut_core::{ErrorKind, Operation, ReconcileError, ReconcileResult, SecretKeySelector};
use argonaut_kubehub::SecretResolver;

pub mod cluster;
pub mod repository;
pub mod token;

pub use cluster::ClusterExternal;
pub use repository::RepositoryExternal;
pub use token::ProjectTokenExternal;

/// Tag a remote failure with the operation and its classification.
pub(crate) fn remote_error(op: Operation, err: RemoteError) -> ReconcileError {
    let kind = classify(&err);
    ReconcileError::remote(op, kind, err)
}

pub(crate) fn is_not_found(err: &RemoteError) -> bool {
    classify(err) == ErrorKind::NotFound
}

pub(crate) async fn resolve_bytes<S>(secrets: &S, selector: &SecretKeySelector) -> ReconcileResult<Vec<u8>>
where
    S: SecretResolver + ?Sized,
{
    secrets
        .resolve(selector)
        .await
        .map_err(|e| ReconcileError::Secret { selector: selector.clone(), source: Box::new(e) })
}

pub(crate) async fn resolve_string<S>(secrets: &S, selector: &SecretKeySelector) -> ReconcileResult<String>
where
    S: SecretResolver + ?Sized,
{
    let bytes = resolve_bytes(secrets, selector).await?;
    String::from_utf8(bytes).map_err(|e| ReconcileError::Secret { selector: selector.clone(), source: Box::new(e) })
}

/// Resolve an optional reference; unset stays empty.
pub(crate) async fn resolve_opt<S>(secrets: &S, selector: Option<&SecretKeySelector>) -> ReconcileResult<String>
where
    S: SecretResolver + ?Sized,
{
    match selector {
        Some(sel) => resolve_string(secrets, sel).await,
        None => Ok(String::new()),
    }
}

pub(crate) fn connection_state(
    s: &argonaut_argocd::ConnectionState,
) -> argonaut_apis::ConnectionStateObservation {
    argonaut_apis::ConnectionStateObservation {
        status: s.status.clone(),
        message: s.message.clone(),
        attempted_at: s.attempted_at.clone(),
    }
}
