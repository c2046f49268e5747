//! Argonaut kubehub: the Kubernetes side of reconciliation.
//!
//! Client bootstrap, secret reference resolution, connection-secret
//! publishing and the metadata/spec/status patches the manager issues.

#![forbid(unsafe_code)]

use kube::Client;
use tracing::info;

pub mod patch;
pub mod secrets;

pub use patch::{
    add_finalizer, annotate_external_name, apply_status, external_name_patch, finalizers_patch, for_provider_patch,
    has_finalizer, patch_for_provider, remove_finalizer, status_patch, FIELD_MANAGER,
};
pub use secrets::{
    connection_secret, connection_secret_namespace, publish_connection_details, secret_value, KubeSecretResolver, SecretError, SecretResolver,
};

#[cfg(any(test, feature = "mock"))]
pub use secrets::MockSecretResolver;

/// Client from the ambient kubeconfig or in-cluster service account.
pub async fn client() -> Result<Client, kube::Error> {
    let client = Client::try_default().await?;
    info!(namespace = %client.default_namespace(), "kube client ready");
    Ok(client)
}
