//! Secret reference resolution and connection-secret publishing.

use argonaut_apis::SecretReference;
use argonaut_core::{ConnectionDetails, SecretKeySelector};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::debug;

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

use crate::patch::FIELD_MANAGER;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("secret {namespace}/{name} has no key {key:?}")]
    MissingKey { namespace: String, name: String, key: String },
    #[error("connection secret {name} needs a namespace")]
    MissingNamespace { name: String },
    #[error("connection secret {namespace}/{name} must live in the owner's namespace {owner_namespace}")]
    ForeignNamespace { name: String, namespace: String, owner_namespace: String },
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Resolves a secret key reference to its bytes. Every call is a fresh read.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, selector: &SecretKeySelector) -> Result<Vec<u8>, SecretError>;
}

#[derive(Clone)]
pub struct KubeSecretResolver {
    client: Client,
}

impl KubeSecretResolver {
    pub fn new(client: Client) -> Self { Self { client } }
}

#[async_trait]
impl SecretResolver for KubeSecretResolver {
    async fn resolve(&self, selector: &SecretKeySelector) -> Result<Vec<u8>, SecretError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &selector.namespace);
        debug!(secret = %selector, "resolving secret reference");
        match api.get_opt(&selector.name).await? {
            Some(secret) => secret_value(&secret, selector),
            None => Err(SecretError::NotFound {
                namespace: selector.namespace.clone(),
                name: selector.name.clone(),
            }),
        }
    }
}

/// Value of `selector.key` in the secret's `data`.
pub fn secret_value(secret: &Secret, selector: &SecretKeySelector) -> Result<Vec<u8>, SecretError> {
    let value = secret.data.as_ref().and_then(|d| d.get(&selector.key)).map(|b| b.0.clone());
    value.ok_or_else(|| SecretError::MissingKey {
        namespace: selector.namespace.clone(),
        name: selector.name.clone(),
        key: selector.key.clone(),
    })
}

/// Namespace the connection secret is written to.
///
/// A namespaced owner keeps its secret in its own namespace: owner references
/// cannot cross namespaces and the garbage collector would reap the secret.
pub fn connection_secret_namespace(
    target: &SecretReference,
    owner_namespace: Option<&str>,
) -> Result<String, SecretError> {
    match (target.namespace.as_deref(), owner_namespace) {
        (Some(ns), Some(owner)) if ns != owner => Err(SecretError::ForeignNamespace {
            name: target.name.clone(),
            namespace: ns.to_string(),
            owner_namespace: owner.to_string(),
        }),
        (Some(ns), _) => Ok(ns.to_string()),
        (None, Some(owner)) => Ok(owner.to_string()),
        (None, None) => Err(SecretError::MissingNamespace { name: target.name.clone() }),
    }
}

/// Secret carrying connection details, owned by the managed resource.
pub fn connection_secret(
    name: &str,
    namespace: &str,
    owner: Option<OwnerReference>,
    details: &ConnectionDetails,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        data: Some(details.iter().map(|(k, v)| (k.clone(), ByteString(v.clone()))).collect()),
        type_: Some("connection.argonaut.io/v1alpha1".to_string()),
        ..Default::default()
    }
}

/// Server-side apply the connection secret. Empty details are a no-op.
pub async fn publish_connection_details(
    client: &Client,
    name: &str,
    namespace: &str,
    owner: Option<OwnerReference>,
    details: &ConnectionDetails,
) -> Result<(), SecretError> {
    if details.is_empty() {
        return Ok(());
    }
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = connection_secret(name, namespace, owner, details);
    api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&secret)).await?;
    debug!(secret = %format!("{namespace}/{name}"), keys = details.len(), "connection details published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn selector(key: &str) -> SecretKeySelector {
        SecretKeySelector { name: "creds".into(), namespace: "argocd".into(), key: key.into() }
    }

    #[test]
    fn value_read_from_data() {
        let secret = Secret {
            data: Some(BTreeMap::from([("password".to_string(), ByteString(b"hunter2".to_vec()))])),
            ..Default::default()
        };
        assert_eq!(secret_value(&secret, &selector("password")).unwrap(), b"hunter2".to_vec());
    }

    fn target(namespace: Option<&str>) -> SecretReference {
        SecretReference { name: "ci-token".into(), namespace: namespace.map(str::to_string) }
    }

    #[test]
    fn connection_secret_namespace_defaults_to_owner() {
        assert_eq!(connection_secret_namespace(&target(None), Some("team-a")).unwrap(), "team-a");
        assert_eq!(connection_secret_namespace(&target(Some("team-a")), Some("team-a")).unwrap(), "team-a");
        assert_eq!(connection_secret_namespace(&target(Some("argocd")), None).unwrap(), "argocd");
    }

    #[test]
    fn connection_secret_namespace_rejects_other_namespace_for_namespaced_owner() {
        let err = connection_secret_namespace(&target(Some("argocd")), Some("team-a")).unwrap_err();
        assert!(matches!(err, SecretError::ForeignNamespace { .. }));
        assert!(matches!(
            connection_secret_namespace(&target(None), None).unwrap_err(),
            SecretError::MissingNamespace { .. }
        ));
    }

    #[test]
    fn missing_key_names_the_secret() {
        let err = secret_value(&Secret::default(), &selector("password")).unwrap_err();
        assert_eq!(err.to_string(), "secret argocd/creds has no key \"password\"");
    }

    #[test]
    fn connection_secret_carries_details_and_owner() {
        let owner = OwnerReference {
            api_version: "argocd.argonaut.io/v1alpha1".into(),
            kind: "ProjectToken".into(),
            name: "ci".into(),
            uid: "1234".into(),
            controller: Some(true),
            ..Default::default()
        };
        let details = ConnectionDetails::from([("token".to_string(), b"jwt".to_vec())]);
        let s = connection_secret("ci-token", "argocd", Some(owner), &details);
        assert_eq!(s.metadata.namespace.as_deref(), Some("argocd"));
        assert_eq!(s.metadata.owner_references.as_ref().map(Vec::len), Some(1));
        assert_eq!(s.data.unwrap()["token"].0, b"jwt".to_vec());
    }

    #[tokio::test]
    async fn mock_resolver_is_usable_as_trait_object() {
        let mut mock = MockSecretResolver::new();
        mock.expect_resolve().returning(|_| Ok(b"v".to_vec()));
        let resolver: &dyn SecretResolver = &mock;
        assert_eq!(resolver.resolve(&selector("k")).await.unwrap(), b"v".to_vec());
    }
}
