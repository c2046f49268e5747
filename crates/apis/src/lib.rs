//! Argonaut custom resources.
//!
//! Every managed kind has one canonical parameter/observation definition and
//! is expanded into a cluster-scoped resource (`argocd.argonaut.io`) and a
//! namespaced one (`argocd.m.argonaut.io`) by [`managed_kind!`].

#![forbid(unsafe_code)]

use std::fmt::Debug;

use kube::{Api, Client, CustomResourceExt, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod common;
pub mod conditions;

pub use common::{ConnectionStateObservation, DeletionPolicy, SecretReference};
pub use conditions::{Condition, ConditionStatus};

pub const CLUSTER_GROUP: &str = "argocd.argonaut.io";
pub const NAMESPACED_GROUP: &str = "argocd.m.argonaut.io";
pub const VERSION: &str = "v1alpha1";

/// Annotation holding the remote natural key once the object exists.
pub const EXTERNAL_NAME_ANNOTATION: &str = "argonaut.io/external-name";
pub const FINALIZER: &str = "argonaut.io/finalizer";

/// Common view over the generated resources of every kind and scope.
pub trait Managed:
    Resource<DynamicType = ()> + CustomResourceExt + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Params: Clone + Debug + PartialEq + Serialize + Send + Sync + 'static;
    type Observation: Clone + Debug + Serialize + Send + Sync + 'static;

    fn for_provider(&self) -> &Self::Params;
    fn deletion_policy(&self) -> DeletionPolicy;
    fn connection_secret(&self) -> Option<&SecretReference>;
    fn conditions(&self) -> &[Condition];
    fn at_provider(&self) -> Option<&Self::Observation>;

    /// Api handle for this kind. Cluster-scoped kinds ignore `namespace`;
    /// namespaced kinds span all namespaces when it is `None`.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;

    /// Remote natural key recorded on the object, if any.
    fn external_name(&self) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|a| a.get(EXTERNAL_NAME_ANNOTATION))
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Expand one kind into its status type and both scoped resources.
///
/// String literals and idents are passed side by side because the
/// `CustomResource` derive takes names as strings.
macro_rules! managed_kind {
    (
        $(#[$doc:meta])*
        kind = $kind:tt,
        plural = $plural:tt,
        params = $params:ty,
        observation = $obs:ty,
        status = $status:ident ($status_lit:tt),
        cluster = $cluster:ident ($cluster_spec:ident, $cluster_lit:tt),
        namespaced = $ns:ident ($ns_spec:ident, $ns_lit:tt) $(,)?
    ) => {
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize, ::schemars::JsonSchema)]
        #[serde(rename_all = "camelCase")]
        pub struct $status {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub at_provider: Option<$obs>,
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub conditions: Vec<$crate::conditions::Condition>,
        }

        $(#[$doc])*
        #[derive(::kube::CustomResource, Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize, ::schemars::JsonSchema)]
        #[kube(
            group = "argocd.argonaut.io",
            version = "v1alpha1",
            kind = $kind,
            plural = $plural,
            root = $cluster_lit,
            status = $status_lit,
            category = "argonaut",
            printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
            printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
            printcolumn = r#"{"name":"EXTERNAL-NAME","type":"string","jsonPath":".metadata.annotations.argonaut\\.io/external-name"}"#,
            printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
        )]
        #[serde(rename_all = "camelCase")]
        pub struct $cluster_spec {
            pub for_provider: $params,
            #[serde(default)]
            pub deletion_policy: $crate::common::DeletionPolicy,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub write_connection_secret_to_ref: Option<$crate::common::SecretReference>,
        }

        $(#[$doc])*
        #[derive(::kube::CustomResource, Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize, ::schemars::JsonSchema)]
        #[kube(
            group = "argocd.m.argonaut.io",
            version = "v1alpha1",
            kind = $kind,
            plural = $plural,
            root = $ns_lit,
            status = $status_lit,
            namespaced,
            category = "argonaut",
            printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
            printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
            printcolumn = r#"{"name":"EXTERNAL-NAME","type":"string","jsonPath":".metadata.annotations.argonaut\\.io/external-name"}"#,
            printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
        )]
        #[serde(rename_all = "camelCase")]
        pub struct $ns_spec {
            pub for_provider: $params,
            #[serde(default)]
            pub deletion_policy: $crate::common::DeletionPolicy,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub write_connection_secret_to_ref: Option<$crate::common::SecretReference>,
        }

        managed_kind!(@impl $cluster, $params, $obs, cluster);
        managed_kind!(@impl $ns, $params, $obs, namespaced);
    };

    (@api cluster) => {
        fn api(client: ::kube::Client, _namespace: Option<&str>) -> ::kube::Api<Self> { ::kube::Api::all(client) }
    };

    (@api namespaced) => {
        fn api(client: ::kube::Client, namespace: Option<&str>) -> ::kube::Api<Self> {
            match namespace {
                Some(ns) => ::kube::Api::namespaced(client, ns),
                None => ::kube::Api::all(client),
            }
        }
    };

    (@impl $ty:ident, $params:ty, $obs:ty, $scope:ident) => {
        impl $crate::Managed for $ty {
            type Params = $params;
            type Observation = $obs;

            fn for_provider(&self) -> &Self::Params { &self.spec.for_provider }

            fn deletion_policy(&self) -> $crate::common::DeletionPolicy { self.spec.deletion_policy }

            fn connection_secret(&self) -> Option<&$crate::common::SecretReference> {
                self.spec.write_connection_secret_to_ref.as_ref()
            }

            fn conditions(&self) -> &[$crate::conditions::Condition] {
                self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or(&[])
            }

            fn at_provider(&self) -> Option<&Self::Observation> {
                self.status.as_ref().and_then(|s| s.at_provider.as_ref())
            }

            managed_kind!(@api $scope);
        }
    };
}

pub mod cluster;
pub mod registry;
pub mod repository;
pub mod token;

pub use cluster::*;
pub use registry::{KindEntry, KindRegistry, ManagedKind, Scope};
pub use repository::*;
pub use token::*;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    #[test]
    fn external_name_read_from_annotation() {
        let mut c = Cluster::new("prod", ClusterSpec {
            for_provider: ClusterParameters::default(),
            deletion_policy: DeletionPolicy::Delete,
            write_connection_secret_to_ref: None,
        });
        assert_eq!(c.external_name(), None);

        c.metadata = ObjectMeta {
            name: Some("prod".into()),
            annotations: Some([(EXTERNAL_NAME_ANNOTATION.to_string(), "https://example.com/".to_string())].into()),
            ..Default::default()
        };
        assert_eq!(c.external_name(), Some("https://example.com/"));
    }

    #[test]
    fn empty_annotation_is_no_external_name() {
        let mut r = NamespacedRepository::new("charts", NamespacedRepositorySpec {
            for_provider: RepositoryParameters::default(),
            deletion_policy: DeletionPolicy::Orphan,
            write_connection_secret_to_ref: None,
        });
        r.metadata.annotations = Some([(EXTERNAL_NAME_ANNOTATION.to_string(), String::new())].into());
        assert_eq!(r.external_name(), None);
        assert_eq!(r.deletion_policy(), DeletionPolicy::Orphan);
    }

    #[test]
    fn scopes_differ_only_in_group_and_namespacing() {
        use kube::Resource;
        assert_eq!(ProjectToken::group(&()), CLUSTER_GROUP);
        assert_eq!(NamespacedProjectToken::group(&()), NAMESPACED_GROUP);
        assert_eq!(ProjectToken::kind(&()), NamespacedProjectToken::kind(&()));
        assert_eq!(ProjectToken::version(&()), VERSION);
    }

    fn local_client() -> Client {
        let config = kube::Config::new("http://127.0.0.1:8080".parse().unwrap());
        Client::try_from(config).unwrap()
    }

    #[tokio::test]
    async fn api_urls_follow_scope() {
        let client = local_client();
        assert_eq!(Cluster::api(client.clone(), Some("argocd")).resource_url(), "/apis/argocd.argonaut.io/v1alpha1/clusters");
        assert_eq!(
            NamespacedCluster::api(client.clone(), Some("argocd")).resource_url(),
            "/apis/argocd.m.argonaut.io/v1alpha1/namespaces/argocd/clusters"
        );
        assert_eq!(
            NamespacedProjectToken::api(client, None).resource_url(),
            "/apis/argocd.m.argonaut.io/v1alpha1/projecttokens"
        );
    }
}
