//! Argo CD repository credentials, keyed by repository URL.

use argonaut_core::SecretKeySelector;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ConnectionStateObservation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryParameters {
    /// Repository URL; also the external name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// `git` or `helm`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub repo_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_private_key_secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_cert_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_cert_key_secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_ignore_host_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_lfs: Option<bool>,
    #[serde(default, rename = "enableOCI", skip_serializing_if = "Option::is_none")]
    pub enable_oci: Option<bool>,
    #[serde(default, rename = "githubAppID", skip_serializing_if = "Option::is_none")]
    pub github_app_id: Option<i64>,
    #[serde(default, rename = "githubAppInstallationID", skip_serializing_if = "Option::is_none")]
    pub github_app_installation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_app_enterprise_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_app_private_key_secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_http_basic_auth: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryObservation {
    #[serde(default)]
    pub connection_state: ConnectionStateObservation,
    /// Credentials come from a matching credential template.
    #[serde(default)]
    pub inherited_creds: bool,
}

managed_kind! {
    /// Repository credentials registered with Argo CD.
    kind = "Repository",
    plural = "repositories",
    params = RepositoryParameters,
    observation = RepositoryObservation,
    status = RepositoryStatus("RepositoryStatus"),
    cluster = Repository(RepositorySpec, "Repository"),
    namespaced = NamespacedRepository(NamespacedRepositorySpec, "NamespacedRepository"),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argo_field_names_round_trip() {
        let p: RepositoryParameters = serde_json::from_value(serde_json::json!({
            "repo": "https://github.com/example/repo.git",
            "type": "git",
            "enableOCI": true,
            "githubAppID": 42,
            "githubAppInstallationID": 7
        }))
        .unwrap();
        assert_eq!(p.repo_type.as_deref(), Some("git"));
        assert_eq!(p.enable_oci, Some(true));
        assert_eq!(p.github_app_id, Some(42));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["githubAppInstallationID"], 7);
        assert!(v.get("username").is_none());
    }
}
