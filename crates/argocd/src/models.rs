//! Argo CD API payloads (`argoproj.io/v1alpha1` JSON shapes).
//!
//! Remote fields are plain values with serde defaults: the API omits empty
//! values, so an absent field and a zero value are indistinguishable here.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

fn is_false(v: &bool) -> bool { !*v }

fn is_zero(v: &i64) -> bool { *v == 0 }

/// Accept int64 fields encoded either as JSON numbers or as strings.
fn raw_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
        Null,
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(Some(n)),
        Raw::Str(s) if s.is_empty() => Ok(None),
        Raw::Str(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Raw::Null => Ok(None),
    }
}

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    raw_i64(d).map(Option::unwrap_or_default)
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    raw_i64(d)
}

/// `[]byte` fields travel base64-encoded.
mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        STANDARD.decode(raw.as_bytes()).map_err(serde::de::Error::custom)
    }
}

// ---- clusters ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub config: ClusterConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cluster_resources: bool,
    #[serde(default, deserialize_with = "de_opt_i64", skip_serializing_if = "Option::is_none")]
    pub shard: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Server-populated; never sent.
    #[serde(default, skip_serializing)]
    pub info: ClusterInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bearer_token: String,
    #[serde(default)]
    pub tls_client_config: TlsClientConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_auth_config: Option<AwsAuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_provider_config: Option<ExecProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsClientConfig {
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    #[serde(default, with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub ca_data: Vec<u8>,
    #[serde(default, with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub cert_data: Vec<u8>,
    #[serde(default, with = "b64", skip_serializing_if = "Vec::is_empty")]
    pub key_data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAuthConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    #[serde(default, rename = "roleARN", skip_serializing_if = "String::is_empty")]
    pub role_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecProviderConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub install_hint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    #[serde(default)]
    pub connection_state: ConnectionState,
    #[serde(default)]
    pub server_version: String,
    #[serde(default)]
    pub cache_info: ClusterCacheInfo,
    #[serde(default, deserialize_with = "de_i64")]
    pub applications_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCacheInfo {
    #[serde(default, deserialize_with = "de_i64")]
    pub resources_count: i64,
    #[serde(default, deserialize_with = "de_i64")]
    pub apis_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cache_sync_time: Option<String>,
}

// ---- repositories ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub repo: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub repo_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_private_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_client_cert_data: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_client_cert_key: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure_ignore_host_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_lfs: bool,
    #[serde(default, rename = "enableOCI", skip_serializing_if = "is_false")]
    pub enable_oci: bool,
    #[serde(default, rename = "githubAppID", deserialize_with = "de_i64", skip_serializing_if = "is_zero")]
    pub github_app_id: i64,
    #[serde(default, rename = "githubAppInstallationID", deserialize_with = "de_i64", skip_serializing_if = "is_zero")]
    pub github_app_installation_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub github_app_enterprise_base_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub github_app_private_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_http_basic_auth: bool,
    /// Server-populated; never sent.
    #[serde(default, skip_serializing)]
    pub connection_state: ConnectionState,
    #[serde(default, skip_serializing)]
    pub inherited_creds: bool,
}

// ---- projects and tokens ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppProject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AppProjectSpec,
    #[serde(default)]
    pub status: AppProjectStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppProjectSpec {
    #[serde(default)]
    pub roles: Vec<ProjectRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppProjectStatus {
    #[serde(default)]
    pub jwt_tokens_by_role: BTreeMap<String, JwtTokens>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtTokens {
    #[serde(default)]
    pub items: Vec<JwtToken>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub jwt_tokens: Vec<JwtToken>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtToken {
    #[serde(default, deserialize_with = "de_i64")]
    pub iat: i64,
    #[serde(default, deserialize_with = "de_i64")]
    pub exp: i64,
    #[serde(default)]
    pub id: String,
}

impl AppProject {
    /// Token issued for `role` with the given id, looked up in both the
    /// status (current Argo CD) and the role spec (older releases).
    pub fn find_token(&self, role: &str, id: &str) -> Option<&JwtToken> {
        let from_status = self
            .status
            .jwt_tokens_by_role
            .get(role)
            .and_then(|t| t.items.iter().find(|t| t.id == id));
        from_status.or_else(|| {
            self.spec
                .roles
                .iter()
                .find(|r| r.name == role)
                .and_then(|r| r.jwt_tokens.iter().find(|t| t.id == id))
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.spec.roles.iter().any(|r| r.name == role)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTokenCreateRequest {
    pub project: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Lifetime in seconds; 0 means no expiry.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTokenResponse {
    #[serde(default)]
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_request_omits_empty_fields() {
        let c = Cluster {
            server: "https://example.com/".into(),
            name: "testcluster".into(),
            config: ClusterConfig {
                tls_client_config: TlsClientConfig { insecure: true, ..Default::default() },
                ..Default::default()
            },
            ..Default::default()
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "server": "https://example.com/",
                "name": "testcluster",
                "config": { "tlsClientConfig": { "insecure": true } }
            })
        );
    }

    #[test]
    fn cluster_response_parses_info_and_bytes() {
        let v = serde_json::json!({
            "server": "https://example.com/",
            "name": "testcluster",
            "config": { "tlsClientConfig": { "insecure": true, "caData": "Y2E=" } },
            "namespaces": ["default"],
            "shard": "2",
            "info": {
                "connectionState": { "status": "Successful", "attemptedAt": "2024-01-01T00:00:00Z" },
                "serverVersion": "1.29",
                "cacheInfo": { "resourcesCount": 120, "apisCount": "40" },
                "applicationsCount": 3
            }
        });
        let c: Cluster = serde_json::from_value(v).unwrap();
        assert_eq!(c.config.tls_client_config.ca_data, b"ca".to_vec());
        assert_eq!(c.shard, Some(2));
        assert_eq!(c.info.cache_info.apis_count, 40);
        assert_eq!(c.info.applications_count, 3);
        assert_eq!(c.info.connection_state.status, "Successful");
    }

    #[test]
    fn repository_uses_argo_field_names() {
        let r = Repository {
            repo: "https://github.com/example/repo.git".into(),
            repo_type: "git".into(),
            enable_oci: true,
            github_app_id: 42,
            ..Default::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], "git");
        assert_eq!(v["enableOCI"], true);
        assert_eq!(v["githubAppID"], 42);
        assert!(v.get("connectionState").is_none());
    }

    #[test]
    fn project_token_lookup_prefers_status() {
        let p: AppProject = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "team-a" },
            "spec": { "roles": [ { "name": "ci", "jwtTokens": [ { "iat": 1, "id": "old" } ] } ] },
            "status": { "jwtTokensByRole": { "ci": { "items": [ { "iat": "5", "exp": "10", "id": "build" } ] } } }
        }))
        .unwrap();
        assert!(p.has_role("ci"));
        assert_eq!(p.find_token("ci", "build").map(|t| (t.iat, t.exp)), Some((5, 10)));
        assert_eq!(p.find_token("ci", "old").map(|t| t.iat), Some(1));
        assert!(p.find_token("ci", "missing").is_none());
        assert!(p.find_token("deploy", "build").is_none());
    }
}
