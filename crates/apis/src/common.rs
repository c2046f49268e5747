use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What happens to the remote object when the resource is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    /// Leave the remote object in place.
    Orphan,
}

/// Secret that receives connection details. Cluster-scoped resources must
/// name the namespace; namespaced ones may only use their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Connectivity as last reported by Argo CD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStateObservation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_policy_defaults_to_delete() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Holder {
            #[serde(default)]
            deletion_policy: DeletionPolicy,
        }
        let h: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(h.deletion_policy, DeletionPolicy::Delete);
        let h: Holder = serde_json::from_str(r#"{"deletionPolicy":"Orphan"}"#).unwrap();
        assert_eq!(h.deletion_policy, DeletionPolicy::Orphan);
    }
}
