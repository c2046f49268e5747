//! Argo CD project role tokens (JWTs).
//!
//! External name is `project/role/id`. The issued token is only ever
//! returned once, at creation, and is published as the `token` key of the
//! connection secret.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTokenParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Token id; generated on create when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifetime as a duration string (`"720h"`); unset means no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<String>,
    /// Re-issue the token once its remaining lifetime drops below this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTokenObservation {
    #[serde(default)]
    pub id: String,
    /// Unix seconds.
    #[serde(default)]
    pub issued_at: i64,
    /// Unix seconds; absent when the token never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

managed_kind! {
    /// A JWT issued for an Argo CD project role.
    kind = "ProjectToken",
    plural = "projecttokens",
    params = ProjectTokenParameters,
    observation = ProjectTokenObservation,
    status = ProjectTokenStatus("ProjectTokenStatus"),
    cluster = ProjectToken(ProjectTokenSpec, "ProjectToken"),
    namespaced = NamespacedProjectToken(NamespacedProjectTokenSpec, "NamespacedProjectToken"),
}
