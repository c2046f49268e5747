//! Project role tokens.
//!
//! Argo CD can issue and revoke tokens but never returns one again, so the
//! issued JWT only flows out through connection details of Create and Update.
//! Update rotates: revoke the current token, issue a new one with the same id.

use std::time::Duration;

use argonaut_apis::{ProjectTokenObservation, ProjectTokenParameters};
use argonaut_argocd::{JwtToken, ProjectService, ProjectTokenCreateRequest};
use argonaut_core::prelude::*;
use argonaut_core::ConnectionDetails;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{is_not_found, remote_error};

/// Connection detail key holding the issued JWT.
pub const TOKEN_KEY: &str = "token";

/// `project/role/id` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenName {
    pub project: String,
    pub role: String,
    pub id: String,
}

impl TokenName {
    pub fn parse(name: &str) -> ReconcileResult<Self> {
        let invalid = |reason: &str| ReconcileError::InvalidExternalName { name: name.to_string(), reason: reason.to_string() };
        let mut parts = name.splitn(3, '/');
        let (Some(project), Some(role), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected project/role/id"));
        };
        if project.is_empty() || role.is_empty() || id.is_empty() {
            return Err(invalid("project, role and id must be non-empty"));
        }
        Ok(Self { project: project.to_string(), role: role.to_string(), id: id.to_string() })
    }
}

impl std::fmt::Display for TokenName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.role, self.id)
    }
}

/// Duration field in whole seconds.
fn parse_seconds(field: &'static str, value: Option<&String>) -> ReconcileResult<Option<i64>> {
    let invalid = |reason: String| ReconcileError::InvalidParameter { field, reason };
    let Some(v) = value else { return Ok(None) };
    let d: Duration = humantime::parse_duration(v).map_err(|e| invalid(e.to_string()))?;
    let secs = i64::try_from(d.as_secs()).map_err(|_| invalid(format!("{v} is out of range")))?;
    Ok(Some(secs))
}

/// `expiresIn` and `renewBefore` in seconds; `renewBefore` must be shorter
/// than a set `expiresIn`.
fn lifetimes(p: &ProjectTokenParameters) -> ReconcileResult<(Option<i64>, Option<i64>)> {
    let expires_in = parse_seconds("expiresIn", p.expires_in.as_ref())?;
    let renew_before = parse_seconds("renewBefore", p.renew_before.as_ref())?;
    if let (Some(exp), Some(renew)) = (expires_in.filter(|e| *e > 0), renew_before) {
        if renew >= exp {
            return Err(ReconcileError::InvalidParameter {
                field: "renewBefore",
                reason: format!("{renew}s is not shorter than expiresIn {exp}s"),
            });
        }
    }
    Ok((expires_in, renew_before))
}

fn now_unix() -> i64 { chrono::Utc::now().timestamp() }

/// Reconciles project role tokens. External name is `project/role/id`.
pub struct ProjectTokenExternal<P> {
    client: P,
    clock: fn() -> i64,
}

impl<P: ProjectService> ProjectTokenExternal<P> {
    pub fn new(client: P) -> Self { Self { client, clock: now_unix } }

    /// Replace the wall clock (unix seconds) used for renewal checks.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Current token for `name`, or `None` when it or its project is gone.
    async fn find(&self, name: &TokenName, op: Operation) -> ReconcileResult<Option<JwtToken>> {
        match self.client.get(&name.project).await {
            Ok(project) => Ok(project.find_token(&name.role, &name.id).cloned()),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(remote_error(op, e)),
        }
    }

    async fn issue(&self, params: &ProjectTokenParameters, name: &TokenName, op: Operation) -> ReconcileResult<ConnectionDetails> {
        let (expires_in, _) = lifetimes(params)?;
        let req = ProjectTokenCreateRequest {
            project: name.project.clone(),
            role: name.role.clone(),
            description: params.description.clone().unwrap_or_default(),
            expires_in: expires_in.unwrap_or_default(),
            id: name.id.clone(),
        };
        let resp = self.client.create_token(&req).await.map_err(|e| remote_error(op, e))?;
        info!(token = %name, "project token issued");
        Ok(ConnectionDetails::from([(TOKEN_KEY.to_string(), resp.token.into_bytes())]))
    }
}

pub(crate) fn late_initialize(p: &mut ProjectTokenParameters, name: &TokenName) -> bool {
    let mut li = LateInit::new();
    li.field(&mut p.project, &name.project).field(&mut p.role, &name.role).field(&mut p.id, &name.id);
    li.changed()
}

/// Identity against the external name, lifetime against `expiresIn`, and
/// remaining lifetime against `renewBefore`.
pub(crate) fn compare(
    p: &ProjectTokenParameters,
    name: &TokenName,
    token: &JwtToken,
    now: i64,
) -> ReconcileResult<Comparison> {
    let mut cmp = Comparison::new();
    cmp.field("project", p.project.as_ref(), &name.project)
        .field("role", p.role.as_ref(), &name.role)
        .field("id", p.id.as_ref(), &name.id);

    let (expires_in, renew_before) = lifetimes(p)?;
    if let Some(want) = expires_in {
        let have = if token.exp > 0 { token.exp - token.iat } else { 0 };
        if want != have {
            cmp.mismatch("expiresIn", format!("{want}s"), format!("{have}s"));
        }
    }
    if let Some(renew) = renew_before {
        let remaining = token.exp - now;
        if token.exp > 0 && remaining < renew {
            cmp.mismatch("renewBefore", format!("{renew}s remaining"), format!("{remaining}s remaining"));
        }
    }
    Ok(cmp)
}

#[async_trait]
impl<P: ProjectService> ExternalClient for ProjectTokenExternal<P> {
    type Params = ProjectTokenParameters;
    type Observation = ProjectTokenObservation;

    /// Pin a generated id so a create retried after a lost annotation
    /// re-issues the same `project/role/id`.
    fn initialize(&self, params: &mut ProjectTokenParameters) -> bool {
        if params.id.as_deref().is_some_and(|id| !id.is_empty()) {
            return false;
        }
        params.id = Some(uuid::Uuid::new_v4().to_string());
        true
    }

    async fn observe(
        &self,
        params: &mut ProjectTokenParameters,
        external_name: &str,
    ) -> ReconcileResult<ExternalObservation<ProjectTokenObservation>> {
        if external_name.is_empty() {
            return Ok(ExternalObservation::absent());
        }
        let name = TokenName::parse(external_name)?;
        let Some(token) = self.find(&name, Operation::Get).await? else {
            return Ok(ExternalObservation::absent());
        };

        let late_initialized = late_initialize(params, &name);
        let cmp = compare(params, &name, &token, (self.clock)())?;
        if !cmp.is_up_to_date() {
            debug!(token = %name, diff = ?cmp.diffs(), "project token needs rotation");
        }
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: cmp.is_up_to_date(),
            resource_late_initialized: late_initialized,
            at_provider: Some(ProjectTokenObservation {
                id: token.id.clone(),
                issued_at: token.iat,
                expires_at: (token.exp > 0).then_some(token.exp),
            }),
            diff: cmp.into_diffs(),
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(&self, params: &ProjectTokenParameters) -> ReconcileResult<ExternalCreation> {
        let project = params.project.clone().filter(|s| !s.is_empty()).ok_or(ReconcileError::MissingParameter("project"))?;
        let role = params.role.clone().filter(|s| !s.is_empty()).ok_or(ReconcileError::MissingParameter("role"))?;
        lifetimes(params)?;
        let id = params
            .id
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let name = TokenName { project, role, id };

        let connection_details = self.issue(params, &name, Operation::Create).await?;
        Ok(ExternalCreation { external_name: name.to_string(), connection_details })
    }

    async fn update(&self, params: &ProjectTokenParameters, external_name: &str) -> ReconcileResult<ExternalUpdate> {
        let name = TokenName::parse(external_name)?;
        if params.project.as_ref().is_some_and(|p| *p != name.project) {
            return Err(ReconcileError::InvalidParameter { field: "project", reason: "cannot move an issued token".into() });
        }
        if params.role.as_ref().is_some_and(|r| *r != name.role) {
            return Err(ReconcileError::InvalidParameter { field: "role", reason: "cannot move an issued token".into() });
        }
        if params.id.as_ref().is_some_and(|i| *i != name.id) {
            return Err(ReconcileError::InvalidParameter { field: "id", reason: "cannot rename an issued token".into() });
        }

        if let Some(current) = self.find(&name, Operation::Update).await? {
            match self.client.delete_token(&name.project, &name.role, current.iat, &name.id).await {
                Ok(()) => {}
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(remote_error(Operation::Update, e)),
            }
        }
        let connection_details = self.issue(params, &name, Operation::Update).await?;
        Ok(ExternalUpdate { connection_details })
    }

    async fn delete(&self, external_name: &str) -> ReconcileResult<()> {
        let name = TokenName::parse(external_name)?;
        let Some(current) = self.find(&name, Operation::Delete).await? else {
            return Ok(());
        };
        match self.client.delete_token(&name.project, &name.role, current.iat, &name.id).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(remote_error(Operation::Delete, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> TokenName {
        TokenName { project: "team-a".into(), role: "ci".into(), id: "build".into() }
    }

    #[test]
    fn token_name_round_trip() {
        let n = TokenName::parse("team-a/ci/build").unwrap();
        assert_eq!(n, name());
        assert_eq!(n.to_string(), "team-a/ci/build");
    }

    #[test]
    fn token_name_rejects_short_or_empty_parts() {
        assert!(TokenName::parse("team-a/ci").is_err());
        assert!(TokenName::parse("team-a//build").is_err());
        assert!(matches!(TokenName::parse("x").unwrap_err(), ReconcileError::InvalidExternalName { .. }));
    }

    #[test]
    fn identity_is_late_initialized_from_external_name() {
        let mut p = ProjectTokenParameters::default();
        assert!(late_initialize(&mut p, &name()));
        assert_eq!(p.id.as_deref(), Some("build"));
        assert!(!late_initialize(&mut p, &name()));
    }

    #[test]
    fn renew_before_triggers_rotation_near_expiry() {
        let token = JwtToken { iat: 1_000, exp: 1_000 + 86_400, id: "build".into() };
        let p = ProjectTokenParameters { renew_before: Some("2h".into()), ..Default::default() };
        assert!(compare(&p, &name(), &token, 2_000).unwrap().is_up_to_date());
        let late = compare(&p, &name(), &token, 1_000 + 86_400 - 3_600).unwrap();
        assert_eq!(late.diffs()[0].path, "renewBefore");
    }

    #[test]
    fn expires_in_compared_to_issued_lifetime() {
        let token = JwtToken { iat: 1_000, exp: 1_000 + 3_600, id: "build".into() };
        let p = ProjectTokenParameters { expires_in: Some("1h".into()), ..Default::default() };
        assert!(compare(&p, &name(), &token, 1_500).unwrap().is_up_to_date());
        let p = ProjectTokenParameters { expires_in: Some("24h".into()), ..Default::default() };
        assert!(!compare(&p, &name(), &token, 1_500).unwrap().is_up_to_date());
    }

    #[test]
    fn renew_before_must_be_shorter_than_lifetime() {
        let token = JwtToken { iat: 1_000, exp: 1_000 + 3_600, id: "build".into() };
        let p = ProjectTokenParameters {
            expires_in: Some("1h".into()),
            renew_before: Some("2h".into()),
            ..Default::default()
        };
        assert!(matches!(
            compare(&p, &name(), &token, 1_000),
            Err(ReconcileError::InvalidParameter { field: "renewBefore", .. })
        ));
        let p = ProjectTokenParameters { renew_before: Some("1h".into()), ..p };
        assert!(lifetimes(&p).is_err());
        let p = ProjectTokenParameters { renew_before: Some("10m".into()), ..p };
        assert_eq!(lifetimes(&p).unwrap(), (Some(3_600), Some(600)));
    }

    #[test]
    fn oversized_duration_is_rejected() {
        let p = ProjectTokenParameters { expires_in: Some("300000000000y".into()), ..Default::default() };
        assert!(matches!(lifetimes(&p), Err(ReconcileError::InvalidParameter { field: "expiresIn", .. })));
    }

    #[test]
    fn generated_id_is_pinned_once() {
        let ext = ProjectTokenExternal::new(argonaut_argocd::MockProjectService::new());
        let mut p = ProjectTokenParameters { project: Some("team-a".into()), role: Some("ci".into()), ..Default::default() };
        assert!(ext.initialize(&mut p));
        let id = p.id.clone().unwrap();
        assert!(!id.is_empty());
        assert!(!ext.initialize(&mut p));
        assert_eq!(p.id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn bad_duration_is_an_invalid_parameter() {
        let p = ProjectTokenParameters { renew_before: Some("soon".into()), ..Default::default() };
        let token = JwtToken::default();
        assert!(matches!(
            compare(&p, &name(), &token, 0),
            Err(ReconcileError::InvalidParameter { field: "renewBefore", .. })
        ));
    }
}
