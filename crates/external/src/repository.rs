use argonaut_apis::{RepositoryObservation, RepositoryParameters};
use argonaut_argocd::{Repository, RepositoryService};
use argonaut_core::prelude::*;
use argonaut_kubehub::SecretResolver;
use async_trait::async_trait;
use tracing::debug;

use crate::{connection_state, is_not_found, remote_error, resolve_opt};

/// Reconciles Argo CD repositories. External name is the repository URL.
pub struct RepositoryExternal<R, S> {
    client: R,
    secrets: S,
}

impl<R: RepositoryService, S: SecretResolver> RepositoryExternal<R, S> {
    pub fn new(client: R, secrets: S) -> Self { Self { client, secrets } }

    async fn request(&self, p: &RepositoryParameters, repo: &str) -> ReconcileResult<Repository> {
        Ok(Repository {
            repo: repo.to_string(),
            repo_type: p.repo_type.clone().unwrap_or_default(),
            name: p.name.clone().unwrap_or_default(),
            project: p.project.clone().unwrap_or_default(),
            username: p.username.clone().unwrap_or_default(),
            password: resolve_opt(&self.secrets, p.password_secret_ref.as_ref()).await?,
            ssh_private_key: resolve_opt(&self.secrets, p.ssh_private_key_secret_ref.as_ref()).await?,
            tls_client_cert_data: p.tls_client_cert_data.clone().unwrap_or_default(),
            tls_client_cert_key: resolve_opt(&self.secrets, p.tls_client_cert_key_secret_ref.as_ref()).await?,
            insecure: p.insecure.unwrap_or_default(),
            insecure_ignore_host_key: p.insecure_ignore_host_key.unwrap_or_default(),
            enable_lfs: p.enable_lfs.unwrap_or_default(),
            enable_oci: p.enable_oci.unwrap_or_default(),
            github_app_id: p.github_app_id.unwrap_or_default(),
            github_app_installation_id: p.github_app_installation_id.unwrap_or_default(),
            github_app_enterprise_base_url: p.github_app_enterprise_base_url.clone().unwrap_or_default(),
            github_app_private_key: resolve_opt(&self.secrets, p.github_app_private_key_secret_ref.as_ref()).await?,
            proxy: p.proxy.clone().unwrap_or_default(),
            force_http_basic_auth: p.force_http_basic_auth.unwrap_or_default(),
            ..Default::default()
        })
    }
}

pub(crate) fn late_initialize(p: &mut RepositoryParameters, r: &Repository) -> bool {
    let mut li = LateInit::new();
    li.field(&mut p.repo_type, &r.repo_type)
        .field(&mut p.name, &r.name)
        .field(&mut p.project, &r.project)
        .field(&mut p.username, &r.username)
        .field(&mut p.tls_client_cert_data, &r.tls_client_cert_data)
        .field(&mut p.insecure, &r.insecure)
        .field(&mut p.insecure_ignore_host_key, &r.insecure_ignore_host_key)
        .field(&mut p.enable_lfs, &r.enable_lfs)
        .field(&mut p.enable_oci, &r.enable_oci)
        .field(&mut p.github_app_id, &r.github_app_id)
        .field(&mut p.github_app_installation_id, &r.github_app_installation_id)
        .field(&mut p.github_app_enterprise_base_url, &r.github_app_enterprise_base_url)
        .field(&mut p.proxy, &r.proxy)
        .field(&mut p.force_http_basic_auth, &r.force_http_basic_auth);
    li.changed()
}

pub(crate) fn compare(p: &RepositoryParameters, r: &Repository) -> Comparison {
    let mut cmp = Comparison::new();
    cmp.field("repo", p.repo.as_ref(), &r.repo)
        .field("type", p.repo_type.as_ref(), &r.repo_type)
        .field("name", p.name.as_ref(), &r.name)
        .field("project", p.project.as_ref(), &r.project)
        .field("username", p.username.as_ref(), &r.username)
        .field("tlsClientCertData", p.tls_client_cert_data.as_ref(), &r.tls_client_cert_data)
        .field("insecure", p.insecure.as_ref(), &r.insecure)
        .field("insecureIgnoreHostKey", p.insecure_ignore_host_key.as_ref(), &r.insecure_ignore_host_key)
        .field("enableLfs", p.enable_lfs.as_ref(), &r.enable_lfs)
        .field("enableOCI", p.enable_oci.as_ref(), &r.enable_oci)
        .field("githubAppID", p.github_app_id.as_ref(), &r.github_app_id)
        .field("githubAppInstallationID", p.github_app_installation_id.as_ref(), &r.github_app_installation_id)
        .field(
            "githubAppEnterpriseBaseUrl",
            p.github_app_enterprise_base_url.as_ref(),
            &r.github_app_enterprise_base_url,
        )
        .field("proxy", p.proxy.as_ref(), &r.proxy)
        .field("forceHttpBasicAuth", p.force_http_basic_auth.as_ref(), &r.force_http_basic_auth);
    cmp
}

#[async_trait]
impl<R: RepositoryService, S: SecretResolver> ExternalClient for RepositoryExternal<R, S> {
    type Params = RepositoryParameters;
    type Observation = RepositoryObservation;

    async fn observe(
        &self,
        params: &mut RepositoryParameters,
        external_name: &str,
    ) -> ReconcileResult<ExternalObservation<RepositoryObservation>> {
        if external_name.is_empty() {
            return Ok(ExternalObservation::absent());
        }
        let remote = match self.client.get(external_name).await {
            Ok(r) => r,
            Err(e) if is_not_found(&e) => return Ok(ExternalObservation::absent()),
            Err(e) => return Err(remote_error(Operation::Get, e)),
        };

        let late_initialized = late_initialize(params, &remote);
        let cmp = compare(params, &remote);
        if !cmp.is_up_to_date() {
            debug!(repo = %external_name, diff = ?cmp.diffs(), "repository differs from desired");
        }
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: cmp.is_up_to_date(),
            resource_late_initialized: late_initialized,
            at_provider: Some(RepositoryObservation {
                connection_state: connection_state(&remote.connection_state),
                inherited_creds: remote.inherited_creds,
            }),
            diff: cmp.into_diffs(),
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(&self, params: &RepositoryParameters) -> ReconcileResult<ExternalCreation> {
        let repo = params.repo.as_deref().filter(|s| !s.is_empty()).ok_or(ReconcileError::MissingParameter("repo"))?;
        let req = self.request(params, repo).await?;
        let created = self.client.create(&req).await.map_err(|e| remote_error(Operation::Create, e))?;
        let external_name = if created.repo.is_empty() { req.repo } else { created.repo };
        Ok(ExternalCreation { external_name, connection_details: ConnectionDetails::new() })
    }

    async fn update(&self, params: &RepositoryParameters, external_name: &str) -> ReconcileResult<ExternalUpdate> {
        if params.repo.as_deref().is_some_and(|r| r != external_name) {
            return Err(ReconcileError::InvalidParameter {
                field: "repo",
                reason: format!("repository is registered as {external_name} and its URL cannot change"),
            });
        }
        let req = self.request(params, external_name).await?;
        self.client.update(&req).await.map_err(|e| remote_error(Operation::Update, e))?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, external_name: &str) -> ReconcileResult<()> {
        match self.client.delete(external_name).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(remote_error(Operation::Delete, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argonaut_argocd::{Code, MockRepositoryService, RemoteError};
    use argonaut_kubehub::{MockSecretResolver, SecretError};

    const URL: &str = "https://github.com/example/repo.git";

    #[test]
    fn redacted_password_is_not_a_difference() {
        let p = RepositoryParameters {
            repo: Some(URL.into()),
            username: Some("git".into()),
            password_secret_ref: Some(SecretKeySelector { name: "r".into(), namespace: "argocd".into(), key: "pw".into() }),
            ..Default::default()
        };
        let r = Repository { repo: URL.into(), username: "git".into(), ..Default::default() };
        assert!(compare(&p, &r).is_up_to_date());
    }

    #[test]
    fn late_init_fills_type_and_project() {
        let mut p = RepositoryParameters { repo: Some(URL.into()), ..Default::default() };
        let r = Repository { repo: URL.into(), repo_type: "git".into(), project: "default".into(), ..Default::default() };
        assert!(late_initialize(&mut p, &r));
        assert_eq!(p.repo_type.as_deref(), Some("git"));
        assert_eq!(p.project.as_deref(), Some("default"));
        assert!(p.insecure.is_none());
        assert!(!late_initialize(&mut p, &r));
    }

    #[tokio::test]
    async fn observe_reports_connection_state() {
        let mut client = MockRepositoryService::new();
        client.expect_get().returning(|repo| {
            let mut r = Repository { repo: repo.to_string(), inherited_creds: true, ..Default::default() };
            r.connection_state.status = "Successful".into();
            Ok(r)
        });
        let mut p = RepositoryParameters { repo: Some(URL.into()), ..Default::default() };
        let obs = RepositoryExternal::new(client, MockSecretResolver::new()).observe(&mut p, URL).await.unwrap();
        let at = obs.at_provider.unwrap();
        assert_eq!(at.connection_state.status, "Successful");
        assert!(at.inherited_creds);
    }

    #[tokio::test]
    async fn observe_surfaces_permission_denied() {
        let mut client = MockRepositoryService::new();
        client
            .expect_get()
            .returning(|_| Err(RemoteError::status(Code::PermissionDenied, "permission denied")));
        let mut p = RepositoryParameters::default();
        let err = RepositoryExternal::new(client, MockSecretResolver::new()).observe(&mut p, URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().starts_with("get failed: "));
    }

    #[tokio::test]
    async fn missing_secret_aborts_create_before_remote_call() {
        let mut client = MockRepositoryService::new();
        client.expect_create().never();
        let mut secrets = MockSecretResolver::new();
        secrets
            .expect_resolve()
            .returning(|s| Err(SecretError::NotFound { namespace: s.namespace.clone(), name: s.name.clone() }));
        let p = RepositoryParameters {
            repo: Some(URL.into()),
            ssh_private_key_secret_ref: Some(SecretKeySelector {
                name: "ssh".into(),
                namespace: "argocd".into(),
                key: "id_ed25519".into(),
            }),
            ..Default::default()
        };
        let err = RepositoryExternal::new(client, secrets).create(&p).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Secret { .. }));
    }

    #[tokio::test]
    async fn update_rejects_repo_change() {
        let mut client = MockRepositoryService::new();
        client.expect_update().never();
        let p = RepositoryParameters { repo: Some("https://github.com/example/other.git".into()), ..Default::default() };
        let err = RepositoryExternal::new(client, MockSecretResolver::new()).update(&p, URL).await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidParameter { field: "repo", .. }));
    }

    #[tokio::test]
    async fn update_failure_is_tagged() {
        let mut client = MockRepositoryService::new();
        client
            .expect_update()
            .returning(|_| Err(RemoteError::status(Code::PermissionDenied, "permission denied")));
        let p = RepositoryParameters { repo: Some(URL.into()), ..Default::default() };
        let err = RepositoryExternal::new(client, MockSecretResolver::new()).update(&p, URL).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Update));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().starts_with("update failed: "));
    }

    #[tokio::test]
    async fn delete_of_absent_repository_succeeds() {
        let mut client = MockRepositoryService::new();
        client
            .expect_delete()
            .with(mockall::predicate::eq(URL))
            .returning(|_| Err(RemoteError::status(Code::NotFound, "repo not found")));
        RepositoryExternal::new(client, MockSecretResolver::new()).delete(URL).await.unwrap();
    }

    #[tokio::test]
    async fn delete_failure_is_tagged() {
        let mut client = MockRepositoryService::new();
        client.expect_delete().returning(|_| Err(RemoteError::Http { status: 500, body: "internal".into() }));
        let err = RepositoryExternal::new(client, MockSecretResolver::new()).delete(URL).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Delete));
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
