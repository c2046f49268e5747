use argonaut_apis::{ClusterCacheInfoObservation, ClusterObservation, ClusterParameters};
use argonaut_argocd::{AwsAuthConfig, Cluster, ClusterService, ExecProviderConfig};
use argonaut_core::prelude::*;
use argonaut_core::ConnectionDetails;
use argonaut_kubehub::SecretResolver;
use async_trait::async_trait;
use tracing::debug;

use crate::{connection_state, is_not_found, remote_error, resolve_bytes, resolve_opt};

/// Reconciles Argo CD cluster registrations. External name is the server URL.
pub struct ClusterExternal<C, S> {
    client: C,
    secrets: S,
}

impl<C: ClusterService, S: SecretResolver> ClusterExternal<C, S> {
    pub fn new(client: C, secrets: S) -> Self { Self { client, secrets } }

    /// Full request body from the set parameters. Secrets are read fresh.
    async fn request(&self, p: &ClusterParameters, server: &str) -> ReconcileResult<Cluster> {
        let mut req = Cluster {
            server: server.to_string(),
            name: p.name.clone().unwrap_or_default(),
            namespaces: p.namespaces.clone().unwrap_or_default(),
            cluster_resources: p.cluster_resources.unwrap_or_default(),
            shard: p.shard,
            project: p.project.clone().unwrap_or_default(),
            labels: p.labels.clone().unwrap_or_default(),
            annotations: p.annotations.clone().unwrap_or_default(),
            ..Default::default()
        };
        let Some(cfg) = &p.config else { return Ok(req) };

        req.config.username = cfg.username.clone().unwrap_or_default();
        req.config.password = resolve_opt(&self.secrets, cfg.password_secret_ref.as_ref()).await?;
        req.config.bearer_token = resolve_opt(&self.secrets, cfg.bearer_token_secret_ref.as_ref()).await?;
        if let Some(tls) = &cfg.tls_client_config {
            let out = &mut req.config.tls_client_config;
            out.insecure = tls.insecure.unwrap_or_default();
            out.server_name = tls.server_name.clone().unwrap_or_default();
            if let Some(sel) = &tls.ca_data_secret_ref {
                out.ca_data = resolve_bytes(&self.secrets, sel).await?;
            }
            if let Some(sel) = &tls.cert_data_secret_ref {
                out.cert_data = resolve_bytes(&self.secrets, sel).await?;
            }
            if let Some(sel) = &tls.key_data_secret_ref {
                out.key_data = resolve_bytes(&self.secrets, sel).await?;
            }
        }
        req.config.aws_auth_config = cfg.aws_auth_config.as_ref().map(|a| AwsAuthConfig {
            cluster_name: a.cluster_name.clone().unwrap_or_default(),
            role_arn: a.role_arn.clone().unwrap_or_default(),
        });
        req.config.exec_provider_config = cfg.exec_provider_config.as_ref().map(|e| ExecProviderConfig {
            command: e.command.clone().unwrap_or_default(),
            args: e.args.clone().unwrap_or_default(),
            env: e.env.clone().unwrap_or_default(),
            api_version: e.api_version.clone().unwrap_or_default(),
            install_hint: e.install_hint.clone().unwrap_or_default(),
        });
        Ok(req)
    }
}

pub(crate) fn late_initialize(p: &mut ClusterParameters, r: &Cluster) -> bool {
    let mut li = LateInit::new();
    li.field(&mut p.name, &r.name)
        .field(&mut p.namespaces, &r.namespaces)
        .field(&mut p.cluster_resources, &r.cluster_resources)
        .optional(&mut p.shard, r.shard.as_ref())
        .field(&mut p.project, &r.project)
        .field(&mut p.labels, &r.labels)
        .field(&mut p.annotations, &r.annotations);
    li.group(&mut p.config, |li, cfg| {
        li.field(&mut cfg.username, &r.config.username);
        li.group(&mut cfg.tls_client_config, |li, tls| {
            li.field(&mut tls.insecure, &r.config.tls_client_config.insecure)
                .field(&mut tls.server_name, &r.config.tls_client_config.server_name);
        });
        if let Some(aws) = &r.config.aws_auth_config {
            li.group(&mut cfg.aws_auth_config, |li, a| {
                li.field(&mut a.cluster_name, &aws.cluster_name).field(&mut a.role_arn, &aws.role_arn);
            });
        }
        if let Some(exec) = &r.config.exec_provider_config {
            li.group(&mut cfg.exec_provider_config, |li, e| {
                li.field(&mut e.command, &exec.command)
                    .field(&mut e.args, &exec.args)
                    .field(&mut e.env, &exec.env)
                    .field(&mut e.api_version, &exec.api_version)
                    .field(&mut e.install_hint, &exec.install_hint);
            });
        }
    });
    li.changed()
}

/// Secrets (password, bearer token, TLS material) are redacted by Argo CD
/// and never compared.
pub(crate) fn compare(p: &ClusterParameters, r: &Cluster) -> Comparison {
    let mut cmp = Comparison::new();
    cmp.field("server", p.server.as_ref(), &r.server)
        .field("name", p.name.as_ref(), &r.name)
        .field("namespaces", p.namespaces.as_ref(), &r.namespaces)
        .field("clusterResources", p.cluster_resources.as_ref(), &r.cluster_resources)
        .field("shard", p.shard.as_ref(), &r.shard.unwrap_or_default())
        .field("project", p.project.as_ref(), &r.project)
        .field("labels", p.labels.as_ref(), &r.labels)
        .field("annotations", p.annotations.as_ref(), &r.annotations);
    let Some(cfg) = &p.config else { return cmp };

    cmp.field("config.username", cfg.username.as_ref(), &r.config.username);
    if let Some(tls) = &cfg.tls_client_config {
        let have = &r.config.tls_client_config;
        cmp.field("config.tlsClientConfig.insecure", tls.insecure.as_ref(), &have.insecure)
            .field("config.tlsClientConfig.serverName", tls.server_name.as_ref(), &have.server_name);
    }
    if let Some(aws) = &cfg.aws_auth_config {
        let have = r.config.aws_auth_config.as_ref();
        cmp.optional("config.awsAuthConfig.clusterName", aws.cluster_name.as_ref(), have.map(|a| &a.cluster_name))
            .optional("config.awsAuthConfig.roleARN", aws.role_arn.as_ref(), have.map(|a| &a.role_arn));
    }
    if let Some(exec) = &cfg.exec_provider_config {
        let have = r.config.exec_provider_config.as_ref();
        cmp.optional("config.execProviderConfig.command", exec.command.as_ref(), have.map(|e| &e.command))
            .optional("config.execProviderConfig.args", exec.args.as_ref(), have.map(|e| &e.args))
            .optional("config.execProviderConfig.env", exec.env.as_ref(), have.map(|e| &e.env))
            .optional("config.execProviderConfig.apiVersion", exec.api_version.as_ref(), have.map(|e| &e.api_version))
            .optional("config.execProviderConfig.installHint", exec.install_hint.as_ref(), have.map(|e| &e.install_hint));
    }
    cmp
}

fn observation(r: &Cluster) -> ClusterObservation {
    ClusterObservation {
        server_version: r.info.server_version.clone(),
        connection_state: connection_state(&r.info.connection_state),
        cache_info: ClusterCacheInfoObservation {
            resources_count: r.info.cache_info.resources_count,
            apis_count: r.info.cache_info.apis_count,
            last_cache_sync_time: r.info.cache_info.last_cache_sync_time.clone(),
        },
        applications_count: r.info.applications_count,
    }
}

#[async_trait]
impl<C: ClusterService, S: SecretResolver> ExternalClient for ClusterExternal<C, S> {
    type Params = ClusterParameters;
    type Observation = ClusterObservation;

    async fn observe(
        &self,
        params: &mut ClusterParameters,
        external_name: &str,
    ) -> ReconcileResult<ExternalObservation<ClusterObservation>> {
        if external_name.is_empty() {
            return Ok(ExternalObservation::absent());
        }
        let remote = match self.client.get(external_name).await {
            Ok(c) => c,
            Err(e) if is_not_found(&e) => return Ok(ExternalObservation::absent()),
            Err(e) => return Err(remote_error(Operation::Get, e)),
        };

        let late_initialized = late_initialize(params, &remote);
        let cmp = compare(params, &remote);
        if !cmp.is_up_to_date() {
            debug!(server = %external_name, diff = ?cmp.diffs(), "cluster differs from desired");
        }
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: cmp.is_up_to_date(),
            resource_late_initialized: late_initialized,
            at_provider: Some(observation(&remote)),
            diff: cmp.into_diffs(),
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(&self, params: &ClusterParameters) -> ReconcileResult<ExternalCreation> {
        let server = params.server.as_deref().filter(|s| !s.is_empty()).ok_or(ReconcileError::MissingParameter("server"))?;
        let req = self.request(params, server).await?;
        let created = self.client.create(&req).await.map_err(|e| remote_error(Operation::Create, e))?;
        let external_name = if created.server.is_empty() { req.server } else { created.server };
        Ok(ExternalCreation { external_name, connection_details: ConnectionDetails::new() })
    }

    async fn update(&self, params: &ClusterParameters, external_name: &str) -> ReconcileResult<ExternalUpdate> {
        if params.server.as_deref().is_some_and(|s| s != external_name) {
            return Err(ReconcileError::InvalidParameter {
                field: "server",
                reason: format!("cluster is registered as {external_name} and its server cannot change"),
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
