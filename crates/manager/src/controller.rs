//! Managed-resource reconcile loop, generic over kind and scope.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use argonaut_apis::conditions::set_condition;
use argonaut_apis::{
    Cluster, Condition, DeletionPolicy, KindRegistry, Managed, ManagedKind, NamespacedCluster, NamespacedProjectToken,
    NamespacedRepository, ProjectToken, Repository, Scope, FINALIZER,
};
use argonaut_argocd::ArgoClient;
use argonaut_core::{ConnectionDetails, ErrorKind, ExternalClient, Operation, ReconcileError, ReconcileResult};
use argonaut_external::{ClusterExternal, ProjectTokenExternal, RepositoryExternal};
use argonaut_kubehub::{self as hub, KubeSecretResolver};
use futures::StreamExt;
use kube::runtime::controller::{Action, Config as ControllerConfig};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, ResourceExt};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::error::ManagerError;
use crate::telemetry::{EXTERNAL_CALL_LATENCY_MS, RECONCILE_ERRORS_TOTAL, RECONCILE_TOTAL};

/// Requeue delay after a failed reconcile.
const ERROR_REQUEUE: Duration = Duration::from_secs(15);

pub struct Context<E> {
    pub client: Client,
    pub external: E,
    pub kind: ManagedKind,
    pub poll_interval: Duration,
}

/// What a reconcile pass did, as reflected in conditions.
#[derive(Debug)]
pub enum Outcome<'a> {
    Created,
    Updated,
    UpToDate,
    Deleting,
    Failed(&'a ReconcileError),
}

impl Outcome<'_> {
    /// Apply this outcome to the object's conditions.
    pub fn apply(&self, conditions: &mut Vec<Condition>) {
        match self {
            Outcome::Created => {
                set_condition(conditions, Condition::creating());
                set_condition(conditions, Condition::reconcile_success());
            }
            Outcome::Updated | Outcome::UpToDate => {
                set_condition(conditions, Condition::available());
                set_condition(conditions, Condition::reconcile_success());
            }
            Outcome::Deleting => {
                set_condition(conditions, Condition::deleting());
                set_condition(conditions, Condition::reconcile_success());
            }
            Outcome::Failed(err) => {
                if err.kind() == ErrorKind::PermissionDenied {
                    set_condition(conditions, Condition::unavailable(err.to_string()));
                }
                set_condition(conditions, Condition::reconcile_error(err.to_string()));
            }
        }
    }
}

fn api_for<K: Managed>(client: &Client, obj: &K) -> Api<K> { K::api(client.clone(), obj.namespace().as_deref()) }

/// Run one external call, recording its latency.
async fn timed<T, F>(kind: ManagedKind, op: Operation, call: F) -> ReconcileResult<T>
where
    F: Future<Output = ReconcileResult<T>>,
{
    let started = Instant::now();
    let res = call.await;
    histogram!(
        EXTERNAL_CALL_LATENCY_MS,
        started.elapsed().as_secs_f64() * 1000.0,
        "kind" => kind.as_str(),
        "operation" => op.as_str()
    );
    res
}

async fn write_status<K: Managed>(
    api: &Api<K>,
    obj: &K,
    at_provider: Option<&K::Observation>,
    outcome: Outcome<'_>,
) -> Result<(), ManagerError> {
    let mut conditions = obj.conditions().to_vec();
    outcome.apply(&mut conditions);
    let body = hub::status_patch::<K, _>(at_provider, &conditions)?;
    hub::apply_status(api, &obj.name_any(), &body).await?;
    Ok(())
}

async fn publish<K: Managed>(client: &Client, obj: &K, details: &ConnectionDetails) -> Result<(), ManagerError> {
    let Some(target) = obj.connection_secret() else { return Ok(()) };
    let namespace = hub::connection_secret_namespace(target, obj.namespace().as_deref())?;
    hub::publish_connection_details(client, &target.name, &namespace, obj.controller_owner_ref(&()), details).await?;
    Ok(())
}

/// Record a failed external call on the object and hand the error back.
async fn fail<K: Managed>(api: &Api<K>, obj: &K, err: ReconcileError) -> ManagerError {
    if let Err(status_err) = write_status(api, obj, obj.at_provider(), Outcome::Failed(&err)).await {
        warn!(error = %status_err, name = %obj.name_any(), "failed to record reconcile error");
    }
    ManagerError::Reconcile(err)
}

async fn finalize<K, E>(obj: &K, api: &Api<K>, ctx: &Context<E>) -> Result<Action, ManagerError>
where
    K: Managed,
    E: ExternalClient<Params = K::Params, Observation = K::Observation>,
{
    if !hub::has_finalizer(obj, FINALIZER) {
        return Ok(Action::await_change());
    }
    let name = obj.name_any();
    match (obj.deletion_policy(), obj.external_name()) {
        (DeletionPolicy::Delete, Some(external_name)) => {
            write_status(api, obj, obj.at_provider(), Outcome::Deleting).await?;
            if let Err(e) = timed(ctx.kind, Operation::Delete, ctx.external.delete(external_name)).await {
                return Err(fail(api, obj, e).await);
            }
            info!(kind = %ctx.kind, name = %name, external_name = %external_name, "remote object deleted");
        }
        (DeletionPolicy::Orphan, Some(external_name)) => {
            info!(kind = %ctx.kind, name = %name, external_name = %external_name, "orphaning remote object");
        }
        (_, None) => debug!(kind = %ctx.kind, name = %name, "never created remotely"),
    }
    hub::remove_finalizer(api, obj, FINALIZER).await?;
    Ok(Action::await_change())
}

pub async fn reconcile<K, E>(obj: Arc<K>, ctx: Arc<Context<E>>) -> Result<Action, ManagerError>
where
    K: Managed,
    E: ExternalClient<Params = K::Params, Observation = K::Observation>,
{
    counter!(RECONCILE_TOTAL, 1u64, "kind" => ctx.kind.as_str());
    let api = api_for(&ctx.client, obj.as_ref());
    let name = obj.name_any();

    if obj.meta().deletion_timestamp.is_some() {
        return finalize(obj.as_ref(), &api, &ctx).await;
    }
    // Reject an unusable connection secret before anything is issued.
    if let Some(target) = obj.connection_secret() {
        hub::connection_secret_namespace(target, obj.namespace().as_deref())?;
    }
    if hub::add_finalizer(&api, obj.as_ref(), FINALIZER).await? {
        debug!(kind = %ctx.kind, name = %name, "finalizer added");
    }

    let external_name = obj.external_name().unwrap_or_default().to_string();
    let mut params = obj.for_provider().clone();
    let observation = match timed(ctx.kind, Operation::Get, ctx.external.observe(&mut params, &external_name)).await {
        Ok(o) => o,
        Err(e) => return Err(fail(&api, obj.as_ref(), e).await),
    };

    if observation.resource_late_initialized {
        hub::patch_for_provider(&api, &name, &params).await?;
        debug!(kind = %ctx.kind, name = %name, "parameters late-initialized");
    }

    if !observation.resource_exists {
        if ctx.external.initialize(&mut params) {
            hub::patch_for_provider(&api, &name, &params).await?;
            debug!(kind = %ctx.kind, name = %name, "identity pinned before create");
        }
        let created = match timed(ctx.kind, Operation::Create, ctx.external.create(&params)).await {
            Ok(c) => c,
            Err(e) => return Err(fail(&api, obj.as_ref(), e).await),
        };
        hub::annotate_external_name(&api, &name, &created.external_name).await?;
        publish(&ctx.client, obj.as_ref(), &created.connection_details).await?;
        info!(kind = %ctx.kind, name = %name, external_name = %created.external_name, "remote object created");
        write_status(&api, obj.as_ref(), None, Outcome::Created).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let outcome = if observation.resource_up_to_date {
        publish(&ctx.client, obj.as_ref(), &observation.connection_details).await?;
        Outcome::UpToDate
    } else {
        let diff: Vec<String> = observation.diff.iter().map(ToString::to_string).collect();
        info!(kind = %ctx.kind, name = %name, ?diff, "updating remote object");
        let updated = match timed(ctx.kind, Operation::Update, ctx.external.update(&params, &external_name)).await {
            Ok(u) => u,
            Err(e) => return Err(fail(&api, obj.as_ref(), e).await),
        };
        publish(&ctx.client, obj.as_ref(), &updated.connection_details).await?;
        Outcome::Updated
    };
    write_status(&api, obj.as_ref(), observation.at_provider.as_ref(), outcome).await?;
    Ok(Action::requeue(ctx.poll_interval))
}

pub fn error_policy<K, E>(obj: Arc<K>, err: &ManagerError, ctx: Arc<Context<E>>) -> Action
where
    K: Managed,
{
    counter!(RECONCILE_ERRORS_TOTAL, 1u64, "kind" => ctx.kind.as_str());
    warn!(kind = %ctx.kind, name = %obj.name_any(), class = ?err.kind(), error = %err, "reconcile failed");
    Action::requeue(ERROR_REQUEUE)
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    kind: ManagedKind,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => debug!(?action, kind = %kind, "reconciliation completed"),
            Err(e) => debug!(error = ?e, kind = %kind, "reconciliation error"),
        }
        std::future::ready(())
    }
}

/// Settings shared by every controller.
#[derive(Debug, Clone)]
pub struct Settings {
    pub namespace: Option<String>,
    pub poll_interval: Duration,
    pub concurrency: u16,
}

type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn controller<K, E>(client: Client, scope: Scope, kind: ManagedKind, external: E, settings: &Settings) -> ControllerFuture
where
    K: Managed,
    E: ExternalClient<Params = K::Params, Observation = K::Observation> + 'static,
{
    let api = K::api(client.clone(), settings.namespace.as_deref());
    let ctx = Arc::new(Context { client, external, kind, poll_interval: settings.poll_interval });
    info!(kind = %kind, scope = ?scope, "starting controller");
    Box::pin(
        Controller::new(api, WatcherConfig::default())
            .with_config(ControllerConfig::default().concurrency(settings.concurrency))
            .shutdown_on_signal()
            .run(reconcile::<K, E>, error_policy::<K, E>, ctx)
            .for_each(log_reconcile_result(kind)),
    )
}

/// One controller future per registry entry.
pub fn build_controllers(
    client: Client,
    argo: ArgoClient,
    registry: &KindRegistry,
    settings: &Settings,
) -> Vec<ControllerFuture> {
    let secrets = KubeSecretResolver::new(client.clone());
    registry
        .entries()
        .iter()
        .map(|entry| {
            let c = client.clone();
            let (kind, scope) = (entry.kind, entry.scope);
            let cluster = || ClusterExternal::new(argo.clone(), secrets.clone());
            let repository = || RepositoryExternal::new(argo.clone(), secrets.clone());
            let token = || ProjectTokenExternal::new(argo.clone());
            match (kind, scope) {
                (ManagedKind::Cluster, Scope::Cluster) => controller::<Cluster, _>(c, scope, kind, cluster(), settings),
                (ManagedKind::Cluster, Scope::Namespaced) => {
                    controller::<NamespacedCluster, _>(c, scope, kind, cluster(), settings)
                }
                (ManagedKind::Repository, Scope::Cluster) => {
                    controller::<Repository, _>(c, scope, kind, repository(), settings)
                }
                (ManagedKind::Repository, Scope::Namespaced) => {
                    controller::<NamespacedRepository, _>(c, scope, kind, repository(), settings)
                }
                (ManagedKind::ProjectToken, Scope::Cluster) => {
                    controller::<ProjectToken, _>(c, scope, kind, token(), settings)
                }
                (ManagedKind::ProjectToken, Scope::Namespaced) => {
                    controller::<NamespacedProjectToken, _>(c, scope, kind, token(), settings)
                }
            }
        })
        .collect()
}
