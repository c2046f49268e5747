use anyhow::{Context as _, Result};
use argonaut_apis::KindRegistry;
use argonaut_argocd::ArgoClient;
use argonaut_manager::telemetry::{init_metrics, init_tracing};
use argonaut_manager::{build_controllers, Cli, Commands, RunArgs, Settings};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Crds { kinds } => print_crds(&kinds),
        Commands::Run(args) => {
            init_tracing();
            init_metrics();
            run(args).await
        }
    }
}

fn print_crds(kinds: &[argonaut_apis::ManagedKind]) -> Result<()> {
    let mut registry = KindRegistry::standard();
    registry.retain_kinds(kinds);
    for crd in registry.crds() {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd).context("rendering CRD")?);
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let argo = ArgoClient::new(args.argo_config()?).context("building Argo CD client")?;
    let client = argonaut_kubehub::client().await.context("connecting to Kubernetes")?;

    let mut registry = KindRegistry::standard();
    registry.retain_kinds(&args.kinds);
    let settings = Settings {
        namespace: args.namespace.clone(),
        poll_interval: args.poll_interval(),
        concurrency: args.max_concurrent_reconciles,
    };
    info!(
        server = %args.argocd_server,
        controllers = registry.len(),
        namespace = ?settings.namespace,
        "argonaut manager starting"
    );

    let controllers = build_controllers(client, argo, &registry, &settings);
    futures::future::join_all(controllers).await;
    info!("argonaut manager stopped");
    Ok(())
}
