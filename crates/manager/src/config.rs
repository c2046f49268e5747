use std::path::PathBuf;
use std::time::Duration;

use argonaut_apis::ManagedKind;
use argonaut_argocd::ArgoConfig;
use clap::{ArgAction, Args, Parser, Subcommand};
use url::Url;

use crate::error::ManagerError;

#[derive(Parser, Debug)]
#[command(name = "argonaut", version, about = "Declarative Argo CD clusters, repositories and project tokens")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controllers
    Run(RunArgs),
    /// Print the custom resource definitions as YAML
    Crds {
        /// Only these kinds (comma separated)
        #[arg(long = "kinds", value_delimiter = ',')]
        kinds: Vec<ManagedKind>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Argo CD base URL
    #[arg(long = "argocd-server", env = "ARGONAUT_ARGOCD_SERVER")]
    pub argocd_server: Url,

    /// File holding the Argo CD bearer token
    #[arg(long = "argocd-token-file", env = "ARGONAUT_ARGOCD_TOKEN_FILE", conflicts_with = "argocd_token")]
    pub argocd_token_file: Option<PathBuf>,

    /// Argo CD bearer token
    #[arg(long = "argocd-token", env = "ARGONAUT_ARGOCD_TOKEN", hide_env_values = true)]
    pub argocd_token: Option<String>,

    /// Skip TLS verification of the Argo CD server
    #[arg(long = "insecure", env = "ARGONAUT_ARGOCD_INSECURE", action = ArgAction::SetTrue)]
    pub insecure: bool,

    /// Deadline for each remote call
    #[arg(long = "call-timeout-secs", env = "ARGONAUT_CALL_TIMEOUT_SECS", default_value_t = 120)]
    pub call_timeout_secs: u64,

    /// Re-observe interval for settled objects
    #[arg(long = "poll-interval-secs", env = "ARGONAUT_POLL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Concurrent reconciles per controller
    #[arg(long = "max-concurrent-reconciles", env = "ARGONAUT_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent_reconciles: u16,

    /// Watch namespaced kinds in this namespace only
    #[arg(long = "namespace", env = "ARGONAUT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Run only these kinds (comma separated); default all
    #[arg(long = "kinds", value_delimiter = ',')]
    pub kinds: Vec<ManagedKind>,
}

impl RunArgs {
    pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs) }

    /// Token from the flag, or the trimmed contents of the token file.
    pub fn bearer_token(&self) -> Result<Option<String>, ManagerError> {
        if let Some(t) = &self.argocd_token {
            return Ok(Some(t.clone()));
        }
        let Some(path) = &self.argocd_token_file else { return Ok(None) };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ManagerError::Config(format!("reading token file {}: {e}", path.display())))?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(ManagerError::Config(format!("token file {} is empty", path.display())));
        }
        Ok(Some(token.to_string()))
    }

    pub fn argo_config(&self) -> Result<ArgoConfig, ManagerError> {
        let mut cfg = ArgoConfig::new(self.argocd_server.clone());
        cfg.token = self.bearer_token()?;
        cfg.insecure = self.insecure;
        cfg.timeout = Duration::from_secs(self.call_timeout_secs);
        Ok(cfg)
    }
}
