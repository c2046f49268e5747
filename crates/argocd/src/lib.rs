//! Argonaut remote client: narrow Argo CD services, one per managed kind.
//!
//! The service traits are pure transport. Policy (what to send, how to treat
//! absence) lives in the external reconcilers.

#![forbid(unsafe_code)]

use async_trait::async_trait;

#[cfg(any(test, feature = "mock"))]
use mockall::automock;

pub mod classify;
pub mod error;
pub mod http;
pub mod models;

pub use classify::{classify, classify_message, is_not_found};
pub use error::{Code, RemoteError};
pub use http::{ArgoClient, ArgoConfig};
pub use models::*;

/// Cluster registrations, keyed by server URL.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ClusterService: Send + Sync {
    async fn create(&self, cluster: &Cluster) -> Result<Cluster, RemoteError>;
    async fn get(&self, server: &str) -> Result<Cluster, RemoteError>;
    async fn update(&self, cluster: &Cluster) -> Result<Cluster, RemoteError>;
    async fn delete(&self, server: &str) -> Result<(), RemoteError>;
}

/// Repository credentials, keyed by repository URL.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait RepositoryService: Send + Sync {
    async fn create(&self, repo: &Repository) -> Result<Repository, RemoteError>;
    async fn get(&self, repo: &str) -> Result<Repository, RemoteError>;
    async fn update(&self, repo: &Repository) -> Result<Repository, RemoteError>;
    async fn delete(&self, repo: &str) -> Result<(), RemoteError>;
}

/// Project role tokens. Argo CD has no token read or update call; tokens are
/// found through their project.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn get(&self, project: &str) -> Result<AppProject, RemoteError>;
    async fn create_token(&self, req: &ProjectTokenCreateRequest) -> Result<ProjectTokenResponse, RemoteError>;
    async fn delete_token(&self, project: &str, role: &str, iat: i64, id: &str) -> Result<(), RemoteError>;
}
