//! HTTP transport against the Argo CD REST gateway (`/api/v1`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Code, RemoteError};
use crate::models::*;
use crate::{ClusterService, ProjectService, RepositoryService};

/// Connection settings for [`ArgoClient`].
#[derive(Debug, Clone)]
pub struct ArgoConfig {
    /// Base URL of the Argo CD server, e.g. `https://argocd.example.com`.
    pub server: Url,
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Deadline applied to every call.
    pub timeout: Duration,
}

impl ArgoConfig {
    pub fn new(server: Url) -> Self {
        Self { server, token: None, insecure: false, timeout: Duration::from_secs(120) }
    }
}

/// Argo CD API client implementing every service trait.
///
/// Cheap to clone; holds no per-object state.
#[derive(Debug, Clone)]
pub struct ArgoClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
    timeout: Duration,
}

/// Error body written by the grpc-gateway.
#[derive(Debug, Deserialize)]
struct GatewayError {
    code: Option<i32>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
}

impl ArgoClient {
    pub fn new(cfg: ArgoConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(cfg.insecure)
            .build()?;
        if cfg.server.cannot_be_a_base() {
            return Err(RemoteError::Request(format!("invalid server URL {}", cfg.server)));
        }
        Ok(Self { http, base: cfg.server, token: cfg.token, timeout: cfg.timeout })
    }

    /// `{base}/api/v1/{segments...}`; each segment is percent-encoded, so
    /// URL-valued keys (server, repo) stay a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Request(format!("invalid server URL {}", self.base)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(method = %method, url = %url, "argocd request");
        let rb = self.http.request(method, url).timeout(self.timeout);
        match &self.token {
            Some(t) => rb.bearer_auth(t),
            None => rb,
        }
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = rb.send().await.map_err(|e| self.transport(e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(error_from_body(status.as_u16(), body))
    }

    async fn json<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T, RemoteError> {
        let resp = self.send(rb).await?;
        let bytes = resp.bytes().await.map_err(|e| self.transport(e))?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn transport(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() { RemoteError::Timeout(self.timeout) } else { RemoteError::Transport(e) }
    }
}

fn error_from_body(status: u16, body: String) -> RemoteError {
    match serde_json::from_str::<GatewayError>(&body) {
        Ok(GatewayError { code: Some(code), message, error }) => {
            let message = if message.is_empty() { error } else { message };
            RemoteError::Status { code: Code::from_i32(code), message }
        }
        _ => RemoteError::Http { status, body },
    }
}

#[async_trait]
impl ClusterService for ArgoClient {
    async fn create(&self, cluster: &Cluster) -> Result<Cluster, RemoteError> {
        let url = self.endpoint(&["clusters"])?;
        self.json(self.request(Method::POST, url).json(cluster)).await
    }

    async fn get(&self, server: &str) -> Result<Cluster, RemoteError> {
        let mut url = self.endpoint(&["clusters", server])?;
        url.query_pairs_mut().append_pair("id.type", "url");
        self.json(self.request(Method::GET, url)).await
    }

    async fn update(&self, cluster: &Cluster) -> Result<Cluster, RemoteError> {
        let mut url = self.endpoint(&["clusters", &cluster.server])?;
        url.query_pairs_mut().append_pair("id.type", "url");
        self.json(self.request(Method::PUT, url).json(cluster)).await
    }

    async fn delete(&self, server: &str) -> Result<(), RemoteError> {
        let mut url = self.endpoint(&["clusters", server])?;
        url.query_pairs_mut().append_pair("id.type", "url");
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }
}

#[async_trait]
impl RepositoryService for ArgoClient {
    async fn create(&self, repo: &Repository) -> Result<Repository, RemoteError> {
        let url = self.endpoint(&["repositories"])?;
        self.json(self.request(Method::POST, url).json(repo)).await
    }

    async fn get(&self, repo: &str) -> Result<Repository, RemoteError> {
        let url = self.endpoint(&["repositories", repo])?;
        self.json(self.request(Method::GET, url)).await
    }

    async fn update(&self, repo: &Repository) -> Result<Repository, RemoteError> {
        let url = self.endpoint(&["repositories", &repo.repo])?;
        self.json(self.request(Method::PUT, url).json(repo)).await
    }

    async fn delete(&self, repo: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&["repositories", repo])?;
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }
}

#[async_trait]
impl ProjectService for ArgoClient {
    async fn get(&self, project: &str) -> Result<AppProject, RemoteError> {
        let url = self.endpoint(&["projects", project])?;
        self.json(self.request(Method::GET, url)).await
    }

    async fn create_token(&self, req: &ProjectTokenCreateRequest) -> Result<ProjectTokenResponse, RemoteError> {
        let url = self.endpoint(&["projects", &req.project, "roles", &req.role, "token"])?;
        self.json(self.request(Method::POST, url).json(req)).await
    }

    async fn delete_token(&self, project: &str, role: &str, iat: i64, id: &str) -> Result<(), RemoteError> {
        let iat = iat.to_string();
        let mut url = self.endpoint(&["projects", project, "roles", role, "token", &iat])?;
        if !id.is_empty() {
            url.query_pairs_mut().append_pair("id", id);
        }
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ArgoClient {
        ArgoClient::new(ArgoConfig::new(Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn endpoint_encodes_url_keys_as_one_segment() {
        let c = client("https://argocd.example.com/");
        let url = c.endpoint(&["clusters", "https://example.com/"]).unwrap();
        assert_eq!(url.path(), "/api/v1/clusters/https:%2F%2Fexample.com%2F");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let c = client("https://example.com/argocd");
        let url = c.endpoint(&["repositories"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/argocd/api/v1/repositories");
    }

    #[test]
    fn gateway_body_becomes_status() {
        let err = error_from_body(404, r#"{"error":"x","code":5,"message":"cluster \"a\" not found"}"#.to_string());
        match err {
            RemoteError::Status { code, message } => {
                assert_eq!(code, Code::NotFound);
                assert_eq!(message, "cluster \"a\" not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_body_stays_http() {
        let err = error_from_body(502, "<html>bad gateway</html>".to_string());
        assert!(matches!(err, RemoteError::Http { status: 502, .. }));
    }
}
