#![forbid(unsafe_code)]

use std::time::Duration;

use argonaut_argocd::{
    classify, ArgoClient, ArgoConfig, Cluster, ClusterService, ProjectService, ProjectTokenCreateRequest,
    RepositoryService,
};
use argonaut_core::ErrorKind;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ArgoClient {
    let mut cfg = ArgoConfig::new(Url::parse(&server.uri()).unwrap());
    cfg.token = Some("s3cr3t".to_string());
    cfg.timeout = Duration::from_secs(5);
    ArgoClient::new(cfg).unwrap()
}

#[tokio::test]
async fn get_cluster_parses_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v1/clusters/.+$"))
        .and(query_param("id.type", "url"))
        .and(header("authorization", "Bearer s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "server": "https://example.com/",
            "name": "testcluster",
            "namespaces": ["default"],
            "info": { "serverVersion": "1.29", "connectionState": { "status": "Successful" } }
        })))
        .mount(&server)
        .await;

    let cluster = ClusterService::get(&client(&server), "https://example.com/").await.unwrap();
    assert_eq!(cluster.name, "testcluster");
    assert_eq!(cluster.namespaces, vec!["default".to_string()]);
    assert_eq!(cluster.info.server_version, "1.29");
}

#[tokio::test]
async fn missing_cluster_classifies_as_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v1/clusters/.+$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": "cluster \"https://example.com/\" not found",
            "code": 5,
            "message": "cluster \"https://example.com/\" not found"
        })))
        .mount(&server)
        .await;

    let err = ClusterService::get(&client(&server), "https://example.com/").await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::NotFound);
    assert!(err.to_string().contains("code = NotFound desc = cluster"));
}

#[tokio::test]
async fn permission_denied_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v1/repositories/.+$"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "code": 7,
            "message": "permission denied"
        })))
        .mount(&server)
        .await;

    let err = RepositoryService::get(&client(&server), "https://github.com/example/repo.git").await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn create_cluster_sends_only_set_fields() {
    let server = MockServer::start().await;
    let expected = serde_json::json!({
        "server": "https://example.com/",
        "name": "testcluster",
        "config": { "tlsClientConfig": { "insecure": true } }
    });
    Mock::given(method("POST"))
        .and(path("/api/v1/clusters"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(&expected))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = Cluster { server: "https://example.com/".into(), name: "testcluster".into(), ..Default::default() };
    req.config.tls_client_config.insecure = true;
    let created = ClusterService::create(&client(&server), &req).await.unwrap();
    assert_eq!(created.server, "https://example.com/");
}

#[tokio::test]
async fn token_create_and_delete_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projects/team-a/roles/ci/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "jwt" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/projects/team-a/roles/ci/token/1700000000"))
        .and(query_param("id", "build"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server);
    let req = ProjectTokenCreateRequest {
        project: "team-a".into(),
        role: "ci".into(),
        id: "build".into(),
        expires_in: 3600,
        ..Default::default()
    };
    let resp = c.create_token(&req).await.unwrap();
    assert_eq!(resp.token, "jwt");
    c.delete_token("team-a", "ci", 1_700_000_000, "build").await.unwrap();
}

#[tokio::test]
async fn non_json_failure_is_other() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/v1/repositories/.+$"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = RepositoryService::delete(&client(&server), "https://github.com/example/repo.git").await.unwrap_err();
    assert_eq!(classify(&err), ErrorKind::Other);
}
