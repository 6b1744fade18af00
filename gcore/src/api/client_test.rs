use super::*;
use crate::api::test_helpers::{create_test_client, TEST_TOKEN};
use mockito::{Matcher, Server};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    name: String,
}

#[test]
fn endpoints_derive_from_base() {
    let endpoints = Endpoints::from_base("https://api.gcore.com/").unwrap();
    assert_eq!(endpoints.cloud, "https://api.gcore.com/cloud");
    assert_eq!(endpoints.cdn, "https://api.gcore.com");
    assert_eq!(endpoints.waap, "https://api.gcore.com/waap");
    assert_eq!(endpoints.iam, "https://api.gcore.com/iam");
    assert_eq!(endpoints.fastedge, "https://api.gcore.com/fastedge");

    let endpoints = endpoints
        .with_override(Service::Cloud, "https://cloud.example.com/api/")
        .unwrap();
    assert_eq!(endpoints.cloud, "https://cloud.example.com/api");
}

#[test]
fn endpoints_reject_invalid_urls() {
    assert!(matches!(
        Endpoints::from_base("not a url"),
        Err(ApiError::InvalidUrl(_))
    ));
    assert!(matches!(
        Endpoints::from_base("ftp://api.gcore.com"),
        Err(ApiError::InvalidUrl(_))
    ));
}

#[test]
fn credentials_do_not_leak_in_debug_output() {
    let creds = Credentials::ApiKey("secret".to_string());
    assert_eq!(format!("{:?}", creds), "ApiKey(***)");
    assert_eq!(creds.header_value(), "APIKey secret");
    assert_eq!(
        Credentials::Bearer("jwt".to_string()).header_value(),
        "Bearer jwt"
    );
}

#[tokio::test]
async fn get_sends_api_key_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/projects/1")
        .match_header("authorization", format!("APIKey {}", TEST_TOKEN).as_str())
        .with_status(200)
        .with_body(r#"{"id":1,"name":"default"}"#)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    let project: Project = client.get(Service::Cloud, "/v1/projects/1").await.unwrap();

    assert_eq!(project.id, 1);
    assert_eq!(project.name, "default");
    mock.assert_async().await;
}

#[tokio::test]
async fn not_found_is_reported_with_message() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/projects/404")
        .with_status(404)
        .with_body(r#"{"message":"Project 404 not found","exception_class":"NotFound"}"#)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    let err = client
        .get::<Project>(Service::Cloud, "/v1/projects/404")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("Project 404 not found"));
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/projects")
        .with_status(401)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    let result = client.get::<serde_json::Value>(Service::Cloud, "/v1/projects").await;
    assert!(matches!(result, Err(ApiError::AuthError)));
}

#[tokio::test]
async fn idempotent_requests_retry_server_errors() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/v1/regions")
        .with_status(503)
        .expect(4)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    let result = client.get::<serde_json::Value>(Service::Cloud, "/v1/regions").await;

    assert!(matches!(result, Err(ApiError::ServiceUnavailable)));
    failing.assert_async().await;
}

#[tokio::test]
async fn post_does_not_retry_server_errors() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/networks/1/2")
        .with_status(500)
        .with_body(r#"{"message":"boom"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    let result = client
        .post::<serde_json::Value, _>(
            Service::Cloud,
            "/v1/networks/1/2",
            &serde_json::json!({"name": "net"}),
        )
        .await;

    assert!(matches!(result, Err(ApiError::ApiError { status: 500, .. })));
    mock.assert_async().await;
}

/// Accepts connections and never answers; returns the address and a
/// counter of accepted connections.
async fn silent_server() -> (String, Arc<std::sync::atomic::AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut open = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            open.push(socket);
        }
    });
    (url, accepted)
}

fn impatient_client(url: &str) -> Client {
    let retry = RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 1,
    };
    Client::with_config(
        Endpoints::single(url).unwrap(),
        Credentials::ApiKey(TEST_TOKEN.to_string()),
        retry,
    )
    .unwrap()
}

#[tokio::test]
async fn post_is_not_resent_after_timeout() {
    let (url, accepted) = silent_server().await;
    let client = impatient_client(&url);

    let result = client
        .post::<serde_json::Value, _>(
            Service::Cloud,
            "/v2/instances/1/2",
            &serde_json::json!({"names": ["web"]}),
        )
        .await;

    assert!(matches!(result, Err(ApiError::Timeout(1))));
    assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_is_retried_after_timeout() {
    let (url, accepted) = silent_server().await;
    let client = impatient_client(&url);

    let result = client.get::<serde_json::Value>(Service::Cloud, "/v1/regions").await;

    assert!(matches!(result, Err(ApiError::Timeout(1))));
    assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_bodies_decode_as_unit() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/cdn/resources/7")
        .with_status(204)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    client
        .delete_empty(Service::Cdn, "/cdn/resources/7")
        .await
        .unwrap();
}

#[tokio::test]
async fn post_bytes_sends_octet_stream() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/binaries/raw")
        .match_header("content-type", "application/octet-stream")
        .match_body(Matcher::Exact("\0asm".to_string()))
        .with_status(200)
        .with_body(r#"{"id":12,"status":1}"#)
        .create_async()
        .await;

    let client = create_test_client(&server.url());
    let value: serde_json::Value = client
        .post_bytes(Service::FastEdge, "/v1/binaries/raw", b"\0asm".to_vec())
        .await
        .unwrap();

    assert_eq!(value["id"], 12);
    mock.assert_async().await;
}
