//! Integration tests for the liveness endpoint

use std::net::TcpListener;
use std::sync::Arc;

use jwt_auth_service::configuration::get_configuration;
use jwt_auth_service::metrics::Metrics;
use jwt_auth_service::startup::run;
use jwt_auth_service::store::InMemoryStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = get_configuration().expect("Failed to read configuration.");
    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(Metrics::new().expect("Failed to register metrics"));
    let server =
        run(listener, store.clone(), store, metrics, &settings).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/nowhere", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/swagger/doc.json", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    let doc: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert!(doc["paths"]["/api/v1/login"]["post"].is_object());
    assert!(doc["paths"]["/api/v1/users/me"]["get"].is_object());
}

#[tokio::test]
async fn swagger_ui_is_served() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/swagger/", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    assert!(response.text().await.unwrap().contains("swagger"));
}

#[tokio::test]
async fn metrics_count_served_requests() {
    let addr = spawn_app();
    let client = reqwest::Client::new();

    client
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    let response = client
        .get(&format!("{}/api/v1/metrics", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    let body = response.text().await.unwrap();
    assert!(body.contains(
        "http_requests_total{method=\"GET\",path=\"/health_check\",status=\"200\"} 1"
    ));
    assert!(body.contains("http_request_duration_seconds_bucket"));
}
