//! End-to-end tests against a real listener.

mod common;

use axum::{
    body::Body,
    http::{Method, Request},
};
use chrono::DateTime;
use reqwest::{header, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};

use common::{spawn_app, spawn_server, start_identity_service};
use rest_router::app::permissions::DELETE_USERS;
use rest_router::health::HealthStatus;
use rest_router::routing::{MultiRouter, RouteContext, Router};
use rest_router::security::PermissionSet;
use rest_router::ServiceConfig;

fn local_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

#[tokio::test]
async fn health_is_public_and_monotonic() {
    let server = spawn_app(local_config()).await;
    let client = reqwest::Client::new();

    let mut times = Vec::new();
    for _ in 0..2 {
        let response = client.get(server.url("/api/health")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthStatus = response.json().await.unwrap();
        assert_eq!(health.status, "ok");
        times.push(DateTime::parse_from_rfc3339(&health.time).unwrap());
    }
    assert!(times[0] <= times[1]);

    server.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn trace_id_is_propagated_or_generated() {
    let server = spawn_app(local_config()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/api/health"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = client.get(server.url("/api/health")).send().await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(generated.len(), 36);

    // Unknown paths are traced too.
    let response = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn public_user_route_validates_id() {
    let server = spawn_app(local_config()).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/api/v1/users/42")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user: Value = response.json().await.unwrap();
    assert_eq!(user["id"], 42);
    assert_eq!(user["name"], "John Doe");

    let response = client.get(server.url("/api/v1/users/abc")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn protected_routes_require_credentials_and_grants() {
    let server = spawn_app(local_config()).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/api/v1/admin/users")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let response = client
        .get(server.url("/api/v1/admin/users"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(server.url("/api/v1/admin/users"))
        .bearer_auth("valid-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);

    // Default grants do not include deletion.
    let response = client
        .delete(server.url("/api/v1/admin/users/1"))
        .bearer_auth("valid-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn per_user_grants_unlock_routes() {
    let mut config = local_config();
    config
        .auth
        .grants
        .insert("user-123".to_string(), PermissionSet::from([DELETE_USERS]));
    let server = spawn_app(config).await;
    let client = reqwest::Client::new();

    let response = client
        .delete(server.url("/api/v1/admin/users/1"))
        .bearer_auth("valid-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The explicit grant replaces the defaults.
    let response = client
        .get(server.url("/api/v1/admin/users"))
        .bearer_auth("valid-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wrong_method_lists_allowed_methods() {
    let server = spawn_app(local_config()).await;
    let client = reqwest::Client::new();

    let response = client.put(server.url("/api/v1/admin/users/7")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "DELETE");

    let response = client.post(server.url("/api/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");
}

#[tokio::test]
async fn cors_preflight_and_actual_requests() {
    let server = spawn_app(local_config()).await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, server.url("/api/v1/admin/users"))
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let h = response.headers();
    assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(h[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE");
    assert_eq!(h[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type, authorization");
    assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(h[header::ACCESS_CONTROL_MAX_AGE], "3600");

    let response = client
        .get(server.url("/api/v1/users/1"))
        .header(header::ORIGIN, "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");

    let response = client
        .get(server.url("/api/v1/users/1"))
        .header(header::ORIGIN, "http://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn external_identity_service() {
    let (identity_addr, seen) = start_identity_service(&[("good-token", "user-123")]).await;

    let mut config = local_config();
    config.auth.identity_service_url = Some(format!("http://{identity_addr}/verify"));
    let server = spawn_app(config).await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/api/v1/admin/users"))
        .bearer_auth("good-token")
        .header("x-request-id", "trace-from-client")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(server.url("/api/v1/admin/users"))
        .bearer_auth("valid-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].starts_with("get /verify "));
    assert!(seen[0].contains("x-request-id: trace-from-client\r\n"));
}

#[tokio::test]
async fn unreachable_identity_service_fails_closed() {
    // Bind and drop to get a port nothing listens on.
    let addr = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let mut config = local_config();
    config.auth.identity_service_url = Some(format!("http://{addr}/verify"));
    let server = spawn_app(config).await;

    let response = reqwest::Client::new()
        .get(server.url("/api/v1/admin/users"))
        .bearer_auth("valid-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn graceful_shutdown_stops_server() {
    let server = spawn_app(local_config()).await;
    let addr = server.addr;

    server.stop(Duration::from_secs(5)).await.unwrap();
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

fn slow_api(delay: Duration) -> MultiRouter {
    let slow = Router::builder("/slow")
        .route(Method::GET, "/", move |_req: Request<Body>, _ctx: RouteContext| async move {
            tokio::time::sleep(delay).await;
            "done"
        })
        .unwrap()
        .build()
        .unwrap();
    MultiRouter::new("/", vec![slow]).unwrap()
}

#[tokio::test]
async fn in_flight_requests_finish_during_drain() {
    let server = spawn_server(local_config(), slow_api(Duration::from_millis(300)), None).await;
    let url = server.url("/slow");

    let request = tokio::spawn(async move { reqwest::get(url).await.unwrap() });
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.stop(Duration::from_secs(5)).await.unwrap();
    let response = request.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "done");
}

#[tokio::test]
async fn drain_timeout_bounds_shutdown() {
    let mut config = local_config();
    config.shutdown.drain_timeout_secs = 1;
    let server = spawn_server(config, slow_api(Duration::from_secs(30)), None).await;
    let url = server.url("/slow");

    let _request = tokio::spawn(async move { reqwest::get(url).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    server.stop(Duration::from_secs(5)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
}
