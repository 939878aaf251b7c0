//! The fully layered service, driven in-process with `oneshot`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use rest_router::app::build_api;
use rest_router::observability::{AccessLog, LogEntry, Redactor, REDACTED};
use rest_router::routing::RouteContext;
use rest_router::{HttpServer, MultiRouter, Router, ServiceConfig};

type Entries = Arc<Mutex<Vec<LogEntry>>>;

fn server(config: &ServiceConfig) -> (HttpServer, Entries) {
    server_for(config, build_api(config).unwrap())
}

fn server_for(config: &ServiceConfig, api: MultiRouter) -> (HttpServer, Entries) {
    let entries: Entries = Arc::default();
    let sink = Arc::clone(&entries);
    let access_log = AccessLog::new()
        .with_redactor(Redactor::new(["Authorization"]).unwrap())
        .with_sink(move |entry: &LogEntry| sink.lock().unwrap().push(entry.clone()));

    let server = HttpServer::new(config, api).with_access_log(access_log);
    (server, entries)
}

async fn explode(_req: Request<Body>, _ctx: RouteContext) -> &'static str {
    panic!("handler failed");
}

async fn stall(_req: Request<Body>, _ctx: RouteContext) -> &'static str {
    tokio::time::sleep(Duration::from_secs(30)).await;
    "late"
}

fn faulty_api() -> MultiRouter {
    let router = Router::builder("/faulty")
        .route(Method::GET, "/boom", explode)
        .unwrap()
        .route(Method::GET, "/stall", stall)
        .unwrap()
        .build()
        .unwrap();
    MultiRouter::new("/", vec![router]).unwrap()
}

#[tokio::test]
async fn one_redacted_entry_per_request() {
    let (server, entries) = server(&ServiceConfig::default());

    let request = Request::builder()
        .uri("/api/v1/admin/users")
        .header(header::AUTHORIZATION, "Bearer valid-token")
        .header(header::USER_AGENT, "chain-test")
        .header("x-request-id", "req-1")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.method, Method::GET);
    assert_eq!(entry.path, "/api/v1/admin/users");
    assert_eq!(entry.status, StatusCode::OK);
    assert_eq!(entry.trace_id.as_ref().unwrap().as_str(), "req-1");
    assert_eq!(entry.header("authorization"), Some(REDACTED));
    assert_eq!(entry.header("user-agent"), Some("chain-test"));
    assert_eq!(entry.header("x-request-id"), Some("req-1"));
}

#[tokio::test]
async fn short_circuits_are_logged_once() {
    let (server, entries) = server(&ServiceConfig::default());
    let app = server.router();

    let cases = [
        (Method::GET, "/api/v1/admin/users", StatusCode::UNAUTHORIZED),
        (Method::GET, "/api/v2/anything", StatusCode::NOT_FOUND),
        (Method::PATCH, "/api/v1/users/1", StatusCode::METHOD_NOT_ALLOWED),
        (Method::GET, "/api/v1/users/x", StatusCode::BAD_REQUEST),
    ];
    for (method, uri, expected) in &cases {
        let request = Request::builder()
            .method(method.clone())
            .uri(*uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), *expected, "{method} {uri}");
    }

    let entries = entries.lock().unwrap();
    let statuses: Vec<StatusCode> = entries.iter().map(|e| e.status).collect();
    assert_eq!(statuses, cases.iter().map(|(_, _, s)| *s).collect::<Vec<_>>());
}

#[tokio::test]
async fn handler_panic_becomes_logged_500() {
    let (server, entries) = server_for(&ServiceConfig::default(), faulty_api());
    let app = server.router();

    let request = Request::builder().uri("/faulty/boom").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));

    // The service keeps answering afterwards.
    let request = Request::builder().uri("/faulty/none").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let entries = entries.lock().unwrap();
    let logged: Vec<(&str, StatusCode)> = entries.iter().map(|e| (e.path.as_str(), e.status)).collect();
    assert_eq!(
        logged,
        vec![
            ("/faulty/boom", StatusCode::INTERNAL_SERVER_ERROR),
            ("/faulty/none", StatusCode::NOT_FOUND),
        ]
    );
    assert!(server.in_flight().is_empty());
}

#[tokio::test]
async fn abandoned_request_still_logged() {
    let (server, entries) = server_for(&ServiceConfig::default(), faulty_api());

    let request = Request::builder().uri("/faulty/stall").body(Body::empty()).unwrap();
    let abandoned = tokio::time::timeout(Duration::from_millis(50), server.router().oneshot(request)).await;
    assert!(abandoned.is_err());

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/faulty/stall");
    assert_eq!(entries[0].status.as_u16(), 499);
    assert!(server.in_flight().is_empty());
}

#[tokio::test]
async fn bare_options_on_cors_router_is_405() {
    let (server, entries) = server(&ServiceConfig::default());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/users/1")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");
    assert_eq!(entries.lock().unwrap()[0].status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn logged_trace_id_matches_response_header() {
    let (server, entries) = server(&ServiceConfig::default());

    let response = server
        .router()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let echoed = response.headers()["x-request-id"].to_str().unwrap().to_string();

    let entries = entries.lock().unwrap();
    assert_eq!(entries[0].trace_id.as_ref().unwrap().as_str(), echoed);
}

#[tokio::test]
async fn custom_trace_header() {
    let mut config = ServiceConfig::default();
    config.observability.trace_header = "x-correlation-id".to_string();
    let (server, _) = server(&config);

    let request = Request::builder()
        .uri("/api/health")
        .header("x-correlation-id", "corr-9")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-correlation-id"], "corr-9");
    assert!(response.headers().get("x-request-id").is_none());
}

#[tokio::test]
async fn oversized_bodies_rejected() {
    let mut config = ServiceConfig::default();
    config.security.max_body_size = 16;
    let (server, entries) = server(&config);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v1/admin/users/1")
        .header(header::CONTENT_LENGTH, "64")
        .body(Body::from(vec![0u8; 64]))
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(entries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn nothing_left_in_flight() {
    let (server, _) = server(&ServiceConfig::default());
    let response = server
        .router()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.in_flight().is_empty());
}
