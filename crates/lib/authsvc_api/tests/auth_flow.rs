//! Integration test — build the router over an in-memory store and drive
//! the register → login → refresh → logout flow through HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use authsvc_api::AppState;
use authsvc_core::AuthService;
use authsvc_core::config::TokenConfig;
use authsvc_core::store::MemoryCredentialStore;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    let mut tokens = TokenConfig::new("integration-test-key");
    tokens.hash_cost = 4;
    let service = AuthService::from_config(&tokens, Arc::new(MemoryCredentialStore::new()));
    authsvc_api::router(AppState {
        service: Arc::new(service),
    })
}

fn request(method: Method, uri: &str, ip: &str, body: Option<Value>) -> Request<Body> {
    let addr: SocketAddr = format!("{ip}:40000").parse().unwrap();
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let mut req = builder.body(body).unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

async fn register(app: &Router, email: &str) -> Value {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/register",
            "1.1.1.1",
            Some(json!({ "email": email })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn register_returns_user_and_pair() {
    let app = app();
    let body = register(&app, "a@b.com").await;

    assert!(body["user_id"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(body["access"].as_str().unwrap().split('.').count(), 3);
    assert_eq!(body["refresh"].as_str().unwrap().len(), 43);
}

#[tokio::test]
async fn register_rejects_bad_email_and_duplicates() {
    let app = app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/register",
            "1.1.1.1",
            Some(json!({ "email": "nope" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    register(&app, "a@b.com").await;
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/register",
            "1.1.1.1",
            Some(json!({ "email": "a@b.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn login_requires_known_user() {
    let app = app();
    let (status, _) = send(&app, request(Method::GET, "/login", "1.1.1.1", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(Method::GET, "/login?userID=ghost", "1.1.1.1", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let user_id = register(&app, "a@b.com").await["user_id"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = send(
        &app,
        request(
            Method::GET,
            &format!("/login?userID={user_id}"),
            "1.1.1.1",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["refresh"].is_string());
}

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let app = app();
    let reg = register(&app, "a@b.com").await;
    let pair = json!({ "access_token": reg["access"], "refresh_token": reg["refresh"] });

    let (status, rotated) = send(
        &app,
        request(Method::PATCH, "/refresh", "2.2.2.2", Some(pair.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh"], reg["refresh"]);
    assert_ne!(rotated["access"], reg["access"]);

    let (status, body) = send(
        &app,
        request(Method::PATCH, "/refresh", "2.2.2.2", Some(pair)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn logout_revokes_pair() {
    let app = app();
    let reg = register(&app, "a@b.com").await;
    let pair = json!({ "access_token": reg["access"], "refresh_token": reg["refresh"] });

    let (status, _) = send(
        &app,
        request(Method::POST, "/logout", "1.1.1.1", Some(pair.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request(Method::PATCH, "/refresh", "1.1.1.1", Some(pair)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_gets_json_error() {
    let app = app();
    let mut req = request(Method::PATCH, "/refresh", "1.1.1.1", None);
    req.headers_mut()
        .insert("content-type", "application/json".parse().unwrap());
    *req.body_mut() = Body::from("{not json");
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/register",
            "1.1.1.1",
            Some(json!({ "mail": "a@b.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn missing_connect_info_still_serves() {
    let app = app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "email": "x@y.z" }).to_string()))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
}
