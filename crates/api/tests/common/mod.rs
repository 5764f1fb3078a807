#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use orbit_api::auth::jwt::JwtConfig;
use orbit_api::auth::password::HasherKind;
use orbit_api::auth::session::SessionPolicy;
use orbit_api::config::ServerConfig;
use orbit_api::router::build_app_router;
use orbit_api::state::AppState;
use orbit_db::PoolSettings;
use sqlx::PgPool;
use tower::ServiceExt;

/// HMAC secret used by every integration test.
pub const TEST_JWT_SECRET: &str = "integration-test-secret-with-enough-length";

/// Build a test `ServerConfig` with safe defaults.
///
/// Refresh secrets are hashed with SHA-256 so tests do not pay the Argon2
/// work factor on every rotation.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        db: PoolSettings::default(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig::hmac(TEST_JWT_SECRET),
        session: SessionPolicy::default(),
        refresh_hasher: HasherKind::Sha256,
        password_min_length: 8,
        cleanup_interval: Duration::from_secs(3600),
    }
}

/// Build the full application router, using the given database pool.
///
/// Goes through [`build_app_router`] so tests exercise the same middleware
/// stack production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = Arc::new(test_config());
    let state = AppState::new(pool, Arc::clone(&config)).expect("test key material is valid");
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, Some(token)).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), Some(token)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None, Some(token)).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    app.oneshot(request).await.expect("router is infallible")
}
