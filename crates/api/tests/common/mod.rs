#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use mockup_api::auth::jwt::{JwtConfig, TokenVerifier};
use mockup_api::config::ServerConfig;
use mockup_api::router::build_app_router;
use mockup_api::state::AppState;
use mockup_core::types::DbId;
use mockup_pipeline::dispatcher::JobDispatcher;
use mockup_pipeline::queue::RetryPolicy;
use mockup_pipeline::store::{MemoryGenerationStore, MemoryJobQueue};
use tower::ServiceExt;

pub const USER_ID: DbId = 11;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: mockup_api::config::merge_origins(""),
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            leeway_secs: 0,
        },
    }
}

/// The application router over in-memory stores, plus handles to them.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryGenerationStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub config: ServerConfig,
}

impl TestApp {
    /// A token as the account service would mint it, valid for 15 minutes.
    pub fn token_for(&self, user_id: DbId) -> String {
        let exp = chrono::Utc::now().timestamp() + 15 * 60;
        self.token_with(serde_json::json!({ "sub": user_id, "exp": exp }))
    }

    pub fn token_with(&self, claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .unwrap()
    }

    pub fn token(&self) -> String {
        self.token_for(USER_ID)
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryGenerationStore::new());
    let queue = Arc::new(MemoryJobQueue::new(RetryPolicy::default()));
    let dispatcher = JobDispatcher::new(store.clone(), queue.clone());

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        tokens: Arc::new(TokenVerifier::new(&config.jwt)),
        pool: None,
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        queue,
        config,
    }
}

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn options_preflight(app: Router, uri: &str, origin: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(uri)
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
