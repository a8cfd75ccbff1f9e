//! Common test utilities and helpers.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use giftbox::config::{RateLimitConfig, ShopifyConfig, UnlockConfig};
use giftbox::db::{self, CreateGift, DbPool, UserRole};
use giftbox::models::ProductType;
use giftbox::state::StateSettings;
use giftbox::{api, AppState};
use serde_json::Value;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "shpss_test_secret";

/// Initialize an in-memory database with the schema applied.
pub async fn setup_test_db() -> DbPool {
    let pool = db::init_pool(":memory:").await.unwrap();
    db::initialize_schema(&pool).await.unwrap();
    pool
}

/// Settings used by most tests: a generous public limit and a known secret.
pub fn test_settings() -> StateSettings {
    StateSettings {
        unlock: UnlockConfig {
            max_attempts: 3,
            lockout_secs: 600,
        },
        rate_limit: RateLimitConfig {
            public_per_minute: 1000,
            trust_forwarded_for: false,
        },
        shopify: ShopifyConfig {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        },
    }
}

/// Test application: the router plus direct handles on its state.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: StateSettings) -> Self {
        let pool = setup_test_db().await;
        let state = AppState::with_pool(pool, settings);
        let router = api::routes(state.clone()).with_state(state.clone());
        Self { router, state }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    /// Send one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Create a user and return a fresh token for them.
pub async fn create_test_token(pool: &DbPool, name: &str, role: UserRole) -> String {
    let user = db::create_user(pool, name, None, role).await.unwrap();
    db::create_api_token(pool, &user.id, "test").await.unwrap()
}

/// Insert a markdown gift with a known PIN.
pub async fn create_test_gift(pool: &DbPool, id: &str, pin: &str, locked: bool) -> db::Gift {
    db::create_gift(
        pool,
        CreateGift {
            id: id.to_string(),
            recipient_name: "Ada".to_string(),
            sender_name: "Lin".to_string(),
            access_pin: pin.to_string(),
            product_type: ProductType::Markdown,
            unlock_date: None,
            message: Some("Happy birthday, Ada!".to_string()),
            audio_url: None,
            video_url: None,
            image_urls: Vec::new(),
            locked,
        },
    )
    .await
    .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Create an unauthenticated GET request
pub fn public_get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Create an unauthenticated POST request with JSON body
pub fn public_post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Attach the socket peer a real connection would carry.
pub fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Create a GET request
pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Create a POST request with JSON body
pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Create a PUT request with JSON body
pub fn put_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Create a DELETE request
pub fn delete_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}
