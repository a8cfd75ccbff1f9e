//! Status Routes
//!
//! Health checks and metrics.
//!
//! Routes:
//! - GET /health - Basic health check
//! - GET /health/ready - Readiness check (database reachable)
//! - GET /health/live - Liveness check (server responding)
//! - GET /metrics - Prometheus text metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{self, PoolStats};
use crate::AppState;

// Global metrics (simple counters)
static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static UNLOCK_ATTEMPTS: AtomicU64 = AtomicU64::new(0);
static UNLOCK_SUCCESSES: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static WEBHOOK_GIFTS_MATCHED: AtomicU64 = AtomicU64::new(0);
static STARTUP_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize startup time. Call this once at server start.
pub fn init_startup_time() {
    let _ = STARTUP_TIME.get_or_init(Instant::now);
}

/// Get uptime in seconds since server start.
fn get_uptime_seconds() -> u64 {
    STARTUP_TIME.get().map(|start| start.elapsed().as_secs()).unwrap_or(0)
}

pub fn inc_unlock_attempt(unlocked: bool) {
    UNLOCK_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
    if unlocked {
        UNLOCK_SUCCESSES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn inc_webhook_received() {
    WEBHOOKS_RECEIVED.fetch_add(1, Ordering::Relaxed);
}

pub fn add_webhook_matches(count: usize) {
    WEBHOOK_GIFTS_MATCHED.fetch_add(count as u64, Ordering::Relaxed);
}

/// Middleware counting every request and every 5xx response.
pub async fn track_requests(req: Request, next: Next) -> Response {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
    let response = next.run(req).await;
    if response.status().is_server_error() {
        ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }
    response
}

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/live", get(liveness_check))
        .route("/metrics", get(prometheus_metrics))
}

// ============================================================================
// Response Types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<DependencyCheck>,
    pub pool: PoolStats,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Basic health check.
///
/// GET /health
#[axum::debug_handler]
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: get_uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check.
///
/// GET /health/ready
///
/// Returns 503 when the database cannot be queried.
#[axum::debug_handler]
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_check = check_database(&state).await;
    let ready = db_check.status == HealthStatus::Healthy;

    let response = ReadinessResponse {
        ready,
        checks: vec![db_check],
        pool: db::get_pool_stats(&state.db),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness check.
///
/// GET /health/live
#[axum::debug_handler]
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
///
/// GET /metrics
#[axum::debug_handler]
async fn prometheus_metrics() -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP giftbox_requests_total Total number of HTTP requests
# TYPE giftbox_requests_total counter
giftbox_requests_total {}

# HELP giftbox_errors_total Total number of 5xx responses
# TYPE giftbox_errors_total counter
giftbox_errors_total {}

# HELP giftbox_unlock_attempts_total Gift unlock requests
# TYPE giftbox_unlock_attempts_total counter
giftbox_unlock_attempts_total {}

# HELP giftbox_unlock_success_total Gift unlock requests that revealed content
# TYPE giftbox_unlock_success_total counter
giftbox_unlock_success_total {}

# HELP giftbox_webhooks_received_total Shopify webhooks received
# TYPE giftbox_webhooks_received_total counter
giftbox_webhooks_received_total {}

# HELP giftbox_webhook_gifts_matched_total Gifts linked to orders by webhooks
# TYPE giftbox_webhook_gifts_matched_total counter
giftbox_webhook_gifts_matched_total {}

# HELP giftbox_uptime_seconds Seconds since server start
# TYPE giftbox_uptime_seconds gauge
giftbox_uptime_seconds {}

# HELP giftbox_up Whether the service is up
# TYPE giftbox_up gauge
giftbox_up 1
"#,
        REQUEST_COUNT.load(Ordering::Relaxed),
        ERROR_COUNT.load(Ordering::Relaxed),
        UNLOCK_ATTEMPTS.load(Ordering::Relaxed),
        UNLOCK_SUCCESSES.load(Ordering::Relaxed),
        WEBHOOKS_RECEIVED.load(Ordering::Relaxed),
        WEBHOOK_GIFTS_MATCHED.load(Ordering::Relaxed),
        get_uptime_seconds(),
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check database connectivity.
async fn check_database(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    let result = db::health_check(&state.db).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, message) = match result {
        Ok(()) => (HealthStatus::Healthy, None),
        Err(e) => (HealthStatus::Unhealthy, Some(format!("Database error: {}", e))),
    };

    DependencyCheck {
        name: "database".into(),
        status,
        latency_ms: Some(latency_ms),
        message,
    }
}
