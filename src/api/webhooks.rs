//! Webhooks Routes
//!
//! Shopify order webhooks. Every request must carry a valid
//! `X-Shopify-Hmac-Sha256` signature over the raw body.
//!
//! Routes:
//! - POST /webhooks/shopify/orders - Attach orders to the gifts they reference

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::status;
use crate::services::{apply_order, verify_shopify_signature, OrderTopic, ShopifyOrder};
use crate::{AppState, Error, Result};

const TOPIC_HEADER: &str = "x-shopify-topic";
const SIGNATURE_HEADER: &str = "x-shopify-hmac-sha256";
const WEBHOOK_ID_HEADER: &str = "x-shopify-webhook-id";

/// Build webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/shopify/orders", post(handle_shopify_order))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub topic: String,
    pub matched: Vec<String>,
    pub skipped: Vec<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle a Shopify order webhook.
///
/// POST /webhooks/shopify/orders
///
/// The signature is checked before the body is parsed. Topics other than
/// order create/paid/updated are acknowledged and ignored.
#[axum::debug_handler]
async fn handle_shopify_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    status::inc_webhook_received();

    let topic = header_str(&headers, TOPIC_HEADER).unwrap_or("").to_string();
    let delivery_id = header_str(&headers, WEBHOOK_ID_HEADER).unwrap_or("-");

    let secret = state.shopify.webhook_secret.as_deref().ok_or_else(|| {
        warn!(topic = %topic, "Webhook rejected, no secret configured");
        Error::Webhook("Webhook secret not configured".into())
    })?;

    let signature = header_str(&headers, SIGNATURE_HEADER).ok_or_else(|| {
        warn!(topic = %topic, delivery_id, "Webhook rejected, missing signature");
        Error::Webhook("Missing X-Shopify-Hmac-Sha256 header".into())
    })?;

    if let Err(e) = verify_shopify_signature(&body, secret, signature) {
        warn!(topic = %topic, delivery_id, "Webhook rejected, bad signature");
        return Err(e);
    }

    let Some(order_topic) = OrderTopic::from_header(&topic) else {
        debug!(topic = %topic, delivery_id, "Ignoring webhook topic");
        return Ok(Json(WebhookResponse {
            status: "ignored".into(),
            topic,
            matched: Vec::new(),
            skipped: Vec::new(),
        }));
    };

    let order: ShopifyOrder = serde_json::from_slice(&body)
        .map_err(|e| Error::InvalidInput(format!("Invalid order payload: {}", e)))?;

    let report = apply_order(&state.db, order_topic, &order).await?;
    status::add_webhook_matches(report.matched.len());

    info!(
        topic = %topic,
        delivery_id,
        matched = report.matched.len(),
        "Shopify webhook handled"
    );

    Ok(Json(WebhookResponse {
        status: "processed".into(),
        topic,
        matched: report.matched,
        skipped: report.skipped,
    }))
}
