//! Shopify order webhook processing.
//!
//! Verifies the `X-Shopify-Hmac-Sha256` signature and attaches order
//! details to every gift referenced from the order's line-item properties.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::db::{self, DbPool, OrderLink};
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Line-item property names that carry a gift id.
const GIFT_ID_PROPERTIES: &[&str] = &["gift_id", "gift id"];

// ============================================================================
// Payload Types
// ============================================================================

/// Shopify order payload (only the fields used here).
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyOrder {
    #[serde(default)]
    pub id: serde_json::Value,
    pub name: Option<String>,
    pub email: Option<String>,
    pub financial_status: Option<String>,
    #[serde(default)]
    pub line_items: Vec<ShopifyLineItem>,
}

impl ShopifyOrder {
    /// Shopify sends numeric ids; accept strings too.
    pub fn order_id(&self) -> Option<String> {
        match &self.id {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyLineItem {
    pub title: Option<String>,
    #[serde(default)]
    pub properties: Vec<LineItemProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemProperty {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl LineItemProperty {
    /// The gift id carried by this property, if it is a gift-id property.
    pub fn gift_id(&self) -> Option<String> {
        let name = self.name.trim().trim_start_matches('_').to_lowercase();
        if !GIFT_ID_PROPERTIES.contains(&name.as_str()) {
            return None;
        }
        let value = match &self.value {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Webhook topics this service acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTopic {
    Created,
    Paid,
    Updated,
}

impl OrderTopic {
    pub fn from_header(topic: &str) -> Option<Self> {
        match topic {
            "orders/create" => Some(Self::Created),
            "orders/paid" => Some(Self::Paid),
            "orders/updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// Result of applying one order to the gift table.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MatchReport {
    pub matched: Vec<String>,
    pub skipped: Vec<String>,
}

// ============================================================================
// Verification
// ============================================================================

/// Verify a Shopify webhook signature.
///
/// `header` is the base64 HMAC-SHA256 of the raw body. The comparison is
/// constant time.
pub fn verify_shopify_signature(body: &[u8], secret: &str, header: &str) -> Result<()> {
    let expected = BASE64
        .decode(header.trim())
        .map_err(|_| Error::Webhook("Invalid signature encoding".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::Webhook("Invalid secret".into()))?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| Error::Webhook("Signature verification failed".into()))
}

/// Compute the header value Shopify would send for `body`.
pub fn sign_shopify_payload(body: &[u8], secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::Webhook("Invalid secret".into()))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// ============================================================================
// Matching
// ============================================================================

/// Gift ids referenced by an order, in line-item order, without repeats.
pub fn referenced_gift_ids(order: &ShopifyOrder) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for item in &order.line_items {
        for property in &item.properties {
            if let Some(id) = property.gift_id() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

/// Attach an order to every gift it references.
///
/// Unknown gift ids and failed updates are logged and skipped; the loop
/// always runs to the end.
pub async fn apply_order(pool: &DbPool, topic: OrderTopic, order: &ShopifyOrder) -> Result<MatchReport> {
    let order_id = order
        .order_id()
        .ok_or_else(|| Error::InvalidInput("Order payload has no id".into()))?;

    let paid = topic == OrderTopic::Paid
        || order
            .financial_status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("paid"))
            .unwrap_or(false);

    let link = OrderLink {
        shopify_order_id: order_id.clone(),
        order_name: order.name.clone(),
        customer_email: order.email.clone(),
        paid,
    };

    let mut report = MatchReport::default();
    for gift_id in referenced_gift_ids(order) {
        match db::link_gift_to_order(pool, &gift_id, &link).await {
            Ok(gift) => {
                debug!(gift_id = %gift.id, order_id = %order_id, paid = gift.paid, "Gift linked to order");
                report.matched.push(gift_id);
            }
            Err(Error::NotFound(_)) => {
                warn!(gift_id = %gift_id, order_id = %order_id, "Order references unknown gift");
                report.skipped.push(gift_id);
            }
            Err(e) => {
                warn!(gift_id = %gift_id, order_id = %order_id, error = %e, "Failed to link gift");
                report.skipped.push(gift_id);
            }
        }
    }

    info!(
        order_id = %order_id,
        topic = ?topic,
        matched = report.matched.len(),
        skipped = report.skipped.len(),
        "Processed Shopify order"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(properties: serde_json::Value) -> ShopifyOrder {
        serde_json::from_value(json!({
            "id": 820982911946154508u64,
            "name": "#1001",
            "email": "jon@example.com",
            "financial_status": "pending",
            "line_items": [
                { "title": "Voice Gift", "properties": properties },
                { "title": "Gift Wrap" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"id":1}"#;
        let header = sign_shopify_payload(body, "shpss_secret").unwrap();
        assert!(verify_shopify_signature(body, "shpss_secret", &header).is_ok());
        assert!(verify_shopify_signature(body, "other", &header).is_err());
        assert!(verify_shopify_signature(b"{\"id\":2}", "shpss_secret", &header).is_err());
        assert!(verify_shopify_signature(body, "shpss_secret", "%%not base64%%").is_err());
    }

    #[test]
    fn test_gift_id_property_names() {
        let o = order(json!([
            { "name": "_gift_id", "value": "a" },
            { "name": "Gift ID", "value": "b" },
            { "name": "GIFT_ID", "value": "a" },
            { "name": "engraving", "value": "c" },
            { "name": "gift_id", "value": "   " }
        ]));
        assert_eq!(referenced_gift_ids(&o), vec!["a", "b"]);
    }

    #[test]
    fn test_numeric_order_id() {
        let o = order(json!([]));
        assert_eq!(o.order_id().as_deref(), Some("820982911946154508"));
    }

    #[test]
    fn test_missing_order_id() {
        let o: ShopifyOrder = serde_json::from_value(json!({ "line_items": [] })).unwrap();
        assert!(o.order_id().is_none());
    }

    #[test]
    fn test_topics() {
        assert_eq!(OrderTopic::from_header("orders/paid"), Some(OrderTopic::Paid));
        assert_eq!(OrderTopic::from_header("customers/create"), None);
    }
}
