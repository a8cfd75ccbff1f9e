//! Admin Routes
//!
//! Merchant dashboard over gifts and contributions. Requires an admin token.
//!
//! Routes:
//! - GET /admin/gifts - List gifts
//! - POST /admin/gifts - Create a gift
//! - GET /admin/gifts/:id - Full gift record, including the PIN
//! - PUT /admin/gifts/:id - Partial update
//! - DELETE /admin/gifts/:id - Delete a gift and its contributions
//! - POST /admin/gifts/:id/reset-attempts - Clear the unlock counter
//! - DELETE /admin/contributions/:id - Remove a contribution
//! - GET /admin/stats - Dashboard counts

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::db::{self, CreateGift, Gift, GiftFilter, Page, UpdateGift};
use crate::middleware::AuthContext;
use crate::models::{new_id, GiftContent, ProductType};
use crate::services::generate_pin;
use crate::{AppState, Error, Result};

/// Build admin routes. Auth layers are applied by the caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gifts", get(list_gifts).post(create_gift))
        .route(
            "/gifts/:id",
            get(get_gift).put(update_gift).delete(delete_gift),
        )
        .route("/gifts/:id/reset-attempts", post(reset_attempts))
        .route("/contributions/:id", delete(delete_contribution))
        .route("/stats", get(get_stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing gifts.
#[derive(Debug, Deserialize, Default)]
pub struct ListGiftsQuery {
    pub product_type: Option<String>,
    pub viewed: Option<bool>,
    pub paid: Option<bool>,
    pub q: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Full gift record as the admin sees it.
#[derive(Debug, Serialize)]
pub struct GiftRecord {
    pub id: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub access_pin: String,
    pub product_type: String,
    pub unlock_date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_urls: Vec<String>,
    pub viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    pub locked: bool,
    pub disabled: bool,
    pub shopify_order_id: Option<String>,
    pub order_name: Option<String>,
    pub customer_email: Option<String>,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Gift> for GiftRecord {
    fn from(gift: Gift) -> Self {
        let image_urls = gift.image_urls();
        Self {
            id: gift.id,
            recipient_name: gift.recipient_name,
            sender_name: gift.sender_name,
            access_pin: gift.access_pin,
            product_type: gift.product_type,
            unlock_date: gift.unlock_date,
            message: gift.message,
            audio_url: gift.audio_url,
            video_url: gift.video_url,
            image_urls,
            viewed: gift.viewed,
            viewed_at: gift.viewed_at,
            locked: gift.locked,
            disabled: gift.disabled,
            shopify_order_id: gift.shopify_order_id,
            order_name: gift.order_name,
            customer_email: gift.customer_email,
            paid: gift.paid,
            created_at: gift.created_at,
            updated_at: gift.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListGiftsResponse {
    pub gifts: Vec<GiftRecord>,
    pub offset: u32,
    pub limit: u32,
}

/// Create gift request.
#[derive(Debug, Deserialize)]
pub struct CreateGiftRequest {
    /// Supplied when the storefront already minted an id for the line item
    pub id: Option<String>,
    pub recipient_name: String,
    pub sender_name: String,
    pub access_pin: Option<String>,
    pub product_type: String,
    pub unlock_date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default = "default_locked")]
    pub locked: bool,
}

fn default_locked() -> bool {
    true
}

/// Partial gift update. `unlock_date: null` clears the date.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateGiftRequest {
    pub recipient_name: Option<String>,
    pub sender_name: Option<String>,
    pub access_pin: Option<String>,
    pub product_type: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub unlock_date: Option<Option<DateTime<Utc>>>,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub locked: Option<bool>,
    pub disabled: Option<bool>,
}

/// Distinguish an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub viewed: i64,
    pub paid: i64,
    pub by_product_type: BTreeMap<String, i64>,
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_product_type(raw: &str) -> Result<ProductType> {
    ProductType::from_str(raw).ok_or_else(|| {
        Error::Validation(format!(
            "Unknown product_type '{}', expected audio, video, markdown or gallery",
            raw
        ))
    })
}

fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn validate_pin(pin: &str) -> Result<String> {
    let pin = pin.trim();
    if pin.len() < 4 || pin.len() > 12 {
        return Err(Error::Validation("access_pin must be 4 to 12 characters".into()));
    }
    Ok(pin.to_string())
}

/// Drop blank entries from a list of image urls.
fn clean_image_urls(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// List gifts.
///
/// GET /admin/gifts
#[axum::debug_handler]
async fn list_gifts(
    State(state): State<AppState>,
    Query(query): Query<ListGiftsQuery>,
) -> Result<Json<ListGiftsResponse>> {
    let product_type = query
        .product_type
        .as_deref()
        .map(parse_product_type)
        .transpose()?;
    let page = Page::new(query.offset, query.limit);

    let gifts = db::list_gifts(
        &state.db,
        GiftFilter {
            product_type,
            viewed: query.viewed,
            paid: query.paid,
            search_query: query.q.filter(|q| !q.trim().is_empty()),
            page,
        },
    )
    .await?;

    Ok(Json(ListGiftsResponse {
        gifts: gifts.into_iter().map(GiftRecord::from).collect(),
        offset: query.offset,
        limit: page.limit as u32,
    }))
}

/// Create a gift.
///
/// POST /admin/gifts
#[axum::debug_handler]
async fn create_gift(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateGiftRequest>,
) -> Result<(StatusCode, Json<GiftRecord>)> {
    let product_type = parse_product_type(&request.product_type)?;
    let recipient_name = require_non_empty("recipient_name", &request.recipient_name)?;
    let sender_name = require_non_empty("sender_name", &request.sender_name)?;
    let access_pin = match request.access_pin.as_deref() {
        Some(pin) => validate_pin(pin)?,
        None => generate_pin(),
    };
    let image_urls = clean_image_urls(request.image_urls);

    product_type
        .validate_content(&GiftContent {
            message: request.message.as_deref(),
            audio_url: request.audio_url.as_deref(),
            video_url: request.video_url.as_deref(),
            image_urls: &image_urls,
        })
        .map_err(Error::Validation)?;

    let id = match request.id {
        Some(id) => require_non_empty("id", &id)?,
        None => new_id(),
    };

    let gift = db::create_gift(
        &state.db,
        CreateGift {
            id,
            recipient_name,
            sender_name,
            access_pin,
            product_type,
            unlock_date: request.unlock_date,
            message: request.message,
            audio_url: request.audio_url,
            video_url: request.video_url,
            image_urls,
            locked: request.locked,
        },
    )
    .await?;

    info!(gift_id = %gift.id, product_type = %product_type, admin = %auth.user_id, "Gift created");

    Ok((StatusCode::CREATED, Json(GiftRecord::from(gift))))
}

/// Get the full gift record.
///
/// GET /admin/gifts/:id
#[axum::debug_handler]
async fn get_gift(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GiftRecord>> {
    let gift = db::get_gift(&state.db, &id).await?;
    Ok(Json(GiftRecord::from(gift)))
}

/// Update a gift.
///
/// PUT /admin/gifts/:id
///
/// The merged result must still satisfy the product type's content rules.
#[axum::debug_handler]
async fn update_gift(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(request): Json<UpdateGiftRequest>,
) -> Result<Json<GiftRecord>> {
    let existing = db::get_gift(&state.db, &id).await?;

    let product_type = request
        .product_type
        .as_deref()
        .map(parse_product_type)
        .transpose()?;
    let recipient_name = request
        .recipient_name
        .as_deref()
        .map(|v| require_non_empty("recipient_name", v))
        .transpose()?;
    let sender_name = request
        .sender_name
        .as_deref()
        .map(|v| require_non_empty("sender_name", v))
        .transpose()?;
    let access_pin = request.access_pin.as_deref().map(validate_pin).transpose()?;
    let image_urls = request.image_urls.map(clean_image_urls);

    let effective_type = match product_type {
        Some(t) => t,
        None => existing.product_type_enum().ok_or_else(|| {
            Error::Internal(format!("Stored gift has unknown product type: {}", existing.product_type))
        })?,
    };
    let existing_images = existing.image_urls();
    effective_type
        .validate_content(&GiftContent {
            message: request.message.as_deref().or(existing.message.as_deref()),
            audio_url: request.audio_url.as_deref().or(existing.audio_url.as_deref()),
            video_url: request.video_url.as_deref().or(existing.video_url.as_deref()),
            image_urls: image_urls.as_deref().unwrap_or(&existing_images),
        })
        .map_err(Error::Validation)?;

    let gift = db::update_gift(
        &state.db,
        &id,
        UpdateGift {
            recipient_name,
            sender_name,
            access_pin,
            product_type,
            unlock_date: request.unlock_date,
            message: request.message,
            audio_url: request.audio_url,
            video_url: request.video_url,
            image_urls,
            locked: request.locked,
            disabled: request.disabled,
        },
    )
    .await?;

    info!(gift_id = %gift.id, admin = %auth.user_id, "Gift updated");

    Ok(Json(GiftRecord::from(gift)))
}

/// Delete a gift.
///
/// DELETE /admin/gifts/:id
#[axum::debug_handler]
async fn delete_gift(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    db::delete_gift(&state.db, &id).await?;
    info!(gift_id = %id, admin = %auth.user_id, "Gift deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Clear the failed-PIN counter for a gift.
///
/// POST /admin/gifts/:id/reset-attempts
#[axum::debug_handler]
async fn reset_attempts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    // 404 for unknown gifts rather than a silent no-op
    let gift = db::get_gift(&state.db, &id).await?;
    db::reset_unlock_attempts(&state.db, &gift.id).await?;
    info!(gift_id = %gift.id, admin = %auth.user_id, "Unlock attempts reset");
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a contribution.
///
/// DELETE /admin/contributions/:id
#[axum::debug_handler]
async fn delete_contribution(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    db::delete_contribution(&state.db, &id).await?;
    info!(contribution_id = %id, admin = %auth.user_id, "Contribution removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Dashboard counts.
///
/// GET /admin/stats
#[axum::debug_handler]
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = db::gift_stats(&state.db).await?;

    let mut by_product_type: BTreeMap<String, i64> = ProductType::all()
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();
    for (product_type, count) in stats.by_product_type {
        by_product_type.insert(product_type, count);
    }

    Ok(Json(StatsResponse {
        total: stats.total,
        viewed: stats.viewed,
        paid: stats.paid,
        by_product_type,
    }))
}
