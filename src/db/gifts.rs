//! Gift order database queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{decode_string_list, encode_string_list, ProductType};
use crate::{Error, Result};

use super::{contains_pattern, DbPool, Page};

// ============================================================================
// Types
// ============================================================================

/// Gift record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Gift {
    pub id: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub access_pin: String,
    pub product_type: String,
    pub unlock_date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    /// JSON array of image URLs
    pub image_urls: String,
    pub viewed: bool,
    pub viewed_at: Option<DateTime<Utc>>,
    /// Content is gated behind the access PIN
    pub locked: bool,
    /// Merchant switched the gift off
    pub disabled: bool,
    pub shopify_order_id: Option<String>,
    pub order_name: Option<String>,
    pub customer_email: Option<String>,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gift {
    /// Get the product type as enum.
    pub fn product_type_enum(&self) -> Option<ProductType> {
        ProductType::from_str(&self.product_type)
    }

    /// Decoded image URL list.
    pub fn image_urls(&self) -> Vec<String> {
        decode_string_list(&self.image_urls)
    }

    /// Whether the scheduled unlock date is still ahead of `now`.
    pub fn is_time_locked(&self, now: DateTime<Utc>) -> bool {
        self.unlock_date.map(|d| d > now).unwrap_or(false)
    }
}

/// Input for creating a new gift.
#[derive(Debug, Clone)]
pub struct CreateGift {
    pub id: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub access_pin: String,
    pub product_type: ProductType,
    pub unlock_date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_urls: Vec<String>,
    pub locked: bool,
}

/// Input for updating a gift. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateGift {
    pub recipient_name: Option<String>,
    pub sender_name: Option<String>,
    pub access_pin: Option<String>,
    pub product_type: Option<ProductType>,
    /// `Some(None)` clears the unlock date.
    pub unlock_date: Option<Option<DateTime<Utc>>>,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub locked: Option<bool>,
    pub disabled: Option<bool>,
}

/// Shopify order details attached to a gift by the webhook.
#[derive(Debug, Clone)]
pub struct OrderLink {
    pub shopify_order_id: String,
    pub order_name: Option<String>,
    pub customer_email: Option<String>,
    pub paid: bool,
}

/// Filters for the admin gift listing.
#[derive(Debug, Clone, Default)]
pub struct GiftFilter {
    pub product_type: Option<ProductType>,
    pub viewed: Option<bool>,
    pub paid: Option<bool>,
    /// Matches recipient, sender or order name
    pub search_query: Option<String>,
    pub page: Page,
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GiftStats {
    pub total: i64,
    pub viewed: i64,
    pub paid: i64,
    pub by_product_type: Vec<(String, i64)>,
}

// ============================================================================
// Queries
// ============================================================================

/// Create a new gift.
pub async fn create_gift(pool: &DbPool, input: CreateGift) -> Result<Gift> {
    let now = Utc::now();
    sqlx::query_as::<_, Gift>(
        r#"
        INSERT INTO gifts (
            id, recipient_name, sender_name, access_pin, product_type, unlock_date,
            message, audio_url, video_url, image_urls, locked, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.recipient_name)
    .bind(&input.sender_name)
    .bind(&input.access_pin)
    .bind(input.product_type.as_str())
    .bind(input.unlock_date)
    .bind(&input.message)
    .bind(&input.audio_url)
    .bind(&input.video_url)
    .bind(encode_string_list(&input.image_urls))
    .bind(input.locked)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::AlreadyExists(format!("Gift already exists: {}", input.id))
        }
        _ => Error::Database(e),
    })
}

/// Get a gift by ID.
pub async fn get_gift(pool: &DbPool, id: &str) -> Result<Gift> {
    get_gift_optional(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Gift not found: {}", id)))
}

/// Get a gift by ID, returning `None` when absent.
pub async fn get_gift_optional(pool: &DbPool, id: &str) -> Result<Option<Gift>> {
    sqlx::query_as::<_, Gift>("SELECT * FROM gifts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Update a gift's editable fields.
pub async fn update_gift(pool: &DbPool, id: &str, input: UpdateGift) -> Result<Gift> {
    let mut updates: Vec<&str> = Vec::new();
    let mut text_bindings: Vec<Option<String>> = Vec::new();

    if let Some(recipient_name) = input.recipient_name {
        updates.push("recipient_name = ?");
        text_bindings.push(Some(recipient_name));
    }
    if let Some(sender_name) = input.sender_name {
        updates.push("sender_name = ?");
        text_bindings.push(Some(sender_name));
    }
    if let Some(access_pin) = input.access_pin {
        updates.push("access_pin = ?");
        text_bindings.push(Some(access_pin));
    }
    if let Some(product_type) = input.product_type {
        updates.push("product_type = ?");
        text_bindings.push(Some(product_type.as_str().to_string()));
    }
    if let Some(unlock_date) = input.unlock_date {
        updates.push("unlock_date = ?");
        text_bindings.push(unlock_date.map(|d| d.to_rfc3339()));
    }
    if let Some(message) = input.message {
        updates.push("message = ?");
        text_bindings.push(Some(message));
    }
    if let Some(audio_url) = input.audio_url {
        updates.push("audio_url = ?");
        text_bindings.push(Some(audio_url));
    }
    if let Some(video_url) = input.video_url {
        updates.push("video_url = ?");
        text_bindings.push(Some(video_url));
    }
    if let Some(image_urls) = input.image_urls {
        updates.push("image_urls = ?");
        text_bindings.push(Some(encode_string_list(&image_urls)));
    }

    // Flags are inlined as literals; they never come from free text
    let mut flag_updates: Vec<String> = Vec::new();
    if let Some(locked) = input.locked {
        flag_updates.push(format!("locked = {}", locked as i32));
    }
    if let Some(disabled) = input.disabled {
        flag_updates.push(format!("disabled = {}", disabled as i32));
    }

    if updates.is_empty() && flag_updates.is_empty() {
        return get_gift(pool, id).await;
    }

    let mut assignments: Vec<String> = updates.iter().map(|s| s.to_string()).collect();
    assignments.extend(flag_updates);
    assignments.push("updated_at = ?".to_string());

    let query = format!(
        "UPDATE gifts SET {} WHERE id = ? RETURNING *",
        assignments.join(", ")
    );

    let mut q = sqlx::query_as::<_, Gift>(&query);
    for binding in &text_bindings {
        q = q.bind(binding);
    }
    q = q.bind(Utc::now()).bind(id);

    q.fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Gift not found: {}", id)))
}

/// Record the first view of a gift. Later calls keep the original timestamp.
pub async fn mark_gift_viewed(pool: &DbPool, id: &str, at: DateTime<Utc>) -> Result<Gift> {
    sqlx::query_as::<_, Gift>(
        r#"
        UPDATE gifts SET
            viewed = 1,
            viewed_at = COALESCE(viewed_at, ?),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(at)
    .bind(at)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Gift not found: {}", id)))
}

/// Attach Shopify order details to a gift.
///
/// `paid` only ever moves from false to true; a later `orders/updated`
/// delivery without payment does not revoke it.
pub async fn link_gift_to_order(pool: &DbPool, id: &str, order: &OrderLink) -> Result<Gift> {
    sqlx::query_as::<_, Gift>(
        r#"
        UPDATE gifts SET
            shopify_order_id = ?,
            order_name = COALESCE(?, order_name),
            customer_email = COALESCE(?, customer_email),
            paid = MAX(paid, ?),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&order.shopify_order_id)
    .bind(&order.order_name)
    .bind(&order.customer_email)
    .bind(order.paid)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Gift not found: {}", id)))
}

/// Delete a gift. Contributions and attempt counters cascade.
pub async fn delete_gift(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM gifts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Gift not found: {}", id)));
    }

    Ok(())
}

/// List gifts with filters, newest first.
pub async fn list_gifts(pool: &DbPool, filter: GiftFilter) -> Result<Vec<Gift>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(product_type) = &filter.product_type {
        conditions.push("product_type = ?".to_string());
        bindings.push(product_type.as_str().to_string());
    }

    if let Some(viewed) = filter.viewed {
        conditions.push(format!("viewed = {}", viewed as i32));
    }

    if let Some(paid) = filter.paid {
        conditions.push(format!("paid = {}", paid as i32));
    }

    if let Some(search) = &filter.search_query {
        conditions.push(
            r"(recipient_name LIKE ? ESCAPE '\' OR sender_name LIKE ? ESCAPE '\' OR order_name LIKE ? ESCAPE '\')"
                .to_string(),
        );
        let pattern = contains_pattern(search);
        bindings.push(pattern.clone());
        bindings.push(pattern.clone());
        bindings.push(pattern);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let query = format!(
        r#"
        SELECT * FROM gifts
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_clause
    );

    let mut q = sqlx::query_as::<_, Gift>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q = q.bind(filter.page.limit).bind(filter.page.offset);

    q.fetch_all(pool).await.map_err(Error::Database)
}

/// Aggregate gift counts.
pub async fn gift_stats(pool: &DbPool) -> Result<GiftStats> {
    let (total, viewed, paid): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(viewed), 0),
            COALESCE(SUM(paid), 0)
        FROM gifts
        "#,
    )
    .fetch_one(pool)
    .await?;

    let by_product_type: Vec<(String, i64)> = sqlx::query_as(
        "SELECT product_type, COUNT(*) FROM gifts GROUP BY product_type ORDER BY product_type",
    )
    .fetch_all(pool)
    .await?;

    Ok(GiftStats {
        total,
        viewed,
        paid,
        by_product_type,
    })
}
