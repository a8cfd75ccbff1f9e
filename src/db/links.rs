//! Saved link database queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{decode_string_list, encode_string_list};
use crate::{Error, Result};

use super::{contains_pattern, DbPool, Page, TAG_MATCH};

/// Saved link record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SavedLink {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub url: String,
    pub is_public: bool,
    pub slug: Option<String>,
    /// JSON array of tags
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedLink {
    pub fn tags(&self) -> Vec<String> {
        decode_string_list(&self.tags)
    }
}

/// Input for creating or replacing a link.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub title: String,
    pub url: String,
    pub is_public: bool,
    pub slug: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub tag: Option<String>,
    pub search_query: Option<String>,
    pub page: Page,
}

fn map_slug_conflict(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::AlreadyExists("Slug already in use".to_string())
        }
        _ => Error::Database(e),
    }
}

/// Create a new link.
pub async fn create_link(pool: &DbPool, id: &str, author_id: &str, input: LinkInput) -> Result<SavedLink> {
    let now = Utc::now();
    sqlx::query_as::<_, SavedLink>(
        r#"
        INSERT INTO links (id, author_id, title, url, is_public, slug, tags, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(author_id)
    .bind(&input.title)
    .bind(&input.url)
    .bind(input.is_public)
    .bind(&input.slug)
    .bind(encode_string_list(&input.tags))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(map_slug_conflict)
}

/// Get a link owned by `author_id`.
pub async fn get_link(pool: &DbPool, author_id: &str, id: &str) -> Result<SavedLink> {
    sqlx::query_as::<_, SavedLink>("SELECT * FROM links WHERE id = ? AND author_id = ?")
        .bind(id)
        .bind(author_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Link not found: {}", id)))
}

/// Get a public link by its slug.
pub async fn get_public_link_by_slug(pool: &DbPool, slug: &str) -> Result<Option<SavedLink>> {
    sqlx::query_as::<_, SavedLink>("SELECT * FROM links WHERE slug = ? AND is_public = 1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Replace a link's editable fields.
pub async fn update_link(
    pool: &DbPool,
    author_id: &str,
    id: &str,
    input: LinkInput,
) -> Result<SavedLink> {
    sqlx::query_as::<_, SavedLink>(
        r#"
        UPDATE links SET
            title = ?,
            url = ?,
            is_public = ?,
            slug = ?,
            tags = ?,
            updated_at = ?
        WHERE id = ? AND author_id = ?
        RETURNING *
        "#,
    )
    .bind(&input.title)
    .bind(&input.url)
    .bind(input.is_public)
    .bind(&input.slug)
    .bind(encode_string_list(&input.tags))
    .bind(Utc::now())
    .bind(id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(map_slug_conflict)?
    .ok_or_else(|| Error::NotFound(format!("Link not found: {}", id)))
}

/// Delete a link owned by `author_id`.
pub async fn delete_link(pool: &DbPool, author_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM links WHERE id = ? AND author_id = ?")
        .bind(id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Link not found: {}", id)));
    }

    Ok(())
}

/// List an author's links, most recently updated first.
pub async fn list_links(pool: &DbPool, author_id: &str, filter: LinkFilter) -> Result<Vec<SavedLink>> {
    let mut conditions: Vec<&str> = vec!["author_id = ?"];
    let mut bindings: Vec<String> = vec![author_id.to_string()];

    if let Some(tag) = &filter.tag {
        conditions.push(TAG_MATCH);
        bindings.push(tag.to_lowercase());
    }

    if let Some(search) = &filter.search_query {
        conditions.push(r"(title LIKE ? ESCAPE '\' OR url LIKE ? ESCAPE '\')");
        let pattern = contains_pattern(search);
        bindings.push(pattern.clone());
        bindings.push(pattern);
    }

    let query = format!(
        "SELECT * FROM links WHERE {} ORDER BY updated_at DESC LIMIT ? OFFSET ?",
        conditions.join(" AND ")
    );

    let mut q = sqlx::query_as::<_, SavedLink>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q = q.bind(filter.page.limit).bind(filter.page.offset);

    q.fetch_all(pool).await.map_err(Error::Database)
}
