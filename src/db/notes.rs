//! Note database queries.
//!
//! Notes belong to one author. Public notes carry a slug used for sharing;
//! the slug rule itself lives in `models::resolve_slug`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{decode_string_list, encode_string_list};
use crate::{Error, Result};

use super::{contains_pattern, DbPool, Page, TAG_MATCH};

/// Note record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub slug: Option<String>,
    /// JSON array of tags
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn tags(&self) -> Vec<String> {
        decode_string_list(&self.tags)
    }
}

/// Input for creating a note. The slug is already resolved by the caller.
#[derive(Debug, Clone)]
pub struct CreateNote {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub slug: Option<String>,
    pub tags: Vec<String>,
}

/// Full replacement of a note's editable fields.
#[derive(Debug, Clone)]
pub struct UpdateNote {
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub slug: Option<String>,
    pub tags: Vec<String>,
}

/// Filters for an author's note listing.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub tag: Option<String>,
    pub search_query: Option<String>,
    pub is_public: Option<bool>,
    pub page: Page,
}

fn map_slug_conflict(e: sqlx::Error, slug: Option<&str>) -> Error {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::AlreadyExists(format!("Slug already in use: {}", slug.unwrap_or_default()))
        }
        _ => Error::Database(e),
    }
}

/// Create a new note.
pub async fn create_note(pool: &DbPool, input: CreateNote) -> Result<Note> {
    let now = Utc::now();
    sqlx::query_as::<_, Note>(
        r#"
        INSERT INTO notes (id, author_id, title, content, is_public, slug, tags, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.author_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.is_public)
    .bind(&input.slug)
    .bind(encode_string_list(&input.tags))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| map_slug_conflict(e, input.slug.as_deref()))
}

/// Get a note owned by `author_id`.
pub async fn get_note(pool: &DbPool, author_id: &str, id: &str) -> Result<Note> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ? AND author_id = ?")
        .bind(id)
        .bind(author_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Note not found: {}", id)))
}

/// Get a public note by its slug.
pub async fn get_public_note_by_slug(pool: &DbPool, slug: &str) -> Result<Option<Note>> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE slug = ? AND is_public = 1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Replace a note's editable fields.
pub async fn update_note(pool: &DbPool, author_id: &str, id: &str, input: UpdateNote) -> Result<Note> {
    sqlx::query_as::<_, Note>(
        r#"
        UPDATE notes SET
            title = ?,
            content = ?,
            is_public = ?,
            slug = ?,
            tags = ?,
            updated_at = ?
        WHERE id = ? AND author_id = ?
        RETURNING *
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.is_public)
    .bind(&input.slug)
    .bind(encode_string_list(&input.tags))
    .bind(Utc::now())
    .bind(id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| map_slug_conflict(e, input.slug.as_deref()))?
    .ok_or_else(|| Error::NotFound(format!("Note not found: {}", id)))
}

/// Delete a note owned by `author_id`.
pub async fn delete_note(pool: &DbPool, author_id: &str, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM notes WHERE id = ? AND author_id = ?")
        .bind(id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Note not found: {}", id)));
    }

    Ok(())
}

/// List an author's notes, most recently updated first.
pub async fn list_notes(pool: &DbPool, author_id: &str, filter: NoteFilter) -> Result<Vec<Note>> {
    let mut conditions: Vec<String> = vec!["author_id = ?".to_string()];
    let mut bindings: Vec<String> = vec![author_id.to_string()];

    if let Some(tag) = &filter.tag {
        conditions.push(TAG_MATCH.to_string());
        bindings.push(tag.to_lowercase());
    }

    if let Some(search) = &filter.search_query {
        conditions.push(r"(title LIKE ? ESCAPE '\' OR content LIKE ? ESCAPE '\')".to_string());
        let pattern = contains_pattern(search);
        bindings.push(pattern.clone());
        bindings.push(pattern);
    }

    if let Some(is_public) = filter.is_public {
        conditions.push(format!("is_public = {}", is_public as i32));
    }

    let query = format!(
        r#"
        SELECT * FROM notes
        WHERE {}
        ORDER BY updated_at DESC
        LIMIT ? OFFSET ?
        "#,
        conditions.join(" AND ")
    );

    let mut q = sqlx::query_as::<_, Note>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q = q.bind(filter.page.limit).bind(filter.page.offset);

    q.fetch_all(pool).await.map_err(Error::Database)
}
