//! Shared Routes
//!
//! Read-only access to public notes and links by slug. Private items are
//! indistinguishable from missing ones.
//!
//! Routes:
//! - GET /shared/notes/:slug - Public note
//! - GET /shared/links/:slug - Public link
//! - GET /shared?slug= - Deep link, notes first then links

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{self, Note, SavedLink};
use crate::{AppState, Error, Result};

/// Build shared routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(resolve_shared))
        .route("/notes/:slug", get(get_shared_note))
        .route("/links/:slug", get(get_shared_link))
}

#[derive(Debug, Deserialize)]
pub struct SharedQuery {
    pub slug: String,
}

/// A public note, without its author.
#[derive(Debug, Serialize)]
pub struct SharedNote {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl SharedNote {
    fn from_note(note: Note, slug: String) -> Self {
        let tags = note.tags();
        Self {
            slug,
            title: note.title,
            content: note.content,
            tags,
            updated_at: note.updated_at,
        }
    }
}

/// A public link, without its author.
#[derive(Debug, Serialize)]
pub struct SharedLink {
    pub slug: String,
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl SharedLink {
    fn from_link(link: SavedLink, slug: String) -> Self {
        let tags = link.tags();
        Self {
            slug,
            title: link.title,
            url: link.url,
            tags,
            updated_at: link.updated_at,
        }
    }
}

/// Either kind of shared item, tagged by kind.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SharedItem {
    Note(SharedNote),
    Link(SharedLink),
}

fn not_found(slug: &str) -> Error {
    Error::NotFound(format!("Nothing shared at: {}", slug))
}

/// GET /shared/notes/:slug
#[axum::debug_handler]
async fn get_shared_note(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SharedNote>> {
    let note = db::get_public_note_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| not_found(&slug))?;
    Ok(Json(SharedNote::from_note(note, slug)))
}

/// GET /shared/links/:slug
#[axum::debug_handler]
async fn get_shared_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SharedLink>> {
    let link = db::get_public_link_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| not_found(&slug))?;
    Ok(Json(SharedLink::from_link(link, slug)))
}

/// GET /shared?slug=
#[axum::debug_handler]
async fn resolve_shared(
    State(state): State<AppState>,
    Query(query): Query<SharedQuery>,
) -> Result<Json<SharedItem>> {
    let slug = query.slug.trim().to_string();
    if slug.is_empty() {
        return Err(Error::Validation("slug is required".into()));
    }

    if let Some(note) = db::get_public_note_by_slug(&state.db, &slug).await? {
        return Ok(Json(SharedItem::Note(SharedNote::from_note(note, slug))));
    }
    if let Some(link) = db::get_public_link_by_slug(&state.db, &slug).await? {
        return Ok(Json(SharedItem::Link(SharedLink::from_link(link, slug))));
    }

    Err(not_found(&slug))
}
