//! Links Routes
//!
//! Saved links, scoped to the token's user.
//!
//! Routes:
//! - GET /links - List links (filters: tag, q)
//! - POST /links - Save a link
//! - GET /links/:id - Get a link
//! - PUT /links/:id - Update a link
//! - DELETE /links/:id - Delete a link

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::notes::validate_title;
use crate::db::{self, LinkFilter, LinkInput, Page, SavedLink};
use crate::middleware::AuthContext;
use crate::models::{is_http_url, new_id, normalize_tags, resolve_slug};
use crate::{AppState, Error, Result};

/// Build link routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_links).post(create_link))
        .route("/:id", get(get_link).put(update_link).delete(delete_link))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ListLinksQuery {
    pub tag: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    /// Defaults to the url when omitted
    pub title: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateLinkRequest {
    pub url: Option<String>,
    pub title: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub id: String,
    pub title: String,
    pub url: String,
    pub is_public: bool,
    pub slug: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SavedLink> for LinkResponse {
    fn from(link: SavedLink) -> Self {
        let tags = link.tags();
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
            is_public: link.is_public,
            slug: link.slug,
            tags,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListLinksResponse {
    pub links: Vec<LinkResponse>,
    pub offset: u32,
    pub limit: u32,
}

fn validate_url(url: &str) -> Result<String> {
    let url = url.trim();
    if !is_http_url(url) {
        return Err(Error::Validation("url must be an absolute http(s) url".into()));
    }
    Ok(url.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's links.
///
/// GET /links
#[axum::debug_handler]
async fn list_links(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListLinksQuery>,
) -> Result<Json<ListLinksResponse>> {
    let page = Page::new(query.offset, query.limit);
    let links = db::list_links(
        &state.db,
        &auth.user_id,
        LinkFilter {
            tag: query.tag.map(|t| t.trim().trim_start_matches('#').to_lowercase()),
            search_query: query.q.filter(|q| !q.trim().is_empty()),
            page,
        },
    )
    .await?;

    Ok(Json(ListLinksResponse {
        links: links.into_iter().map(LinkResponse::from).collect(),
        offset: query.offset,
        limit: page.limit as u32,
    }))
}

/// Save a link.
///
/// POST /links
#[axum::debug_handler]
async fn create_link(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>)> {
    let url = validate_url(&request.url)?;
    let title = validate_title(request.title.as_deref().unwrap_or(&url))?;
    let slug = resolve_slug(request.is_public, None, &title);

    let link = db::create_link(
        &state.db,
        &new_id(),
        &auth.user_id,
        LinkInput {
            title,
            url,
            is_public: request.is_public,
            slug,
            tags: normalize_tags(&request.tags),
        },
    )
    .await?;

    info!(link_id = %link.id, user_id = %auth.user_id, "Link saved");

    Ok((StatusCode::CREATED, Json(LinkResponse::from(link))))
}

/// Get one of the caller's links.
///
/// GET /links/:id
#[axum::debug_handler]
async fn get_link(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>> {
    let link = db::get_link(&state.db, &auth.user_id, &id).await?;
    Ok(Json(LinkResponse::from(link)))
}

/// Update a link.
///
/// PUT /links/:id
#[axum::debug_handler]
async fn update_link(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(request): Json<UpdateLinkRequest>,
) -> Result<Json<LinkResponse>> {
    let existing = db::get_link(&state.db, &auth.user_id, &id).await?;

    let url = match request.url.as_deref() {
        Some(u) => validate_url(u)?,
        None => existing.url.clone(),
    };
    let title = match request.title.as_deref() {
        Some(t) => validate_title(t)?,
        None => existing.title.clone(),
    };
    let is_public = request.is_public.unwrap_or(existing.is_public);
    let slug = resolve_slug(is_public, existing.slug.as_deref(), &title);
    let tags = match request.tags {
        Some(tags) => normalize_tags(&tags),
        None => existing.tags(),
    };

    let link = db::update_link(
        &state.db,
        &auth.user_id,
        &id,
        LinkInput {
            title,
            url,
            is_public,
            slug,
            tags,
        },
    )
    .await?;

    info!(link_id = %link.id, user_id = %auth.user_id, is_public = link.is_public, "Link updated");

    Ok(Json(LinkResponse::from(link)))
}

/// Delete a link.
///
/// DELETE /links/:id
#[axum::debug_handler]
async fn delete_link(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    db::delete_link(&state.db, &auth.user_id, &id).await?;
    info!(link_id = %id, user_id = %auth.user_id, "Link deleted");
    Ok(StatusCode::NO_CONTENT)
}
