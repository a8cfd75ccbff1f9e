//! Notes Routes
//!
//! Personal notes, scoped to the token's user.
//!
//! Routes:
//! - GET /notes - List notes (filters: tag, q, public)
//! - POST /notes - Create a note
//! - GET /notes/:id - Get a note
//! - PUT /notes/:id - Update a note
//! - DELETE /notes/:id - Delete a note

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::{self, CreateNote, Note, NoteFilter, Page, UpdateNote};
use crate::middleware::AuthContext;
use crate::models::{new_id, normalize_tags, resolve_slug};
use crate::{AppState, Error, Result};

/// Longest accepted note title, in characters.
const MAX_TITLE_LEN: usize = 200;

/// Build note routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/:id", get(get_note).put(update_note).delete(delete_note))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing notes.
#[derive(Debug, Deserialize, Default)]
pub struct ListNotesQuery {
    pub tag: Option<String>,
    pub q: Option<String>,
    pub public: Option<bool>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Note update. Absent fields keep their current value.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Note response.
#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub slug: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        let tags = note.tags();
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            is_public: note.is_public,
            slug: note.slug,
            tags,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListNotesResponse {
    pub notes: Vec<NoteResponse>,
    pub offset: u32,
    pub limit: u32,
}

/// Trimmed, non-empty title within the length limit.
pub(super) fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's notes.
///
/// GET /notes
#[axum::debug_handler]
async fn list_notes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListNotesQuery>,
) -> Result<Json<ListNotesResponse>> {
    let page = Page::new(query.offset, query.limit);
    let filter = NoteFilter {
        tag: query.tag.map(|t| t.trim().trim_start_matches('#').to_lowercase()),
        search_query: query.q.filter(|q| !q.trim().is_empty()),
        is_public: query.public,
        page,
    };

    let notes = db::list_notes(&state.db, &auth.user_id, filter).await?;
    debug!(user_id = %auth.user_id, count = notes.len(), "Listed notes");

    Ok(Json(ListNotesResponse {
        notes: notes.into_iter().map(NoteResponse::from).collect(),
        offset: query.offset,
        limit: page.limit as u32,
    }))
}

/// Create a note.
///
/// POST /notes
#[axum::debug_handler]
async fn create_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>)> {
    let title = validate_title(&request.title)?;
    let slug = resolve_slug(request.is_public, None, &title);

    let note = db::create_note(
        &state.db,
        CreateNote {
            id: new_id(),
            author_id: auth.user_id.clone(),
            title,
            content: request.content,
            is_public: request.is_public,
            slug,
            tags: normalize_tags(&request.tags),
        },
    )
    .await?;

    info!(note_id = %note.id, user_id = %auth.user_id, is_public = note.is_public, "Note created");

    Ok((StatusCode::CREATED, Json(NoteResponse::from(note))))
}

/// Get one of the caller's notes.
///
/// GET /notes/:id
#[axum::debug_handler]
async fn get_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>> {
    let note = db::get_note(&state.db, &auth.user_id, &id).await?;
    Ok(Json(NoteResponse::from(note)))
}

/// Update a note.
///
/// PUT /notes/:id
///
/// Going public mints a slug, going private drops it.
#[axum::debug_handler]
async fn update_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<NoteResponse>> {
    let existing = db::get_note(&state.db, &auth.user_id, &id).await?;

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

    let note = db::update_note(
        &state.db,
        &auth.user_id,
        &id,
        UpdateNote {
            title,
            content: request.content.unwrap_or(existing.content),
            is_public,
            slug,
            tags,
        },
    )
    .await?;

    info!(note_id = %note.id, user_id = %auth.user_id, is_public = note.is_public, "Note updated");

    Ok(Json(NoteResponse::from(note)))
}

/// Delete a note.
///
/// DELETE /notes/:id
#[axum::debug_handler]
async fn delete_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    db::delete_note(&state.db, &auth.user_id, &id).await?;
    info!(note_id = %id, user_id = %auth.user_id, "Note deleted");
    Ok(StatusCode::NO_CONTENT)
}
