//! Public Gift Routes
//!
//! Gift previews, the unlock flow, and contributions. No authentication;
//! unlock and contribution endpoints sit behind the per-client limiter.
//!
//! Routes:
//! - GET /gifts/:id - Gift preview
//! - GET /gift?id= - Gift preview (deep link)
//! - POST /gifts/:id/unlock - Run the unlock flow
//! - GET /gifts/:id/contributions - Who contributed, without content
//! - POST /gifts/:id/contributions - Add a contribution

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::status;
use crate::db::{self, Contribution, CreateContribution};
use crate::models::{new_id, now, ContributionKind, GiftSummary, GiftView};
use crate::services::rate_limit::limit_public;
use crate::{AppState, Error, Result};

/// Longest accepted contributor name, in characters.
const MAX_AUTHOR_LEN: usize = 120;

/// Build public gift routes.
pub fn routes(state: AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/gifts/:id/unlock", post(unlock_gift))
        .route(
            "/gifts/:id/contributions",
            get(list_contributors).post(add_contribution),
        )
        .route_layer(axum::middleware::from_fn_with_state(state, limit_public));

    Router::new()
        .route("/gifts/:id", get(get_gift_summary))
        .route("/gift", get(get_gift_by_query))
        .merge(limited)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GiftQuery {
    pub id: String,
}

/// Unlock request body. The body may be omitted entirely.
#[derive(Debug, Default, Deserialize)]
pub struct UnlockRequest {
    pub pin: Option<String>,
}

/// Contributor list entry, without the contribution itself.
#[derive(Debug, Serialize)]
pub struct ContributorEntry {
    pub author: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl From<Contribution> for ContributorEntry {
    fn from(c: Contribution) -> Self {
        Self {
            author: c.author,
            kind: c.kind,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContributorsResponse {
    pub gift_id: String,
    pub contributors: Vec<ContributorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AddContributionRequest {
    pub author: String,
    pub kind: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AddContributionResponse {
    pub id: String,
    pub gift_id: String,
    pub author: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Gift preview.
///
/// GET /gifts/:id
#[axum::debug_handler]
async fn get_gift_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GiftSummary>> {
    Ok(Json(state.unlock.summary(&id).await?))
}

/// Gift preview from a deep link.
///
/// GET /gift?id=
#[axum::debug_handler]
async fn get_gift_by_query(
    State(state): State<AppState>,
    Query(query): Query<GiftQuery>,
) -> Result<Json<GiftSummary>> {
    let id = query.id.trim();
    if id.is_empty() {
        return Err(Error::Validation("id is required".into()));
    }
    Ok(Json(state.unlock.summary(id).await?))
}

/// Run the unlock flow.
///
/// POST /gifts/:id/unlock
///
/// 200 with the full gift view, otherwise 401 (PIN required or wrong),
/// 403 (disabled), 404, 423 (time locked) or 429 (too many attempts).
#[axum::debug_handler]
async fn unlock_gift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<UnlockRequest>>,
) -> Result<Json<GiftView>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let access = state
        .unlock
        .unlock(&id, request.pin.as_deref(), now())
        .await?;
    let result = access.into_result(&id);
    status::inc_unlock_attempt(result.is_ok());

    Ok(Json(result?))
}

/// List who contributed to a gift.
///
/// GET /gifts/:id/contributions
#[axum::debug_handler]
async fn list_contributors(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContributorsResponse>> {
    let gift = db::get_gift(&state.db, &id).await?;
    if gift.disabled {
        return Err(Error::GiftDisabled);
    }

    let contributors = db::list_contributions(&state.db, &gift.id)
        .await?
        .into_iter()
        .map(ContributorEntry::from)
        .collect();

    Ok(Json(ContributorsResponse {
        gift_id: gift.id,
        contributors,
    }))
}

/// Add a contribution to a gift.
///
/// POST /gifts/:id/contributions
#[axum::debug_handler]
async fn add_contribution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddContributionRequest>,
) -> Result<(StatusCode, Json<AddContributionResponse>)> {
    let author = request.author.trim();
    if author.is_empty() {
        return Err(Error::Validation("author is required".into()));
    }
    if author.chars().count() > MAX_AUTHOR_LEN {
        return Err(Error::Validation(format!(
            "author must be at most {} characters",
            MAX_AUTHOR_LEN
        )));
    }

    let kind = ContributionKind::from_str(&request.kind).ok_or_else(|| {
        Error::Validation(format!(
            "Unknown contribution kind '{}', expected text or video",
            request.kind
        ))
    })?;
    let content = request.content.trim();
    kind.validate(content).map_err(Error::Validation)?;

    let gift = db::get_gift(&state.db, &id).await?;
    if gift.disabled {
        return Err(Error::GiftDisabled);
    }

    let contribution = db::create_contribution(
        &state.db,
        CreateContribution {
            id: new_id(),
            gift_id: gift.id,
            author: author.to_string(),
            kind,
            content: content.to_string(),
        },
    )
    .await?;

    info!(
        gift_id = %contribution.gift_id,
        contribution_id = %contribution.id,
        kind = %contribution.kind,
        "Contribution added"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddContributionResponse {
            id: contribution.id,
            gift_id: contribution.gift_id,
            author: contribution.author,
            kind: contribution.kind,
            created_at: contribution.created_at,
        }),
    ))
}
