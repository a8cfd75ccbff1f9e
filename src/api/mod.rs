//! API Routes for giftbox
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod admin;
mod gifts;
mod links;
mod notes;
mod shared;
pub mod status;
mod webhooks;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;

use crate::middleware::{require_admin, require_token};
use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /gifts/*, /gift - Gift previews, unlock, contributions (public, rate limited)
/// - /shared/* - Public notes and links by slug (public)
/// - /webhooks/* - Shopify webhooks (signature-verified)
/// - /notes/*, /links/* - Personal dashboard (token-protected)
/// - /admin/* - Merchant dashboard (admin token)
/// - /health, /metrics - Health checks (public)
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health and status endpoints (public)
        .merge(status::routes())
        // Public gift routes
        .merge(gifts::routes(state.clone()))
        .nest("/shared", shared::routes())
        // Webhook routes (signature-verified, no auth middleware)
        .nest("/webhooks", webhooks::routes())
        // Token-protected routes
        .nest("/notes", protected(notes::routes(), state.clone()))
        .nest("/links", protected(links::routes(), state.clone()))
        .nest("/admin", admin_routes(state))
        .layer(from_fn(status::track_requests))
}

/// Apply token authentication to a router.
fn protected(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(from_fn_with_state(state, require_token))
}

/// Admin routes: a valid token whose user has the admin role.
fn admin_routes(state: AppState) -> Router<AppState> {
    admin::routes()
        // Last layer added runs first, so the token is checked before the role
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state, require_token))
}
