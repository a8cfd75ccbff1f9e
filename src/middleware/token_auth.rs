//! API token authentication middleware.
//!
//! Validates Bearer tokens for the notes dashboard and the admin API.
//! Supports both:
//! - `Authorization: Bearer {token}` headers (recommended)
//! - `?token={token}` query string parameters (for deep links from the dashboard)
//!
//! Token format: `gb_{prefix}_{random}` where:
//! - `gb_` is a fixed prefix for identification
//! - `{prefix}` is 8 chars used for database lookup (stored as `token_prefix`)
//! - `{random}` is the remaining secret (the full token is hashed and stored as `token_hash`)

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::db::{self, UserRole};
use crate::{error::Error, AppState};

/// Extract token from Authorization header or query string.
///
/// Priority:
/// 1. Authorization: Bearer {token} header
/// 2. ?token={token} query parameter
fn extract_token_from_request(req: &Request<Body>) -> Option<String> {
    if let Some(auth_header) = req.headers().get(AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(query) = req.uri().query() {
        for part in query.split('&') {
            if let Some(token) = part.strip_prefix("token=") {
                if let Ok(decoded) = urlencoding::decode(token) {
                    return Some(decoded.into_owned());
                }
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Authentication context injected into request extensions after successful token validation.
#[derive(Clone, Debug)]
pub struct AuthContext {
    /// Unique identifier for the token (for audit logging)
    pub token_id: String,
    /// User ID that owns this token; notes and links are scoped to it
    pub user_id: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Middleware that requires a valid API token.
///
/// # Errors
///
/// Returns 401 Unauthorized if no token is present, the token is unknown,
/// or it is expired or revoked.
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let token = extract_token_from_request(&req).ok_or(Error::Unauthenticated)?;

    let auth_context = validate_token(&state, &token).await?;

    db::touch_api_token(&state.db, &auth_context.token_id).await?;

    tracing::debug!(user_id = %auth_context.user_id, "Token authenticated");
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Middleware that requires the authenticated user to be an admin.
///
/// Must be used AFTER `require_token`.
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, Error> {
    let auth_context = req
        .extensions()
        .get::<AuthContext>()
        .ok_or(Error::Unauthenticated)?;

    if !auth_context.is_admin() {
        tracing::warn!(user_id = %auth_context.user_id, "Non-admin token on admin route");
        return Err(Error::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Validate a token string and return the auth context.
async fn validate_token(state: &AppState, token: &str) -> Result<AuthContext, Error> {
    let prefix = db::token_lookup_prefix(token).ok_or(Error::InvalidToken)?;
    let token_hash = db::hash_token(token);

    let token_row = db::find_tokens_by_prefix(&state.db, prefix)
        .await?
        .into_iter()
        .find(|row| constant_time_eq(&token_hash, &row.token_hash))
        .ok_or(Error::InvalidToken)?;

    if token_row.revoked_at.is_some() {
        return Err(Error::InvalidToken);
    }

    if let Some(expires_at) = token_row.expires_at {
        if expires_at < chrono::Utc::now() {
            return Err(Error::TokenExpired);
        }
    }

    let user = db::get_user(&state.db, &token_row.user_id)
        .await
        .map_err(|_| Error::InvalidToken)?;

    Ok(AuthContext {
        token_id: token_row.id,
        user_id: user.id.clone(),
        role: user.role_enum(),
    })
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
