//! Middleware for giftbox.
//!
//! - `token_auth` - API token validation for the notes dashboard and admin API

mod token_auth;

pub use token_auth::{require_admin, require_token, AuthContext};
