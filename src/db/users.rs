//! User and API token database queries.
//!
//! Tokens have the shape `gb_{prefix}_{secret}`. Only the 8-character
//! prefix and a SHA-256 hash of the whole token are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;

use crate::models::{new_id, SHORT_ID_ALPHABET};
use crate::{Error, Result};

use super::DbPool;

/// Fixed token prefix used for identification.
pub const TOKEN_PREFIX: &str = "gb_";

/// Length of the lookup prefix that follows `gb_`.
pub const TOKEN_LOOKUP_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }
}

/// User record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl User {
    pub fn role_enum(&self) -> UserRole {
        UserRole::from_str(&self.role)
    }
}

/// API token row, as needed for validation.
#[derive(Debug, Clone, FromRow)]
pub struct ApiTokenRow {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Hex SHA-256 of a full token string.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Split the lookup prefix out of a token, if it is well formed.
pub fn token_lookup_prefix(token: &str) -> Option<&str> {
    let rest = token.strip_prefix(TOKEN_PREFIX)?;
    let prefix = rest.get(..TOKEN_LOOKUP_LEN)?;
    let separator = rest.get(TOKEN_LOOKUP_LEN..TOKEN_LOOKUP_LEN + 1)?;
    (separator == "_" && rest.len() > TOKEN_LOOKUP_LEN + 1).then_some(prefix)
}

/// Create a user.
pub async fn create_user(
    pool: &DbPool,
    display_name: &str,
    email: Option<&str>,
    role: UserRole,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, display_name, email, role)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(display_name)
    .bind(email)
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

/// Store a token for a user. `token` must already be well formed.
pub async fn insert_api_token(pool: &DbPool, user_id: &str, name: &str, token: &str) -> Result<()> {
    let prefix = token_lookup_prefix(token)
        .ok_or_else(|| Error::InvalidInput("Malformed API token".into()))?;

    sqlx::query(
        r#"
        INSERT INTO api_tokens (id, user_id, name, token_prefix, token_hash)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(name)
    .bind(prefix)
    .bind(hash_token(token))
    .execute(pool)
    .await?;

    Ok(())
}

/// Generate and store a fresh token, returning the plaintext once.
pub async fn create_api_token(pool: &DbPool, user_id: &str, name: &str) -> Result<String> {
    let token = format!(
        "{}{}_{}",
        TOKEN_PREFIX,
        nanoid::nanoid!(TOKEN_LOOKUP_LEN, &SHORT_ID_ALPHABET),
        nanoid::nanoid!(32)
    );
    insert_api_token(pool, user_id, name, &token).await?;
    Ok(token)
}

/// Candidate tokens sharing a lookup prefix.
pub async fn find_tokens_by_prefix(pool: &DbPool, prefix: &str) -> Result<Vec<ApiTokenRow>> {
    sqlx::query_as::<_, ApiTokenRow>(
        r#"
        SELECT id, user_id, token_hash, expires_at, revoked_at
        FROM api_tokens
        WHERE token_prefix = ?
        "#,
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Stamp a token's last use.
pub async fn touch_api_token(pool: &DbPool, token_id: &str) -> Result<()> {
    sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(token_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Make sure the configured bootstrap token maps to an admin user.
///
/// Idempotent: a token whose hash is already stored is left alone.
pub async fn ensure_bootstrap_admin(pool: &DbPool, token: &str) -> Result<()> {
    let prefix = token_lookup_prefix(token).ok_or_else(|| {
        Error::InvalidInput(format!(
            "ADMIN_BOOTSTRAP_TOKEN must look like {}xxxxxxxx_secret",
            TOKEN_PREFIX
        ))
    })?;

    let hash = hash_token(token);
    let existing = find_tokens_by_prefix(pool, prefix).await?;
    if existing.iter().any(|t| t.token_hash == hash) {
        return Ok(());
    }

    let admin = create_user(pool, "Administrator", None, UserRole::Admin).await?;
    insert_api_token(pool, &admin.id, "bootstrap", token).await?;
    tracing::info!(user_id = %admin.id, "Bootstrap admin token registered");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};

    #[test]
    fn test_token_lookup_prefix() {
        assert_eq!(token_lookup_prefix("gb_abcd1234_secret"), Some("abcd1234"));
        assert_eq!(token_lookup_prefix("gb_abcd1234_"), None);
        assert_eq!(token_lookup_prefix("gb_abcd1234secret"), None);
        assert_eq!(token_lookup_prefix("tok_abcd1234_secret"), None);
        assert_eq!(token_lookup_prefix("gb_ab"), None);
    }

    #[tokio::test]
    async fn test_created_token_is_findable() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let user = create_user(&pool, "Dee", Some("dee@example.com"), UserRole::Member)
            .await
            .unwrap();
        let token = create_api_token(&pool, &user.id, "cli").await.unwrap();

        let prefix = token_lookup_prefix(&token).unwrap();
        let rows = find_tokens_by_prefix(&pool, prefix).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].token_hash, hash_token(&token));
        assert_eq!(rows[0].user_id, user.id);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let token = "gb_boot0001_topsecretvalue";
        ensure_bootstrap_admin(&pool, token).await.unwrap();
        ensure_bootstrap_admin(&pool, token).await.unwrap();

        let (admins,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(admins, 1);

        assert!(ensure_bootstrap_admin(&pool, "not-a-token").await.is_err());
    }
}
