//! Database layer for giftbox.
//!
//! Provides SQLite connection pooling and query modules
//! for all domain entities.

mod contributions;
mod gifts;
mod links;
mod notes;
mod pool;
mod unlock_attempts;
mod users;

pub use contributions::*;
pub use gifts::*;
pub use links::*;
pub use notes::*;
pub use pool::*;
pub use unlock_attempts::*;
pub use users::*;

use crate::Result;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Open the pool for `path`, sized for a file or an in-memory database.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    let config = PoolConfig::for_path(path);
    let max_connections = config.max_connections;
    let pool = create_pool_with_config(path, config).await?;

    info!(path, max_connections, "Database pool initialized");

    Ok(pool)
}

/// Initialize the database schema.
///
/// Applies the complete schema from schema.sql. Uses IF NOT EXISTS
/// clauses so it's safe to run multiple times.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    let schema = include_str!("../../schema.sql");

    info!("Initializing database schema");

    for statement in split_statements(schema) {
        sqlx::query(&statement).execute(pool).await?;
    }

    info!("Database schema initialized successfully");

    Ok(())
}

/// Break a SQL script into statements.
///
/// Comment lines are dropped before splitting on `;` so punctuation inside
/// a comment never cuts a statement.
fn split_statements(script: &str) -> Vec<String> {
    let code: String = script
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    code.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tag filter over a JSON string-list column, matching whole entries.
pub(crate) const TAG_MATCH: &str =
    "EXISTS (SELECT 1 FROM json_each(tags) WHERE json_each.value = ?)";

/// `LIKE` pattern matching `needle` anywhere, with wildcards in the needle
/// taken literally. Pair with `ESCAPE '\'`.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Page bounds shared by list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 200;

    /// Clamp user-supplied bounds into a sane window.
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset: offset as i64,
            limit: (limit as i64).clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool_in_memory() {
        let pool = init_pool(":memory:").await.unwrap();
        assert!(pool.size() > 0);
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        // Running twice must be harmless
        initialize_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        for expected in [
            "api_tokens",
            "contributions",
            "gifts",
            "links",
            "notes",
            "unlock_attempts",
            "users",
        ] {
            assert!(table_names.contains(&expected), "{} table missing", expected);
        }
    }

    #[test]
    fn test_split_statements_ignores_comment_punctuation() {
        let script = "-- header; with a semicolon\nCREATE TABLE a (x INTEGER);\n\n-- note;\nCREATE INDEX i ON a (x);\n";
        let statements = split_statements(script);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE a (x INTEGER)".to_string(),
                "CREATE INDEX i ON a (x)".to_string(),
            ]
        );
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("gift"), "%gift%");
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_page_clamps_limit() {
        assert_eq!(Page::new(0, 0).limit, 1);
        assert_eq!(Page::new(0, 10_000).limit, Page::MAX_LIMIT);
        assert_eq!(Page::new(40, 20).offset, 40);
    }
}
