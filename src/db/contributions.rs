//! Contribution database queries.
//!
//! Contributions are social-gifting messages attached to a gift. The
//! foreign key on `gift_id` guarantees they reference an existing gift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::ContributionKind;
use crate::{Error, Result};

use super::DbPool;

/// Contribution record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contribution {
    pub id: String,
    pub gift_id: String,
    pub author: String,
    /// 'text' or 'video'
    pub kind: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Contribution {
    pub fn kind_enum(&self) -> Option<ContributionKind> {
        ContributionKind::from_str(&self.kind)
    }
}

/// Input for creating a contribution.
#[derive(Debug, Clone)]
pub struct CreateContribution {
    pub id: String,
    pub gift_id: String,
    pub author: String,
    pub kind: ContributionKind,
    pub content: String,
}

/// Create a contribution on an existing gift.
pub async fn create_contribution(pool: &DbPool, input: CreateContribution) -> Result<Contribution> {
    sqlx::query_as::<_, Contribution>(
        r#"
        INSERT INTO contributions (id, gift_id, author, kind, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.gift_id)
    .bind(&input.author)
    .bind(input.kind.as_str())
    .bind(&input.content)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            Error::NotFound(format!("Gift not found: {}", input.gift_id))
        }
        _ => Error::Database(e),
    })
}

/// List every contribution on a gift, oldest first.
pub async fn list_contributions(pool: &DbPool, gift_id: &str) -> Result<Vec<Contribution>> {
    sqlx::query_as::<_, Contribution>(
        "SELECT * FROM contributions WHERE gift_id = ? ORDER BY created_at ASC",
    )
    .bind(gift_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Count contributions on a gift.
pub async fn count_contributions(pool: &DbPool, gift_id: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contributions WHERE gift_id = ?")
        .bind(gift_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete a contribution (moderation).
pub async fn delete_contribution(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM contributions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Contribution not found: {}", id)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_gift, delete_gift, init_pool, initialize_schema, CreateGift};
    use crate::models::{new_id, ProductType};

    async fn setup_with_gift() -> (DbPool, String) {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        let gift = create_gift(
            &pool,
            CreateGift {
                id: new_id(),
                recipient_name: "Robin".to_string(),
                sender_name: "Kai".to_string(),
                access_pin: "0000".to_string(),
                product_type: ProductType::Markdown,
                unlock_date: None,
                message: Some("# Hi".to_string()),
                audio_url: None,
                video_url: None,
                image_urls: vec![],
                locked: false,
            },
        )
        .await
        .unwrap();
        (pool, gift.id)
    }

    fn text(gift_id: &str, author: &str) -> CreateContribution {
        CreateContribution {
            id: new_id(),
            gift_id: gift_id.to_string(),
            author: author.to_string(),
            kind: ContributionKind::Text,
            content: format!("Love from {}", author),
        }
    }

    #[tokio::test]
    async fn test_contributions_are_listed_oldest_first() {
        let (pool, gift_id) = setup_with_gift().await;
        create_contribution(&pool, text(&gift_id, "first")).await.unwrap();
        create_contribution(&pool, text(&gift_id, "second")).await.unwrap();

        let list = list_contributions(&pool, &gift_id).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].author, "first");
        assert_eq!(list[1].kind_enum(), Some(ContributionKind::Text));
        assert_eq!(count_contributions(&pool, &gift_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_contribution_requires_existing_gift() {
        let (pool, _) = setup_with_gift().await;
        let err = create_contribution(&pool, text("no-such-gift", "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleting_gift_cascades() {
        let (pool, gift_id) = setup_with_gift().await;
        create_contribution(&pool, text(&gift_id, "a")).await.unwrap();
        delete_gift(&pool, &gift_id).await.unwrap();
        assert_eq!(count_contributions(&pool, &gift_id).await.unwrap(), 0);
    }
}
