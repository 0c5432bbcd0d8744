use crate::payment_repo::from_cents;
use crate::sqlx_repo::SQLxRepo;
use crate::tag_repo::TagRepoError::TagNotFound;
use crate::tag_repo::{NewTag, Tag, TagRepo, TagRepoError, TagUsage};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as};
use tracing::instrument;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct TagEntry {
    id: String,
    name: String,
    color: String,
    created_at: DateTime<Utc>,
}

impl From<TagEntry> for Tag {
    fn from(value: TagEntry) -> Self {
        Tag {
            id: value.id,
            name: value.name,
            color: value.color,
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagUsageEntry {
    id: String,
    name: String,
    color: String,
    payment_count: i64,
    document_count: i64,
    amount_cents: i64,
}

#[async_trait]
impl TagRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_all_tags(&self) -> Result<Vec<Tag>, TagRepoError> {
        let tags: Vec<TagEntry> =
            query_as("SELECT id, name, color, created_at FROM tags ORDER BY name, id")
                .fetch_all(&self.pool)
                .await
                .context("Unable to get tags")?;
        Ok(tags.into_iter().map(|t| t.into()).collect())
    }

    #[instrument(skip(self))]
    async fn get_tag(&self, tag_id: &str) -> Result<Tag, TagRepoError> {
        let tag: Option<TagEntry> =
            query_as("SELECT id, name, color, created_at FROM tags WHERE id = ?")
                .bind(tag_id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Unable to get tag {}", tag_id))?;
        tag.map(|t| t.into())
            .ok_or_else(|| TagNotFound(tag_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn create_tag(&self, new_tag: NewTag) -> Result<Tag, TagRepoError> {
        new_tag.validate()?;

        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name: new_tag.name,
            color: new_tag.color,
            created_at: Utc::now(),
        };
        query("INSERT INTO tags (id, name, color, created_at) VALUES (?, ?, ?, ?)")
            .bind(&tag.id)
            .bind(&tag.name)
            .bind(&tag.color)
            .bind(tag.created_at)
            .execute(&self.pool)
            .await
            .context("Unable to insert tag")?;
        Ok(tag)
    }

    #[instrument(skip(self))]
    async fn update_tag(&self, tag_id: &str, updated_tag: NewTag) -> Result<Tag, TagRepoError> {
        updated_tag.validate()?;

        let tag: Option<TagEntry> = query_as(
            "UPDATE tags SET name = ?, color = ? WHERE id = ? RETURNING id, name, color, created_at",
        )
        .bind(&updated_tag.name)
        .bind(&updated_tag.color)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Unable to update tag {}", tag_id))?;
        tag.map(|t| t.into())
            .ok_or_else(|| TagNotFound(tag_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_tag(&self, tag_id: &str) -> Result<(), TagRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;

        query("DELETE FROM payment_tags WHERE tag_id = ?")
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to remove tag {} from payments", tag_id))?;
        query("DELETE FROM document_tags WHERE tag_id = ?")
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to remove tag {} from documents", tag_id))?;
        let result = query("DELETE FROM tags WHERE id = ?")
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to delete tag {}", tag_id))?;
        if result.rows_affected() == 0 {
            return Err(TagNotFound(tag_id.to_string()));
        }

        tx.commit().await.context("Unable to commit transaction")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_tag_usage(&self) -> Result<Vec<TagUsage>, TagRepoError> {
        // Correlated subqueries keep the payment and document joins from
        // multiplying each other's rows.
        let entries: Vec<TagUsageEntry> = query_as(
            r#"
            SELECT t.id,
                   t.name,
                   t.color,
                   (SELECT COUNT(*) FROM payment_tags pt WHERE pt.tag_id = t.id) AS payment_count,
                   (SELECT COUNT(*) FROM document_tags dt WHERE dt.tag_id = t.id) AS document_count,
                   (SELECT COALESCE(SUM(p.amount_cents), 0)
                    FROM payment_tags pt
                    JOIN payments p ON p.id = pt.payment_id
                    WHERE pt.tag_id = t.id) AS amount_cents
            FROM tags t
            ORDER BY t.name, t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Unable to get tag usage")?;

        Ok(entries
            .into_iter()
            .map(|entry| TagUsage {
                id: entry.id,
                name: entry.name,
                color: entry.color,
                payment_count: entry.payment_count,
                document_count: entry.document_count,
                total_amount: from_cents(entry.amount_cents),
            })
            .collect())
    }
}
