mod analytics;
mod document_repo;
mod payment_repo;
mod schema;
mod tag_repo;

use crate::file_store::FileStore;
use crate::{HealthCheck, Repos};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{query, query_scalar, Executor, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct SQLxRepo {
    pool: SqlitePool,
    files: FileStore,
}

impl SQLxRepo {
    pub fn new(pool: SqlitePool, files: FileStore) -> SQLxRepo {
        SQLxRepo { pool, files }
    }
}

/// Opens (creating if needed) the database and the storage directories, and
/// creates any missing tables.
pub async fn create_repos(
    database_path: &Path,
    max_pool_size: u32,
    storage_dir: &Path,
) -> Result<Repos, anyhow::Error> {
    let files = FileStore::new(storage_dir);
    files
        .init()
        .await
        .context("Unable to create storage directories")?;

    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Unable to create database directory {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_pool_size)
        .connect_with(options)
        .await
        .with_context(|| format!("Unable to open database {}", database_path.display()))?;

    schema::create_tables(&pool).await?;
    info!(database = %database_path.display(), storage = %storage_dir.display(), "Storage initialized");

    let repo = Arc::new(SQLxRepo::new(pool, files));
    Ok(Repos {
        tag_repo: repo.clone(),
        payment_repo: repo.clone(),
        document_repo: repo.clone(),
        analytics_repo: repo.clone(),
        health_check: repo,
    })
}

#[async_trait]
impl HealthCheck for SQLxRepo {
    async fn check(&self) -> bool {
        query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

/// Tag ids come back from `GROUP_CONCAT` as one comma separated field.
fn split_tag_ids(tag_ids: Option<String>) -> HashSet<String> {
    tag_ids
        .map(|ids| {
            ids.split(',')
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Junction table and owning column for one kind of tagged entity.
#[derive(Debug, Clone, Copy)]
struct TagLinks {
    delete_sql: &'static str,
    insert_sql: &'static str,
}

const PAYMENT_TAGS: TagLinks = TagLinks {
    delete_sql: "DELETE FROM payment_tags WHERE payment_id = ?",
    insert_sql: "INSERT INTO payment_tags (payment_id, tag_id) VALUES (?, ?)",
};

const DOCUMENT_TAGS: TagLinks = TagLinks {
    delete_sql: "DELETE FROM document_tags WHERE document_id = ?",
    insert_sql: "INSERT INTO document_tags (document_id, tag_id) VALUES (?, ?)",
};

impl TagLinks {
    #[instrument(skip(db_executor))]
    async fn clear<'e, E>(self, db_executor: E, entity_id: &str) -> Result<(), anyhow::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        query(self.delete_sql)
            .bind(entity_id)
            .execute(db_executor)
            .await
            .with_context(|| format!("Unable to remove tags of {}", entity_id))?;
        Ok(())
    }

    /// Replace-all: every existing association is removed before the new set
    /// is inserted.
    #[instrument(skip(conn))]
    async fn replace(
        self,
        conn: &mut sqlx::SqliteConnection,
        entity_id: &str,
        tags: &HashSet<String>,
    ) -> Result<(), anyhow::Error> {
        self.clear(&mut *conn, entity_id).await?;
        for tag_id in tags {
            query(self.insert_sql)
                .bind(entity_id)
                .bind(tag_id)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Unable to associate tag {} with {}", tag_id, entity_id))?;
        }
        Ok(())
    }
}
