use crate::document_repo::DocumentRepoError::DocumentNotFound;
use crate::document_repo::{
    Document, DocumentFile, DocumentFilter, DocumentPage, DocumentRepo, DocumentRepoError,
    NewDocument,
};
use crate::file_store::{FileCleanup, FileKind, StoredFile, Upload};
use crate::filter::{PageOptions, WhereClause};
use crate::sqlx_repo::{split_tag_ids, SQLxRepo, DOCUMENT_TAGS};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, Executor, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};
use uuid::Uuid;

const SELECT_DOCUMENTS: &str = r#"
    SELECT d.id, d.title, d.description, d.file_path, d.original_name, d.file_size,
           d.created_at, d.updated_at, GROUP_CONCAT(dt.tag_id) AS tag_ids
    FROM documents d
    LEFT JOIN document_tags dt ON d.id = dt.document_id"#;

const SELECT_DOCUMENT_BY_ID: &str = r#"
    SELECT d.id, d.title, d.description, d.file_path, d.original_name, d.file_size,
           d.created_at, d.updated_at, GROUP_CONCAT(dt.tag_id) AS tag_ids
    FROM documents d
    LEFT JOIN document_tags dt ON d.id = dt.document_id
    WHERE d.id = ?
    GROUP BY d.id"#;

#[derive(sqlx::FromRow)]
struct DocumentEntry {
    id: String,
    title: String,
    description: Option<String>,
    file_path: String,
    original_name: String,
    file_size: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    tag_ids: Option<String>,
}

impl From<DocumentEntry> for Document {
    fn from(value: DocumentEntry) -> Self {
        Document {
            id: value.id,
            title: value.title,
            description: value.description,
            file_path: value.file_path,
            original_name: value.original_name,
            file_size: value.file_size,
            tags: split_tag_ids(value.tag_ids),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentFileEntry {
    file_path: String,
    original_name: String,
}

impl SQLxRepo {
    #[instrument(skip(db_executor))]
    async fn get_document_entry<'e, E>(
        db_executor: E,
        document_id: &str,
    ) -> Result<Option<DocumentEntry>, DocumentRepoError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let document_entry: Option<DocumentEntry> = query_as(SELECT_DOCUMENT_BY_ID)
            .bind(document_id)
            .fetch_optional(db_executor)
            .await
            .with_context(|| format!("Unable to get document {}", document_id))?;
        Ok(document_entry)
    }

    #[instrument(skip(db_executor))]
    async fn get_document_file_entry<'e, E>(
        db_executor: E,
        document_id: &str,
    ) -> Result<DocumentFileEntry, DocumentRepoError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let file_entry: Option<DocumentFileEntry> =
            query_as("SELECT file_path, original_name FROM documents WHERE id = ?")
                .bind(document_id)
                .fetch_optional(db_executor)
                .await
                .with_context(|| format!("Unable to get file of document {}", document_id))?;
        file_entry.ok_or_else(|| DocumentNotFound(document_id.to_string()))
    }

    #[instrument(skip(conn, new_document))]
    async fn insert_document_entry(
        conn: &mut SqliteConnection,
        document_id: &str,
        new_document: &NewDocument,
        file: &StoredFile,
        original_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DocumentRepoError> {
        query(
            "INSERT INTO documents (id, title, description, file_path, original_name, file_size, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(&new_document.title)
        .bind(&new_document.description)
        .bind(&file.path)
        .bind(original_name)
        .bind(file.size)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Unable to insert document")?;

        DOCUMENT_TAGS
            .replace(conn, document_id, &new_document.tags)
            .await?;
        Ok(())
    }

    #[instrument(skip(conn, updated_document, file))]
    async fn update_document_entry(
        conn: &mut SqliteConnection,
        document_id: &str,
        updated_document: &NewDocument,
        file: Option<(&StoredFile, &str)>,
    ) -> Result<DocumentEntry, DocumentRepoError> {
        let now = Utc::now();
        let result = match file {
            Some((stored, original_name)) => query(
                "UPDATE documents SET title = ?, description = ?, file_path = ?, original_name = ?, file_size = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&updated_document.title)
            .bind(&updated_document.description)
            .bind(&stored.path)
            .bind(original_name)
            .bind(stored.size)
            .bind(now)
            .bind(document_id)
            .execute(&mut *conn)
            .await,
            None => query(
                "UPDATE documents SET title = ?, description = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&updated_document.title)
            .bind(&updated_document.description)
            .bind(now)
            .bind(document_id)
            .execute(&mut *conn)
            .await,
        }
        .with_context(|| format!("Unable to update document {}", document_id))?;
        if result.rows_affected() == 0 {
            return Err(DocumentNotFound(document_id.to_string()));
        }

        DOCUMENT_TAGS
            .replace(&mut *conn, document_id, &updated_document.tags)
            .await?;

        Self::get_document_entry(&mut *conn, document_id)
            .await?
            .ok_or_else(|| DocumentNotFound(document_id.to_string()))
    }
}

#[async_trait]
impl DocumentRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_document(&self, document_id: &str) -> Result<Document, DocumentRepoError> {
        Self::get_document_entry(&self.pool, document_id)
            .await?
            .map(|d| d.into())
            .ok_or_else(|| DocumentNotFound(document_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn get_documents(
        &self,
        filter: DocumentFilter,
        page_options: PageOptions,
    ) -> Result<DocumentPage, DocumentRepoError> {
        let where_clause = WhereClause::from(&filter);

        let mut query_builder = QueryBuilder::new(SELECT_DOCUMENTS);
        where_clause.push_to(&mut query_builder);
        query_builder.push(" GROUP BY d.id ORDER BY d.created_at DESC, d.id DESC");
        page_options.push_to(&mut query_builder);
        let document_entries: Vec<DocumentEntry> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("Unable to get documents")?;

        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM documents d");
        where_clause.push_to(&mut count_builder);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Unable to count documents")?;

        Ok(DocumentPage {
            results: document_entries.into_iter().map(|d| d.into()).collect(),
            total,
        })
    }

    #[instrument(skip(self, new_document, file))]
    async fn create_document(
        &self,
        new_document: NewDocument,
        file: Upload,
    ) -> Result<Document, DocumentRepoError> {
        new_document.validate()?;

        let document_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let stored = self
            .files
            .save(FileKind::Document, &document_id, &file)
            .await?;

        let result = async {
            let mut tx = self
                .pool
                .begin()
                .await
                .context("Unable to start transaction")?;
            Self::insert_document_entry(
                &mut tx,
                &document_id,
                &new_document,
                &stored,
                &file.original_name,
                now,
            )
            .await?;
            tx.commit().await.context("Unable to commit transaction")?;
            Ok::<(), DocumentRepoError>(())
        }
        .await;
        if let Err(err) = result {
            self.files.discard(&stored.path).await;
            return Err(err);
        }

        info!(%document_id, size = stored.size, "Created document");
        Ok(Document {
            id: document_id,
            title: new_document.title,
            description: new_document.description,
            file_path: stored.path,
            original_name: file.original_name,
            file_size: stored.size,
            tags: new_document.tags,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self, updated_document, file))]
    async fn update_document(
        &self,
        document_id: &str,
        updated_document: NewDocument,
        file: Option<Upload>,
    ) -> Result<Document, DocumentRepoError> {
        updated_document.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let previous = Self::get_document_file_entry(&mut *tx, document_id).await?;

        let stored = match &file {
            Some(upload) => Some(
                self.files
                    .save(FileKind::Document, document_id, upload)
                    .await?,
            ),
            None => None,
        };
        let replacement = stored
            .as_ref()
            .zip(file.as_ref())
            .map(|(stored, upload)| (stored, upload.original_name.as_str()));

        let result = async {
            let entry =
                Self::update_document_entry(&mut tx, document_id, &updated_document, replacement)
                    .await?;
            tx.commit().await.context("Unable to commit transaction")?;
            Ok::<DocumentEntry, DocumentRepoError>(entry)
        }
        .await;
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                // A replacement written over the previous path is the only copy left.
                if let Some(stored) = stored.as_ref().filter(|s| s.path != previous.file_path) {
                    self.files.discard(&stored.path).await;
                }
                return Err(err);
            }
        };

        if let Some(stored) = &stored {
            if stored.path != previous.file_path {
                self.files.discard(&previous.file_path).await;
            }
        }
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, document_id: &str) -> Result<(), DocumentRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let file = Self::get_document_file_entry(&mut *tx, document_id).await?;

        DOCUMENT_TAGS.clear(&mut *tx, document_id).await?;
        let result = query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to delete document {}", document_id))?;
        if result.rows_affected() == 0 {
            return Err(DocumentNotFound(document_id.to_string()));
        }

        // The stored file must go with the row; a failure here rolls the delete back.
        FileCleanup::Required
            .remove(&self.files, &file.file_path)
            .await?;
        tx.commit().await.context("Unable to commit transaction")?;

        info!(%document_id, "Deleted document");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document_file(
        &self,
        document_id: &str,
    ) -> Result<DocumentFile, DocumentRepoError> {
        let entry = Self::get_document_file_entry(&self.pool, document_id).await?;
        Ok(DocumentFile {
            path: entry.file_path,
            original_name: entry.original_name,
        })
    }
}
