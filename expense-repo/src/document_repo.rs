use crate::file_store::{FileStoreError, Upload};
use crate::filter::PageOptions;
use crate::{require_non_empty, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub original_name: String,
    pub file_size: i64,
    pub tags: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
}

impl NewDocument {
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        tags: HashSet<String>,
    ) -> NewDocument {
        NewDocument {
            title: title.into(),
            description,
            tags,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPage {
    pub results: Vec<Document>,
    pub total: i64,
}

/// Where a document's file lives and what it was called when uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFile {
    pub path: String,
    pub original_name: String,
}

#[derive(Error, Debug)]
pub enum DocumentRepoError {
    #[error("Document with id {0} not found")]
    DocumentNotFound(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    File(#[from] FileStoreError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait DocumentRepo: Sync + Send {
    async fn get_document(&self, document_id: &str) -> Result<Document, DocumentRepoError>;

    async fn get_documents(
        &self,
        filter: DocumentFilter,
        page_options: PageOptions,
    ) -> Result<DocumentPage, DocumentRepoError>;

    async fn create_document(
        &self,
        new_document: NewDocument,
        file: Upload,
    ) -> Result<Document, DocumentRepoError>;

    /// Replaces title, description and the whole tag set. When `file` is
    /// given the stored file is replaced as well.
    async fn update_document(
        &self,
        document_id: &str,
        updated_document: NewDocument,
        file: Option<Upload>,
    ) -> Result<Document, DocumentRepoError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), DocumentRepoError>;

    async fn get_document_file(&self, document_id: &str)
        -> Result<DocumentFile, DocumentRepoError>;
}
