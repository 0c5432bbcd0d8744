use crate::{require_non_empty, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

impl NewTag {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> NewTag {
        NewTag {
            name: name.into(),
            color: color.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        require_non_empty("color", &self.color)
    }
}

/// How many entities reference a tag.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct TagUsage {
    pub id: String,
    pub name: String,
    pub color: String,
    pub payment_count: i64,
    pub document_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Error, Debug)]
pub enum TagRepoError {
    #[error("Tag with id {0} not found")]
    TagNotFound(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait TagRepo: Sync + Send {
    async fn get_all_tags(&self) -> Result<Vec<Tag>, TagRepoError>;

    async fn get_tag(&self, tag_id: &str) -> Result<Tag, TagRepoError>;

    async fn create_tag(&self, new_tag: NewTag) -> Result<Tag, TagRepoError>;

    async fn update_tag(&self, tag_id: &str, updated_tag: NewTag) -> Result<Tag, TagRepoError>;

    /// Also removes the tag from every payment and document.
    async fn delete_tag(&self, tag_id: &str) -> Result<(), TagRepoError>;

    async fn get_tag_usage(&self) -> Result<Vec<TagUsage>, TagRepoError>;
}
