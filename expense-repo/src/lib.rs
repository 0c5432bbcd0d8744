use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod analytics;
pub mod document_repo;
pub mod file_store;
pub mod filter;
pub mod payment_repo;
pub mod tag_repo;

// implementation modules
pub mod sqlx_repo;

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> bool;
}

/// A required field was missing or malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Repos {
    pub tag_repo: Arc<dyn tag_repo::TagRepo>,
    pub payment_repo: Arc<dyn payment_repo::PaymentRepo>,
    pub document_repo: Arc<dyn document_repo::DocumentRepo>,
    pub analytics_repo: Arc<dyn analytics::AnalyticsRepo>,
    pub health_check: Arc<dyn HealthCheck>,
}
