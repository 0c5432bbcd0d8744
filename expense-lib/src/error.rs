use actix_web::body::BoxBody;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use expense_repo::analytics::AnalyticsRepoError;
use expense_repo::document_repo::DocumentRepoError;
use expense_repo::file_store::FileStoreError;
use expense_repo::payment_repo::PaymentRepoError;
use expense_repo::tag_repo::TagRepoError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    details: &'static str,
}

impl HandlerError {
    pub fn bad_request(message: impl Into<String>) -> HandlerError {
        HandlerError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> HandlerError {
        HandlerError::NotFound(message.into())
    }

    fn details(&self) -> &'static str {
        match self {
            HandlerError::BadRequest(_) => "Validation failed",
            HandlerError::NotFound(_) => "Not found",
            HandlerError::Internal(_) => "Internal server error",
        }
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        let message = match self {
            HandlerError::Internal(err) => {
                error!("Request failed: {:#}", err);
                format!("{:#}", err)
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: message,
            details: self.details(),
        })
    }
}

impl From<FileStoreError> for HandlerError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::Missing(_) => HandlerError::NotFound(e.to_string()),
            FileStoreError::Io { .. } => HandlerError::Internal(e.into()),
        }
    }
}

impl From<TagRepoError> for HandlerError {
    fn from(e: TagRepoError) -> Self {
        match e {
            TagRepoError::TagNotFound(_) => HandlerError::NotFound(e.to_string()),
            TagRepoError::Invalid(_) => HandlerError::BadRequest(e.to_string()),
            TagRepoError::Other(e) => HandlerError::Internal(e),
        }
    }
}

impl From<PaymentRepoError> for HandlerError {
    fn from(e: PaymentRepoError) -> Self {
        match e {
            PaymentRepoError::PaymentNotFound(_) | PaymentRepoError::InvoiceNotFound(_) => {
                HandlerError::NotFound(e.to_string())
            }
            PaymentRepoError::Invalid(_) => HandlerError::BadRequest(e.to_string()),
            PaymentRepoError::File(e) => HandlerError::Internal(e.into()),
            PaymentRepoError::Other(e) => HandlerError::Internal(e),
        }
    }
}

impl From<DocumentRepoError> for HandlerError {
    fn from(e: DocumentRepoError) -> Self {
        match e {
            DocumentRepoError::DocumentNotFound(_) => HandlerError::NotFound(e.to_string()),
            DocumentRepoError::Invalid(_) => HandlerError::BadRequest(e.to_string()),
            DocumentRepoError::File(e) => HandlerError::Internal(e.into()),
            DocumentRepoError::Other(e) => HandlerError::Internal(e),
        }
    }
}

impl From<AnalyticsRepoError> for HandlerError {
    fn from(e: AnalyticsRepoError) -> Self {
        match e {
            AnalyticsRepoError::Other(e) => HandlerError::Internal(e),
        }
    }
}
