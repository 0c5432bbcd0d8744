use crate::error::HandlerError;
use actix_web::{web, HttpResponse, Responder};
use anyhow::anyhow;
use expense_repo::HealthCheck;
use serde_json::json;
use std::sync::Arc;

#[get("/health")]
pub async fn health(
    health_check: web::Data<Arc<dyn HealthCheck>>,
) -> Result<impl Responder, HandlerError> {
    if !health_check.check().await {
        return Err(HandlerError::Internal(anyhow!("Database is unreachable")));
    }
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}
