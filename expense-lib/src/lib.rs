#[macro_use]
extern crate actix_web;

use actix_web::web::{Data, ServiceConfig};
use actix_web::{web, HttpResponse};
use expense_repo::Repos;
use form::UploadLimit;
use ::tracing::error;

pub mod config;
pub mod document;
mod download;
mod error;
pub mod form;
pub mod health;
mod pagination;
pub mod payment;
pub mod tag;
pub mod tracing;

pub use error::HandlerError;

/// Registers the repositories and every `/api` route.
pub fn app_config_func(repos: Repos, upload_limit: UploadLimit) -> impl Fn(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.service(
            web::scope("/api")
                .app_data(Data::new(repos.tag_repo.clone()))
                .app_data(Data::new(repos.payment_repo.clone()))
                .app_data(Data::new(repos.document_repo.clone()))
                .app_data(Data::new(repos.analytics_repo.clone()))
                .app_data(Data::new(repos.health_check.clone()))
                .app_data(Data::new(upload_limit))
                .app_data(json_config(upload_limit))
                .service(health::health)
                .service(tag::tag_service())
                .service(payment::payment_service())
                .service(document::document_service()),
        );
    }
}

fn json_config(upload_limit: UploadLimit) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(upload_limit.0)
        .error_handler(|err, req| {
            error!(req_path = req.path(), %err);
            let error_body = serde_json::json!({
                "error": format!("{}", err),
                "details": "Unable to parse JSON payload",
            });
            let response = HttpResponse::BadRequest()
                .content_type("application/json")
                .body(error_body.to_string());
            actix_web::error::InternalError::from_response(err, response).into()
        })
}
