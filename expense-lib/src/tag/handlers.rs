use crate::error::HandlerError;
use actix_web::{web, HttpResponse, Responder};
use expense_repo::tag_repo::{NewTag, TagRepo};
use std::sync::Arc;
use tracing_actix_web::RootSpan;

#[get("")]
pub async fn get_all_tags(
    tag_repo: web::Data<Arc<dyn TagRepo>>,
) -> Result<impl Responder, HandlerError> {
    let tags = tag_repo.get_all_tags().await?;
    Ok(HttpResponse::Ok().json(tags))
}

#[post("")]
pub async fn create_tag(
    tag_repo: web::Data<Arc<dyn TagRepo>>,
    new_tag: web::Json<NewTag>,
) -> Result<impl Responder, HandlerError> {
    let tag = tag_repo.create_tag(new_tag.into_inner()).await?;
    Ok(HttpResponse::Created().json(tag))
}

#[get("/stats")]
pub async fn get_tag_stats(
    tag_repo: web::Data<Arc<dyn TagRepo>>,
) -> Result<impl Responder, HandlerError> {
    let usage = tag_repo.get_tag_usage().await?;
    Ok(HttpResponse::Ok().json(usage))
}

#[get("/{tag_id}")]
pub async fn get_tag(
    tag_repo: web::Data<Arc<dyn TagRepo>>,
    tag_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", tag_id.as_str());
    let tag = tag_repo.get_tag(&tag_id).await?;
    Ok(HttpResponse::Ok().json(tag))
}

#[put("/{tag_id}")]
pub async fn update_tag(
    tag_repo: web::Data<Arc<dyn TagRepo>>,
    tag_id: web::Path<String>,
    updated_tag: web::Json<NewTag>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", tag_id.as_str());
    let tag = tag_repo
        .update_tag(&tag_id, updated_tag.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(tag))
}

#[delete("/{tag_id}")]
pub async fn delete_tag(
    tag_repo: web::Data<Arc<dyn TagRepo>>,
    tag_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", tag_id.as_str());
    tag_repo.delete_tag(&tag_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
