use crate::download::open_stored_file;
use crate::error::HandlerError;
use crate::form::{read_document, UploadLimit};
use crate::pagination;
use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use expense_repo::document_repo::{Document, DocumentFilter, DocumentRepo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::RootSpan;

#[derive(Deserialize, Debug)]
pub struct DocumentQuery {
    tag: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

#[derive(Serialize)]
struct DocumentList {
    results: Vec<Document>,
    total: i64,
    limit: i64,
    offset: i64,
}

#[get("")]
pub async fn get_documents(
    document_repo: web::Data<Arc<dyn DocumentRepo>>,
    query: web::Query<DocumentQuery>,
) -> Result<impl Responder, HandlerError> {
    let filter = DocumentFilter {
        tag: pagination::non_empty(&query.tag).map(str::to_string),
    };
    let page_options = pagination::offset(
        pagination::non_empty(&query.offset),
        pagination::non_empty(&query.limit),
    );

    let document_page = document_repo.get_documents(filter, page_options).await?;
    Ok(HttpResponse::Ok().json(DocumentList {
        results: document_page.results,
        total: document_page.total,
        limit: page_options.limit,
        offset: page_options.offset,
    }))
}

#[post("")]
pub async fn create_document(
    document_repo: web::Data<Arc<dyn DocumentRepo>>,
    upload_limit: web::Data<UploadLimit>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<impl Responder, HandlerError> {
    let form = read_document(&req, payload, **upload_limit).await?;
    let file = form
        .file
        .ok_or_else(|| HandlerError::bad_request("File is required"))?;
    let document = document_repo.create_document(form.document, file).await?;
    info!(document_id = %document.id, "Created document");
    Ok(HttpResponse::Created().json(document))
}

#[get("/{document_id}")]
pub async fn get_document(
    document_repo: web::Data<Arc<dyn DocumentRepo>>,
    document_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", document_id.as_str());
    let document = document_repo.get_document(&document_id).await?;
    Ok(HttpResponse::Ok().json(document))
}

#[put("/{document_id}")]
pub async fn update_document(
    document_repo: web::Data<Arc<dyn DocumentRepo>>,
    upload_limit: web::Data<UploadLimit>,
    document_id: web::Path<String>,
    req: HttpRequest,
    payload: web::Payload,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", document_id.as_str());
    let form = read_document(&req, payload, **upload_limit).await?;
    let document = document_repo
        .update_document(&document_id, form.document, form.file)
        .await?;
    Ok(HttpResponse::Ok().json(document))
}

#[delete("/{document_id}")]
pub async fn delete_document(
    document_repo: web::Data<Arc<dyn DocumentRepo>>,
    document_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", document_id.as_str());
    document_repo.delete_document(&document_id).await?;
    info!(document_id = %document_id, "Deleted document");
    Ok(HttpResponse::NoContent().finish())
}

#[get("/{document_id}/download")]
pub async fn download_document(
    document_repo: web::Data<Arc<dyn DocumentRepo>>,
    document_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<NamedFile, HandlerError> {
    root_span.record("entity_id", document_id.as_str());
    let file = document_repo.get_document_file(&document_id).await?;
    open_stored_file(&file.path, Some(file.original_name)).await
}
