use crate::download::open_stored_file;
use crate::error::HandlerError;
use crate::form::{read_form, read_payment, UploadLimit};
use crate::pagination;
use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Local;
use expense_repo::analytics::{AnalyticsRepo, PaymentSummary};
use expense_repo::payment_repo::{InvoiceInfo, Payment, PaymentFilter, PaymentRepo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::RootSpan;

#[derive(Deserialize, Debug)]
pub struct PaymentQuery {
    tag: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    fully_paid: Option<String>,
    page: Option<String>,
    limit: Option<String>,
    stats: Option<String>,
}

#[derive(Serialize)]
struct PaymentList {
    results: Vec<Payment>,
    total: i64,
    page: i64,
    limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<PaymentSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceUploaded {
    message: &'static str,
    file_info: InvoiceInfo,
    payment_id: String,
}

#[get("")]
pub async fn get_payments(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    analytics_repo: web::Data<Arc<dyn AnalyticsRepo>>,
    query: web::Query<PaymentQuery>,
) -> Result<impl Responder, HandlerError> {
    let filter = PaymentFilter {
        tag: pagination::non_empty(&query.tag).map(str::to_string),
        start_date: pagination::date("start_date", pagination::non_empty(&query.start_date))?,
        end_date: pagination::date("end_date", pagination::non_empty(&query.end_date))?,
        fully_paid: pagination::flag(pagination::non_empty(&query.fully_paid)),
    };
    let (page, limit, page_options) = pagination::page(
        pagination::non_empty(&query.page),
        pagination::non_empty(&query.limit),
    );

    let payment_page = payment_repo.get_payments(filter, page_options).await?;
    let stats = match query.stats.as_deref() {
        Some("true") => Some(
            analytics_repo
                .get_payment_summary(Local::now().date_naive())
                .await?,
        ),
        _ => None,
    };

    Ok(HttpResponse::Ok().json(PaymentList {
        results: payment_page.results,
        total: payment_page.total,
        page,
        limit,
        stats,
    }))
}

#[post("")]
pub async fn create_payment(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    upload_limit: web::Data<UploadLimit>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<impl Responder, HandlerError> {
    let form = read_payment(&req, payload, **upload_limit).await?;
    let payment = payment_repo
        .create_payment(form.payment, form.invoice)
        .await?;
    info!(payment_id = %payment.id, "Created payment");
    Ok(HttpResponse::Created().json(payment))
}

#[get("/analytics")]
pub async fn get_payment_analytics(
    analytics_repo: web::Data<Arc<dyn AnalyticsRepo>>,
) -> Result<impl Responder, HandlerError> {
    let analytics = analytics_repo.get_payment_analytics().await?;
    Ok(HttpResponse::Ok().json(analytics))
}

#[get("/{payment_id}")]
pub async fn get_payment(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    payment_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", payment_id.as_str());
    let payment = payment_repo.get_payment(&payment_id).await?;
    Ok(HttpResponse::Ok().json(payment))
}

#[put("/{payment_id}")]
pub async fn update_payment(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    upload_limit: web::Data<UploadLimit>,
    payment_id: web::Path<String>,
    req: HttpRequest,
    payload: web::Payload,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", payment_id.as_str());
    let form = read_payment(&req, payload, **upload_limit).await?;
    let payment = payment_repo
        .update_payment(&payment_id, form.payment, form.invoice)
        .await?;
    Ok(HttpResponse::Ok().json(payment))
}

#[delete("/{payment_id}")]
pub async fn delete_payment(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    payment_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", payment_id.as_str());
    payment_repo.delete_payment(&payment_id).await?;
    info!(payment_id = %payment_id, "Deleted payment");
    Ok(HttpResponse::NoContent().finish())
}

#[post("/{payment_id}/invoice")]
pub async fn upload_invoice(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    upload_limit: web::Data<UploadLimit>,
    payment_id: web::Path<String>,
    req: HttpRequest,
    payload: web::Payload,
    root_span: RootSpan,
) -> Result<impl Responder, HandlerError> {
    root_span.record("entity_id", payment_id.as_str());
    let mut form = read_form(&req, payload, **upload_limit).await?;
    let invoice = form
        .take_file("invoice")
        .ok_or_else(|| HandlerError::bad_request("No file uploaded"))?;

    let file_info = payment_repo.attach_invoice(&payment_id, invoice).await?;
    Ok(HttpResponse::Ok().json(InvoiceUploaded {
        message: "Invoice uploaded successfully",
        file_info,
        payment_id: payment_id.into_inner(),
    }))
}

#[get("/{payment_id}/invoice")]
pub async fn download_invoice(
    payment_repo: web::Data<Arc<dyn PaymentRepo>>,
    payment_id: web::Path<String>,
    root_span: RootSpan,
) -> Result<NamedFile, HandlerError> {
    root_span.record("entity_id", payment_id.as_str());
    let invoice_path = payment_repo.get_invoice_path(&payment_id).await?;
    open_stored_file(&invoice_path, None).await
}
