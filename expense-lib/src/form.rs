//! Request bodies for payments and documents. Writes accept either a JSON
//! body or `multipart/form-data` carrying the same fields plus a file.

use crate::error::HandlerError;
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{web, HttpRequest};
use chrono::NaiveDate;
use expense_repo::document_repo::NewDocument;
use expense_repo::file_store::Upload;
use expense_repo::payment_repo::NewPayment;
use futures_util::TryStreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// Largest accepted request body, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimit(pub usize);

impl Default for UploadLimit {
    fn default() -> Self {
        UploadLimit(32 * 1024 * 1024)
    }
}

/// Tags arrive as a JSON array or as a string holding one.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
enum TagList {
    List(Vec<String>),
    Encoded(String),
}

impl TagList {
    fn into_set(self) -> Result<HashSet<String>, HandlerError> {
        match self {
            TagList::List(tags) => Ok(clean_tags(tags.iter().map(String::as_str))),
            TagList::Encoded(encoded) => decode_tags(&[encoded.as_str()]),
        }
    }
}

fn clean_tags<'a>(tags: impl Iterator<Item = &'a str>) -> HashSet<String> {
    tags.flat_map(|tag| tag.split(','))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_tags(values: &[&str]) -> Result<HashSet<String>, HandlerError> {
    match values {
        [single] if single.trim_start().starts_with('[') => {
            let tags: Vec<String> = serde_json::from_str(single).map_err(|_| {
                HandlerError::bad_request("tags must be a JSON array of tag ids")
            })?;
            Ok(clean_tags(tags.iter().map(String::as_str)))
        }
        _ => Ok(clean_tags(values.iter().copied())),
    }
}

fn parse_amount(value: &str) -> Result<Decimal, HandlerError> {
    Decimal::from_str(value.trim())
        .or_else(|_| Decimal::from_scientific(value.trim()))
        .map_err(|_| HandlerError::bad_request(format!("amount {:?} is not a number", value)))
}

fn parse_date(value: &str) -> Result<NaiveDate, HandlerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        HandlerError::bad_request(format!("datePaid {:?} must be in YYYY-MM-DD format", value))
    })
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1" || value.eq_ignore_ascii_case("on")
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct PaymentPayload {
    #[serde(default)]
    info: String,
    amount: Option<Decimal>,
    date_paid: Option<String>,
    #[serde(default)]
    fully_paid: bool,
    tags: Option<TagList>,
}

impl PaymentPayload {
    fn into_new_payment(self) -> Result<NewPayment, HandlerError> {
        let amount = self
            .amount
            .ok_or_else(|| HandlerError::bad_request("amount is required"))?;
        let date_paid = self
            .date_paid
            .ok_or_else(|| HandlerError::bad_request("datePaid is required"))?;
        let tags = match self.tags {
            Some(tags) => tags.into_set()?,
            None => HashSet::new(),
        };
        Ok(NewPayment::new(
            self.info,
            amount,
            parse_date(&date_paid)?,
            self.fully_paid,
            tags,
        ))
    }
}

#[derive(Deserialize, Debug, Default)]
struct DocumentPayload {
    #[serde(default)]
    title: String,
    description: Option<String>,
    tags: Option<TagList>,
}

impl DocumentPayload {
    fn into_new_document(self) -> Result<NewDocument, HandlerError> {
        let tags = match self.tags {
            Some(tags) => tags.into_set()?,
            None => HashSet::new(),
        };
        let description = self.description.filter(|d| !d.trim().is_empty());
        Ok(NewDocument::new(self.title, description, tags))
    }
}

/// The text fields and files of a multipart body, in arrival order.
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: Vec<(String, Upload)>,
}

fn multipart_error(err: MultipartError) -> HandlerError {
    HandlerError::bad_request(format!("Invalid multipart request: {}", err))
}

impl FormData {
    pub async fn read(mut multipart: Multipart, limit: UploadLimit) -> Result<FormData, HandlerError> {
        let mut form = FormData::default();
        let mut total = 0;
        while let Some(mut field) = multipart.try_next().await.map_err(multipart_error)? {
            let disposition = field.content_disposition();
            let name = disposition.get_name().unwrap_or_default().to_string();
            let file_name = disposition.get_filename().map(str::to_string);
            let content_type = field.content_type().map(|mime| mime.to_string());

            let mut content = Vec::new();
            while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                total += chunk.len();
                if total > limit.0 {
                    return Err(HandlerError::bad_request(format!(
                        "Request body exceeds {} bytes",
                        limit.0
                    )));
                }
                content.extend_from_slice(&chunk);
            }

            match file_name {
                // Browsers send an empty part when no file was picked.
                Some(file_name) if file_name.is_empty() && content.is_empty() => {}
                Some(original_name) => {
                    debug!(%name, %original_name, size = content.len(), "Received file");
                    form.files.push((
                        name,
                        Upload {
                            original_name,
                            content_type,
                            content,
                        },
                    ));
                }
                None => {
                    let value = String::from_utf8(content).map_err(|_| {
                        HandlerError::bad_request(format!("{} is not valid UTF-8", name))
                    })?;
                    form.fields.push((name, value));
                }
            }
        }
        Ok(form)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Values of a repeated field; `name[]` is accepted as well.
    pub fn values(&self, name: &str) -> Vec<&str> {
        let bracketed = format!("{}[]", name);
        self.fields
            .iter()
            .filter(|(field, _)| field == name || *field == bracketed)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        let position = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.swap_remove(position).1)
    }

    fn tags(&self) -> Result<Option<TagList>, HandlerError> {
        let values = self.values("tags");
        if values.is_empty() {
            return Ok(None);
        }
        decode_tags(&values).map(|tags| Some(TagList::List(tags.into_iter().collect())))
    }

    fn payment_payload(&self) -> Result<PaymentPayload, HandlerError> {
        Ok(PaymentPayload {
            info: self.value("info").unwrap_or_default().to_string(),
            amount: self.value("amount").map(parse_amount).transpose()?,
            date_paid: self.value("datePaid").map(str::to_string),
            fully_paid: self.value("fullyPaid").map(parse_flag).unwrap_or(false),
            tags: self.tags()?,
        })
    }

    fn document_payload(&self) -> Result<DocumentPayload, HandlerError> {
        Ok(DocumentPayload {
            title: self.value("title").unwrap_or_default().to_string(),
            description: self.value("description").map(str::to_string),
            tags: self.tags()?,
        })
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    mut payload: web::Payload,
    limit: UploadLimit,
) -> Result<T, HandlerError> {
    let mut body = Vec::new();
    while let Some(chunk) = payload
        .try_next()
        .await
        .map_err(|e| HandlerError::bad_request(format!("Unable to read request body: {}", e)))?
    {
        if body.len() + chunk.len() > limit.0 {
            return Err(HandlerError::bad_request(format!(
                "Request body exceeds {} bytes",
                limit.0
            )));
        }
        body.extend_from_slice(&chunk);
    }
    serde_json::from_slice(&body)
        .map_err(|e| HandlerError::bad_request(format!("Unable to parse JSON payload: {}", e)))
}

pub async fn read_form(
    req: &HttpRequest,
    payload: web::Payload,
    limit: UploadLimit,
) -> Result<FormData, HandlerError> {
    if !is_multipart(req) {
        return Err(HandlerError::bad_request(
            "Expected a multipart/form-data request",
        ));
    }
    FormData::read(Multipart::new(req.headers(), payload), limit).await
}

pub struct PaymentForm {
    pub payment: NewPayment,
    pub invoice: Option<Upload>,
}

/// Reads a payment from JSON, or from multipart with an optional `invoice`.
pub async fn read_payment(
    req: &HttpRequest,
    payload: web::Payload,
    limit: UploadLimit,
) -> Result<PaymentForm, HandlerError> {
    if is_multipart(req) {
        let mut form = read_form(req, payload, limit).await?;
        let invoice = form.take_file("invoice");
        let payment = form.payment_payload()?.into_new_payment()?;
        Ok(PaymentForm { payment, invoice })
    } else {
        let payload: PaymentPayload = read_json(payload, limit).await?;
        Ok(PaymentForm {
            payment: payload.into_new_payment()?,
            invoice: None,
        })
    }
}

pub struct DocumentForm {
    pub document: NewDocument,
    pub file: Option<Upload>,
}

/// Reads document metadata from JSON, or from multipart with an optional
/// `file`.
pub async fn read_document(
    req: &HttpRequest,
    payload: web::Payload,
    limit: UploadLimit,
) -> Result<DocumentForm, HandlerError> {
    if is_multipart(req) {
        let mut form = read_form(req, payload, limit).await?;
        let file = form.take_file("file");
        let document = form.document_payload()?.into_new_document()?;
        Ok(DocumentForm { document, file })
    } else {
        let payload: DocumentPayload = read_json(payload, limit).await?;
        Ok(DocumentForm {
            document: payload.into_new_document()?,
            file: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::prelude::v1::test;

    fn tags(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn form(fields: &[(&str, &str)]) -> FormData {
        FormData {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: Vec::new(),
        }
    }

    #[test]
    fn json_payment() {
        let payload: PaymentPayload = serde_json::from_str(
            r#"{"info":"Rent","amount":1200.00,"datePaid":"2024-03-01","fullyPaid":true,"tags":["t1","t1","t2"]}"#,
        )
        .unwrap();
        let payment = payload.into_new_payment().unwrap();
        assert_eq!(payment.info, "Rent");
        assert_eq!(payment.amount, Decimal::from(1200));
        assert_eq!(payment.date_paid, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(payment.fully_paid);
        assert_eq!(payment.tags, tags(&["t1", "t2"]));
    }

    #[test]
    fn json_payment_with_encoded_tags() {
        let payload: PaymentPayload = serde_json::from_str(
            r#"{"info":"Water","amount":"19.99","datePaid":"2024-03-02","tags":"[\"a\",\"b\"]"}"#,
        )
        .unwrap();
        let payment = payload.into_new_payment().unwrap();
        assert_eq!(payment.amount, Decimal::from_str("19.99").unwrap());
        assert!(!payment.fully_paid);
        assert_eq!(payment.tags, tags(&["a", "b"]));
    }

    #[test]
    fn json_payment_missing_fields() {
        let payload: PaymentPayload =
            serde_json::from_str(r#"{"info":"Rent","datePaid":"2024-03-01"}"#).unwrap();
        assert!(matches!(
            payload.into_new_payment(),
            Err(HandlerError::BadRequest(_))
        ));

        let payload: PaymentPayload =
            serde_json::from_str(r#"{"info":"Rent","amount":1,"datePaid":"01/03/2024"}"#).unwrap();
        assert!(matches!(
            payload.into_new_payment(),
            Err(HandlerError::BadRequest(_))
        ));
    }

    #[test]
    fn multipart_payment_fields() {
        let form = form(&[
            ("info", "Power"),
            ("amount", "80.5"),
            ("datePaid", "2024-04-01"),
            ("fullyPaid", "true"),
            ("tags", "t1"),
            ("tags", "t2"),
        ]);
        let payment = form.payment_payload().unwrap().into_new_payment().unwrap();
        assert_eq!(payment.amount, Decimal::from_str("80.50").unwrap());
        assert!(payment.fully_paid);
        assert_eq!(payment.tags, tags(&["t1", "t2"]));
    }

    #[test]
    fn multipart_tag_variants() {
        let encoded = form(&[("tags", r#"["x","y"]"#)]);
        assert_eq!(
            encoded.tags().unwrap().unwrap().into_set().unwrap(),
            tags(&["x", "y"])
        );

        let bracketed = form(&[("tags[]", "x"), ("tags[]", "z")]);
        assert_eq!(
            bracketed.tags().unwrap().unwrap().into_set().unwrap(),
            tags(&["x", "z"])
        );

        assert!(form(&[]).tags().unwrap().is_none());
        assert!(form(&[("tags", "[not json")]).tags().is_err());
    }

    #[test]
    fn multipart_bad_amount() {
        let form = form(&[("info", "Power"), ("amount", "lots"), ("datePaid", "2024-04-01")]);
        assert!(matches!(
            form.payment_payload(),
            Err(HandlerError::BadRequest(_))
        ));
    }

    #[test]
    fn document_payload() {
        let mut form = form(&[("title", "Lease"), ("description", ""), ("tags", "[]")]);
        form.files.push(("file".to_string(), Upload::new("lease.pdf", b"pdf".to_vec())));

        let file = form.take_file("file").unwrap();
        assert_eq!(file.original_name, "lease.pdf");
        assert!(form.take_file("file").is_none());

        let document = form.document_payload().unwrap().into_new_document().unwrap();
        assert_eq!(document.title, "Lease");
        assert_eq!(document.description, None);
        assert!(document.tags.is_empty());
    }
}
