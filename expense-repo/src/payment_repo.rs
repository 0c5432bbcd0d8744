use crate::file_store::{FileStoreError, StoredFile, Upload};
use crate::filter::PageOptions;
use crate::{require_non_empty, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub info: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date_paid: NaiveDate,
    pub fully_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_path: Option<String>,
    pub tags: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartialOrd for Payment {
    /// Newest payment first, the order the list endpoint returns.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(
            other
                .date_paid
                .cmp(&self.date_paid)
                .then_with(|| other.created_at.cmp(&self.created_at))
                .then_with(|| other.id.cmp(&self.id)),
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub info: String,
    pub amount: Decimal,
    pub date_paid: NaiveDate,
    #[serde(default)]
    pub fully_paid: bool,
    #[serde(default)]
    pub tags: HashSet<String>,
}

impl NewPayment {
    pub fn new(
        info: impl Into<String>,
        amount: Decimal,
        date_paid: NaiveDate,
        fully_paid: bool,
        tags: HashSet<String>,
    ) -> NewPayment {
        NewPayment {
            info: info.into(),
            amount,
            date_paid,
            fully_paid,
            tags,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("info", &self.info)?;
        to_cents(self.amount).map(|_| ())
    }
}

/// Amounts are stored as whole cents.
pub fn to_cents(amount: Decimal) -> Result<i64, ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::new("amount must not be negative"));
    }
    let cents = amount * Decimal::ONE_HUNDRED;
    if !cents.fract().is_zero() {
        return Err(ValidationError::new(
            "amount must not have more than two decimal places",
        ));
    }
    cents
        .to_i64()
        .ok_or_else(|| ValidationError::new("amount is too large"))
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub tag: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub fully_paid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPage {
    pub results: Vec<Payment>,
    /// Matching payments across all pages.
    pub total: i64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInfo {
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub original_name: String,
}

impl InvoiceInfo {
    pub fn new(stored: StoredFile, upload: &Upload) -> InvoiceInfo {
        let file_name = std::path::Path::new(&stored.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        InvoiceInfo {
            file_name,
            file_path: stored.path,
            file_size: stored.size,
            content_type: upload.content_type.clone(),
            original_name: upload.original_name.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PaymentRepoError {
    #[error("Payment with id {0} not found")]
    PaymentNotFound(String),
    #[error("Payment {0} has no invoice")]
    InvoiceNotFound(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    File(#[from] FileStoreError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait PaymentRepo: Sync + Send {
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, PaymentRepoError>;

    async fn get_payments(
        &self,
        filter: PaymentFilter,
        page_options: PageOptions,
    ) -> Result<PaymentPage, PaymentRepoError>;

    async fn create_payment(
        &self,
        new_payment: NewPayment,
        invoice: Option<Upload>,
    ) -> Result<Payment, PaymentRepoError>;

    /// Replaces the scalar fields and the whole tag set. The invoice is only
    /// touched when a new one is supplied.
    async fn update_payment(
        &self,
        payment_id: &str,
        updated_payment: NewPayment,
        invoice: Option<Upload>,
    ) -> Result<Payment, PaymentRepoError>;

    async fn delete_payment(&self, payment_id: &str) -> Result<(), PaymentRepoError>;

    async fn attach_invoice(
        &self,
        payment_id: &str,
        invoice: Upload,
    ) -> Result<InvoiceInfo, PaymentRepoError>;

    async fn get_invoice_path(&self, payment_id: &str) -> Result<String, PaymentRepoError>;
}
