use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct TotalStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub total_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unpaid_amount: Decimal,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MonthlyStats {
    pub year: i32,
    pub month: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub count: i64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct TagStats {
    pub tag_id: String,
    pub tag_name: String,
    pub tag_color: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub count: i64,
}

/// Always fully populated; an empty payment table yields zeroes and empty lists.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct PaymentAnalytics {
    pub total_stats: TotalStats,
    pub monthly_stats: Vec<MonthlyStats>,
    pub tag_stats: Vec<TagStats>,
}

/// The short summary attached to the payment list.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct PaymentSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub pending: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub monthly: Decimal,
}

#[derive(Error, Debug)]
pub enum AnalyticsRepoError {
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait AnalyticsRepo: Sync + Send {
    async fn get_payment_analytics(&self) -> Result<PaymentAnalytics, AnalyticsRepoError>;

    /// `month` may be any day of the month to summarize.
    async fn get_payment_summary(
        &self,
        month: NaiveDate,
    ) -> Result<PaymentSummary, AnalyticsRepoError>;
}
