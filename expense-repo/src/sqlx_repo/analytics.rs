use crate::analytics::{
    AnalyticsRepo, AnalyticsRepoError, MonthlyStats, PaymentAnalytics, PaymentSummary, TagStats,
    TotalStats,
};
use crate::payment_repo::from_cents;
use crate::sqlx_repo::SQLxRepo;
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{query_as, SqliteConnection};
use tracing::instrument;

#[derive(sqlx::FromRow)]
struct TotalStatsEntry {
    total_cents: i64,
    total_count: i64,
    paid_cents: i64,
    unpaid_cents: i64,
}

#[derive(sqlx::FromRow)]
struct MonthlyStatsEntry {
    year: i64,
    month: i64,
    amount_cents: i64,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct TagStatsEntry {
    tag_id: String,
    tag_name: String,
    tag_color: String,
    amount_cents: i64,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct SummaryEntry {
    total_cents: i64,
    pending: i64,
    monthly_cents: i64,
}

impl SQLxRepo {
    async fn get_total_stats(
        conn: &mut SqliteConnection,
    ) -> Result<TotalStats, AnalyticsRepoError> {
        let entry: TotalStatsEntry = query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) AS total_cents,
                   COUNT(*) AS total_count,
                   COALESCE(SUM(CASE WHEN fully_paid THEN amount_cents ELSE 0 END), 0) AS paid_cents,
                   COALESCE(SUM(CASE WHEN fully_paid THEN 0 ELSE amount_cents END), 0) AS unpaid_cents
            FROM payments
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Unable to get total payment stats")?;

        Ok(TotalStats {
            total_amount: from_cents(entry.total_cents),
            total_count: entry.total_count,
            paid_amount: from_cents(entry.paid_cents),
            unpaid_amount: from_cents(entry.unpaid_cents),
        })
    }

    async fn get_monthly_stats(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<MonthlyStats>, AnalyticsRepoError> {
        let entries: Vec<MonthlyStatsEntry> = query_as(
            r#"
            SELECT CAST(substr(date_paid, 1, 4) AS INTEGER) AS year,
                   CAST(substr(date_paid, 6, 2) AS INTEGER) AS month,
                   SUM(amount_cents) AS amount_cents,
                   COUNT(*) AS count
            FROM payments
            GROUP BY year, month
            ORDER BY year DESC, month DESC
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .context("Unable to get monthly payment stats")?;

        Ok(entries
            .into_iter()
            .map(|entry| MonthlyStats {
                year: entry.year as i32,
                month: entry.month as u32,
                amount: from_cents(entry.amount_cents),
                count: entry.count,
            })
            .collect())
    }

    async fn get_tag_stats(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<TagStats>, AnalyticsRepoError> {
        let entries: Vec<TagStatsEntry> = query_as(
            r#"
            SELECT t.id AS tag_id,
                   t.name AS tag_name,
                   t.color AS tag_color,
                   SUM(p.amount_cents) AS amount_cents,
                   COUNT(DISTINCT p.id) AS count
            FROM tags t
            JOIN payment_tags pt ON pt.tag_id = t.id
            JOIN payments p ON p.id = pt.payment_id
            GROUP BY t.id, t.name, t.color
            ORDER BY amount_cents DESC, t.name
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .context("Unable to get tag payment stats")?;

        Ok(entries
            .into_iter()
            .map(|entry| TagStats {
                tag_id: entry.tag_id,
                tag_name: entry.tag_name,
                tag_color: entry.tag_color,
                amount: from_cents(entry.amount_cents),
                count: entry.count,
            })
            .collect())
    }
}

#[async_trait]
impl AnalyticsRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_payment_analytics(&self) -> Result<PaymentAnalytics, AnalyticsRepoError> {
        // One read transaction so the three blocks agree with each other.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let analytics = PaymentAnalytics {
            total_stats: Self::get_total_stats(&mut *tx).await?,
            monthly_stats: Self::get_monthly_stats(&mut *tx).await?,
            tag_stats: Self::get_tag_stats(&mut *tx).await?,
        };
        tx.commit().await.context("Unable to commit transaction")?;
        Ok(analytics)
    }

    #[instrument(skip(self))]
    async fn get_payment_summary(
        &self,
        month: NaiveDate,
    ) -> Result<PaymentSummary, AnalyticsRepoError> {
        let entry: SummaryEntry = query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) AS total_cents,
                   COALESCE(SUM(CASE WHEN fully_paid THEN 0 ELSE 1 END), 0) AS pending,
                   COALESCE(SUM(CASE WHEN strftime('%Y-%m', date_paid) = ? THEN amount_cents ELSE 0 END), 0) AS monthly_cents
            FROM payments
            "#,
        )
        .bind(month.format("%Y-%m").to_string())
        .fetch_one(&self.pool)
        .await
        .context("Unable to get payment summary")?;

        Ok(PaymentSummary {
            total: from_cents(entry.total_cents),
            pending: entry.pending,
            monthly: from_cents(entry.monthly_cents),
        })
    }
}
