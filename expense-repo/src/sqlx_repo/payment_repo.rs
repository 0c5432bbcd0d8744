use crate::file_store::{FileCleanup, FileKind, StoredFile, Upload};
use crate::filter::{PageOptions, WhereClause};
use crate::payment_repo::PaymentRepoError::{InvoiceNotFound, PaymentNotFound};
use crate::payment_repo::{
    from_cents, to_cents, InvoiceInfo, NewPayment, Payment, PaymentFilter, PaymentPage,
    PaymentRepo, PaymentRepoError,
};
use crate::sqlx_repo::{split_tag_ids, SQLxRepo, PAYMENT_TAGS};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{query, query_as, query_scalar, Executor, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};
use uuid::Uuid;

const SELECT_PAYMENTS: &str = r#"
    SELECT p.id, p.info, p.amount_cents, p.date_paid, p.fully_paid, p.invoice_path,
           p.created_at, p.updated_at, GROUP_CONCAT(pt.tag_id) AS tag_ids
    FROM payments p
    LEFT JOIN payment_tags pt ON p.id = pt.payment_id"#;

const SELECT_PAYMENT_BY_ID: &str = r#"
    SELECT p.id, p.info, p.amount_cents, p.date_paid, p.fully_paid, p.invoice_path,
           p.created_at, p.updated_at, GROUP_CONCAT(pt.tag_id) AS tag_ids
    FROM payments p
    LEFT JOIN payment_tags pt ON p.id = pt.payment_id
    WHERE p.id = ?
    GROUP BY p.id"#;

#[derive(sqlx::FromRow)]
struct PaymentEntry {
    id: String,
    info: String,
    amount_cents: i64,
    date_paid: NaiveDate,
    fully_paid: bool,
    invoice_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    tag_ids: Option<String>,
}

impl From<PaymentEntry> for Payment {
    fn from(value: PaymentEntry) -> Self {
        Payment {
            id: value.id,
            info: value.info,
            amount: from_cents(value.amount_cents),
            date_paid: value.date_paid,
            fully_paid: value.fully_paid,
            invoice_path: value.invoice_path.filter(|path| !path.is_empty()),
            tags: split_tag_ids(value.tag_ids),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl SQLxRepo {
    #[instrument(skip(db_executor))]
    async fn get_payment_entry<'e, E>(
        db_executor: E,
        payment_id: &str,
    ) -> Result<Option<PaymentEntry>, PaymentRepoError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let payment_entry: Option<PaymentEntry> = query_as(SELECT_PAYMENT_BY_ID)
            .bind(payment_id)
            .fetch_optional(db_executor)
            .await
            .with_context(|| format!("Unable to get payment {}", payment_id))?;
        Ok(payment_entry)
    }

    /// `None` when the payment does not exist, `Some(None)` when it has no invoice.
    #[instrument(skip(db_executor))]
    async fn get_invoice_entry<'e, E>(
        db_executor: E,
        payment_id: &str,
    ) -> Result<Option<Option<String>>, PaymentRepoError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let invoice_path: Option<Option<String>> =
            query_scalar("SELECT invoice_path FROM payments WHERE id = ?")
                .bind(payment_id)
                .fetch_optional(db_executor)
                .await
                .with_context(|| format!("Unable to get invoice of payment {}", payment_id))?;
        Ok(invoice_path.map(|path| path.filter(|p| !p.is_empty())))
    }

    #[instrument(skip(conn, new_payment))]
    async fn insert_payment_entry(
        conn: &mut SqliteConnection,
        payment_id: &str,
        new_payment: &NewPayment,
        invoice_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentRepoError> {
        let amount_cents = to_cents(new_payment.amount)?;
        query(
            "INSERT INTO payments (id, info, amount_cents, date_paid, fully_paid, invoice_path, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payment_id)
        .bind(&new_payment.info)
        .bind(amount_cents)
        .bind(new_payment.date_paid)
        .bind(new_payment.fully_paid)
        .bind(invoice_path)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Unable to insert payment")?;

        PAYMENT_TAGS
            .replace(conn, payment_id, &new_payment.tags)
            .await?;
        Ok(())
    }

    #[instrument(skip(conn, updated_payment))]
    async fn update_payment_entry(
        conn: &mut SqliteConnection,
        payment_id: &str,
        updated_payment: &NewPayment,
        invoice_path: Option<&str>,
    ) -> Result<PaymentEntry, PaymentRepoError> {
        let amount_cents = to_cents(updated_payment.amount)?;
        let result = query(
            "UPDATE payments SET info = ?, amount_cents = ?, date_paid = ?, fully_paid = ?, invoice_path = COALESCE(?, invoice_path), updated_at = ? WHERE id = ?",
        )
        .bind(&updated_payment.info)
        .bind(amount_cents)
        .bind(updated_payment.date_paid)
        .bind(updated_payment.fully_paid)
        .bind(invoice_path)
        .bind(Utc::now())
        .bind(payment_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Unable to update payment {}", payment_id))?;
        if result.rows_affected() == 0 {
            return Err(PaymentNotFound(payment_id.to_string()));
        }

        PAYMENT_TAGS
            .replace(&mut *conn, payment_id, &updated_payment.tags)
            .await?;

        Self::get_payment_entry(&mut *conn, payment_id)
            .await?
            .ok_or_else(|| PaymentNotFound(payment_id.to_string()))
    }

    async fn save_invoice(
        &self,
        invoice: Option<&Upload>,
    ) -> Result<Option<StoredFile>, PaymentRepoError> {
        match invoice {
            Some(upload) => {
                let file_id = Uuid::new_v4().to_string();
                let stored = self.files.save(FileKind::Invoice, &file_id, upload).await?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    /// Removes an invoice written for a write that did not commit.
    async fn discard_invoice(&self, stored: Option<&StoredFile>) {
        if let Some(stored) = stored {
            self.files.discard(&stored.path).await;
        }
    }
}

#[async_trait]
impl PaymentRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, PaymentRepoError> {
        Self::get_payment_entry(&self.pool, payment_id)
            .await?
            .map(|p| p.into())
            .ok_or_else(|| PaymentNotFound(payment_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn get_payments(
        &self,
        filter: PaymentFilter,
        page_options: PageOptions,
    ) -> Result<PaymentPage, PaymentRepoError> {
        let where_clause = WhereClause::from(&filter);

        let mut query_builder = QueryBuilder::new(SELECT_PAYMENTS);
        where_clause.push_to(&mut query_builder);
        query_builder
            .push(" GROUP BY p.id ORDER BY p.date_paid DESC, p.created_at DESC, p.id DESC");
        page_options.push_to(&mut query_builder);
        let payment_entries: Vec<PaymentEntry> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("Unable to get payments")?;

        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM payments p");
        where_clause.push_to(&mut count_builder);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Unable to count payments")?;

        Ok(PaymentPage {
            results: payment_entries.into_iter().map(|p| p.into()).collect(),
            total,
        })
    }

    #[instrument(skip(self, new_payment, invoice))]
    async fn create_payment(
        &self,
        new_payment: NewPayment,
        invoice: Option<Upload>,
    ) -> Result<Payment, PaymentRepoError> {
        new_payment.validate()?;

        let payment_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let stored = self.save_invoice(invoice.as_ref()).await?;
        let invoice_path = stored.as_ref().map(|s| s.path.as_str());

        let result = async {
            let mut tx = self
                .pool
                .begin()
                .await
                .context("Unable to start transaction")?;
            Self::insert_payment_entry(&mut tx, &payment_id, &new_payment, invoice_path, now)
                .await?;
            tx.commit().await.context("Unable to commit transaction")?;
            Ok::<(), PaymentRepoError>(())
        }
        .await;
        if let Err(err) = result {
            self.discard_invoice(stored.as_ref()).await;
            return Err(err);
        }

        info!(%payment_id, "Created payment");
        Ok(Payment {
            id: payment_id,
            info: new_payment.info,
            amount: new_payment.amount,
            date_paid: new_payment.date_paid,
            fully_paid: new_payment.fully_paid,
            invoice_path: stored.map(|s| s.path),
            tags: new_payment.tags,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self, updated_payment, invoice))]
    async fn update_payment(
        &self,
        payment_id: &str,
        updated_payment: NewPayment,
        invoice: Option<Upload>,
    ) -> Result<Payment, PaymentRepoError> {
        updated_payment.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let previous_invoice = Self::get_invoice_entry(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| PaymentNotFound(payment_id.to_string()))?;

        let stored = self.save_invoice(invoice.as_ref()).await?;
        let invoice_path = stored.as_ref().map(|s| s.path.as_str());

        let result = async {
            let entry =
                Self::update_payment_entry(&mut tx, payment_id, &updated_payment, invoice_path)
                    .await?;
            tx.commit().await.context("Unable to commit transaction")?;
            Ok::<PaymentEntry, PaymentRepoError>(entry)
        }
        .await;
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                self.discard_invoice(stored.as_ref()).await;
                return Err(err);
            }
        };

        if let (Some(_), Some(previous)) = (&stored, previous_invoice) {
            self.files.discard(&previous).await;
        }
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    async fn delete_payment(&self, payment_id: &str) -> Result<(), PaymentRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let invoice = Self::get_invoice_entry(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| PaymentNotFound(payment_id.to_string()))?;

        PAYMENT_TAGS.clear(&mut *tx, payment_id).await?;
        let result = query("DELETE FROM payments WHERE id = ?")
            .bind(payment_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Unable to delete payment {}", payment_id))?;
        if result.rows_affected() == 0 {
            return Err(PaymentNotFound(payment_id.to_string()));
        }
        tx.commit().await.context("Unable to commit transaction")?;

        if let Some(invoice) = invoice {
            FileCleanup::BestEffort.remove(&self.files, &invoice).await?;
        }
        info!(%payment_id, "Deleted payment");
        Ok(())
    }

    #[instrument(skip(self, invoice))]
    async fn attach_invoice(
        &self,
        payment_id: &str,
        invoice: Upload,
    ) -> Result<InvoiceInfo, PaymentRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to start transaction")?;
        let previous_invoice = Self::get_invoice_entry(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| PaymentNotFound(payment_id.to_string()))?;

        let stored = self
            .save_invoice(Some(&invoice))
            .await?
            .context("Invoice was not stored")?;

        let result = async {
            query("UPDATE payments SET invoice_path = ?, updated_at = ? WHERE id = ?")
                .bind(&stored.path)
                .bind(Utc::now())
                .bind(payment_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Unable to attach invoice to payment {}", payment_id))?;
            tx.commit().await.context("Unable to commit transaction")?;
            Ok::<(), PaymentRepoError>(())
        }
        .await;
        if let Err(err) = result {
            self.discard_invoice(Some(&stored)).await;
            return Err(err);
        }

        if let Some(previous) = previous_invoice {
            if previous != stored.path {
                self.files.discard(&previous).await;
            }
        }
        Ok(InvoiceInfo::new(stored, &invoice))
    }

    #[instrument(skip(self))]
    async fn get_invoice_path(&self, payment_id: &str) -> Result<String, PaymentRepoError> {
        Self::get_invoice_entry(&self.pool, payment_id)
            .await?
            .ok_or_else(|| PaymentNotFound(payment_id.to_string()))?
            .ok_or_else(|| InvoiceNotFound(payment_id.to_string()))
    }
}
