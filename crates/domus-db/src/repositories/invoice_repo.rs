//! Invoice repository implementation
//!
//! Invoice lines are stored as a JSONB array on the invoice row.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domus_core::{
    models::{Invoice, InvoiceLine},
    traits::InvoiceRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of InvoiceRepository
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    /// Create a new invoice repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    #[instrument(skip(self, invoice), fields(number = %invoice.number))]
    async fn create(&self, invoice: &Invoice) -> AppResult<Invoice> {
        debug!("Creating invoice {} for contract {}", invoice.number, invoice.contract_id);

        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
            r#"
            INSERT INTO invoices (
                id, number, contract_id, owner_key, issue_date,
                period_year, period_month, currency,
                exchange_rate, exchange_rate_source, exchange_rate_date,
                lines, total, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING
                id, number, contract_id, owner_key, issue_date,
                period_year, period_month, currency,
                exchange_rate, exchange_rate_source, exchange_rate_date,
                lines, total, created_at
            "#,
        )
        .bind(invoice.id)
        .bind(&invoice.number)
        .bind(invoice.contract_id)
        .bind(&invoice.owner_key)
        .bind(invoice.issue_date)
        .bind(invoice.period_year)
        .bind(invoice.period_month as i32)
        .bind(&invoice.currency)
        .bind(invoice.exchange_rate)
        .bind(&invoice.exchange_rate_source)
        .bind(invoice.exchange_rate_date)
        .bind(Json(&invoice.lines))
        .bind(invoice.total)
        .bind(invoice.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating invoice {}: {}", invoice.number, e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!(
                    "Invoice {} already exists for {}",
                    invoice.number, invoice.owner_key
                ))
            } else {
                AppError::Database(format!("Failed to create invoice: {}", e))
            }
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        debug!("Finding invoice by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
            r#"
            SELECT
                id, number, contract_id, owner_key, issue_date,
                period_year, period_month, currency,
                exchange_rate, exchange_rate_source, exchange_rate_date,
                lines, total, created_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding invoice {}: {}", id, e);
            AppError::Database(format!("Failed to find invoice: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_for_contract(&self, contract_id: i64) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
            r#"
            SELECT
                id, number, contract_id, owner_key, issue_date,
                period_year, period_month, currency,
                exchange_rate, exchange_rate_source, exchange_rate_date,
                lines, total, created_at
            FROM invoices
            WHERE contract_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing invoices of contract {}: {}", contract_id, e);
            AppError::Database(format!("Failed to list invoices: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    number: String,
    contract_id: i64,
    owner_key: String,
    issue_date: NaiveDate,
    period_year: i32,
    period_month: i32,
    currency: String,
    exchange_rate: Decimal,
    exchange_rate_source: String,
    exchange_rate_date: Option<NaiveDate>,
    lines: Json<Vec<InvoiceLine>>,
    total: Decimal,
    created_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Self {
            id: row.id,
            number: row.number,
            contract_id: row.contract_id,
            owner_key: row.owner_key,
            issue_date: row.issue_date,
            period_year: row.period_year,
            period_month: row.period_month as u32,
            currency: row.currency,
            exchange_rate: row.exchange_rate,
            exchange_rate_source: row.exchange_rate_source,
            exchange_rate_date: row.exchange_rate_date,
            lines: row.lines.0,
            total: row.total,
            created_at: row.created_at,
        }
    }
}
