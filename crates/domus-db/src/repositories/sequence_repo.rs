//! Invoice sequence repository implementation
//!
//! Each allocation is a single `INSERT ... ON CONFLICT DO UPDATE` statement,
//! so concurrent callers serialize on the owner's row and never observe the
//! same counter value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domus_core::{
    models::{InvoiceSequence, IssuedNumber, SequenceDefaults, SequenceSettingsUpdate},
    traits::InvoiceSequenceRepository,
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of InvoiceSequenceRepository
pub struct PgInvoiceSequenceRepository {
    pool: PgPool,
}

impl PgInvoiceSequenceRepository {
    /// Create a new sequence repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceSequenceRepository for PgInvoiceSequenceRepository {
    #[instrument(skip(self, defaults))]
    async fn increment(
        &self,
        owner_key: &str,
        defaults: &SequenceDefaults,
    ) -> AppResult<IssuedNumber> {
        debug!("Incrementing invoice sequence for {}", owner_key);

        // A fresh row is written with next_number = 2 since number 1 is
        // handed out by this very statement.
        let row = sqlx::query_as::<sqlx::Postgres, IssuedRow>(
            r#"
            INSERT INTO invoice_settings (
                owner_key, series, next_number, pad_width, include_year, updated_at
            )
            VALUES ($1, $2, 2, $3, $4, NOW())
            ON CONFLICT (owner_key) DO UPDATE
                SET next_number = invoice_settings.next_number + 1,
                    updated_at = NOW()
            RETURNING
                owner_key, series, next_number, pad_width, include_year, updated_at,
                next_number - 1 AS issued_number
            "#,
        )
        .bind(owner_key)
        .bind(&defaults.series)
        .bind(defaults.pad_width)
        .bind(defaults.include_year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error incrementing sequence {}: {}", owner_key, e);
            AppError::Database(format!("Failed to increment invoice sequence: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find(&self, owner_key: &str) -> AppResult<Option<InvoiceSequence>> {
        debug!("Finding invoice sequence for {}", owner_key);

        let row = sqlx::query_as::<sqlx::Postgres, SequenceRow>(
            r#"
            SELECT owner_key, series, next_number, pad_width, include_year, updated_at
            FROM invoice_settings
            WHERE owner_key = $1
            "#,
        )
        .bind(owner_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding sequence {}: {}", owner_key, e);
            AppError::Database(format!("Failed to find invoice sequence: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, defaults, update))]
    async fn update_settings(
        &self,
        owner_key: &str,
        defaults: &SequenceDefaults,
        update: &SequenceSettingsUpdate,
    ) -> AppResult<InvoiceSequence> {
        debug!("Updating invoice sequence settings for {}", owner_key);

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO invoice_settings (
                owner_key, series, next_number, pad_width, include_year, updated_at
            )
            VALUES ($1, $2, 1, $3, $4, NOW())
            ON CONFLICT (owner_key) DO NOTHING
            "#,
        )
        .bind(owner_key)
        .bind(&defaults.series)
        .bind(defaults.pad_width)
        .bind(defaults.include_year)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error creating sequence {}: {}", owner_key, e);
            AppError::Database(format!("Failed to create invoice sequence: {}", e))
        })?;

        // Lock the row so the forward-only check and the write are atomic
        let current = sqlx::query_as::<sqlx::Postgres, SequenceRow>(
            r#"
            SELECT owner_key, series, next_number, pad_width, include_year, updated_at
            FROM invoice_settings
            WHERE owner_key = $1
            FOR UPDATE
            "#,
        )
        .bind(owner_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error locking sequence {}: {}", owner_key, e);
            AppError::Database(format!("Failed to load invoice sequence: {}", e))
        })?;

        let mut sequence: InvoiceSequence = current.into();
        sequence.apply(update).map_err(AppError::Conflict)?;

        let row = sqlx::query_as::<sqlx::Postgres, SequenceRow>(
            r#"
            UPDATE invoice_settings
            SET series = $2, next_number = $3, pad_width = $4, include_year = $5,
                updated_at = NOW()
            WHERE owner_key = $1
            RETURNING owner_key, series, next_number, pad_width, include_year, updated_at
            "#,
        )
        .bind(owner_key)
        .bind(&sequence.series)
        .bind(sequence.next_number)
        .bind(sequence.pad_width)
        .bind(sequence.include_year)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error updating sequence {}: {}", owner_key, e);
            AppError::Database(format!("Failed to update invoice sequence: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(row.into())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct SequenceRow {
    owner_key: String,
    series: String,
    next_number: i64,
    pad_width: i32,
    include_year: bool,
    updated_at: DateTime<Utc>,
}

impl From<SequenceRow> for InvoiceSequence {
    fn from(row: SequenceRow) -> Self {
        Self {
            owner_key: row.owner_key,
            series: row.series,
            next_number: row.next_number,
            pad_width: row.pad_width,
            include_year: row.include_year,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IssuedRow {
    #[sqlx(flatten)]
    sequence: SequenceRow,
    issued_number: i64,
}

impl From<IssuedRow> for IssuedNumber {
    fn from(row: IssuedRow) -> Self {
        Self {
            sequence: row.sequence.into(),
            number: row.issued_number,
        }
    }
}
