//! Exchange rate repository implementation
//!
//! One row per (source key, day); refreshing a day replaces its row.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domus_core::{
    models::ExchangeRateRecord, traits::ExchangeRateRepository, AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of ExchangeRateRepository
pub struct PgExchangeRateRepository {
    pool: PgPool,
}

impl PgExchangeRateRepository {
    /// Create a new exchange rate repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExchangeRateRepository for PgExchangeRateRepository {
    #[instrument(skip(self))]
    async fn find_for_date(
        &self,
        key: &str,
        date: NaiveDate,
    ) -> AppResult<Option<ExchangeRateRecord>> {
        debug!("Finding {} rate for {}", key, date);

        let row = sqlx::query_as::<sqlx::Postgres, ExchangeRateRow>(
            r#"
            SELECT key, date, rate, fetched_at
            FROM exchange_rates
            WHERE key = $1 AND date = $2
            "#,
        )
        .bind(key)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding {} rate for {}: {}", key, date, e);
            AppError::Database(format!("Failed to find exchange rate: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_latest(&self, key: &str) -> AppResult<Option<ExchangeRateRecord>> {
        debug!("Finding latest {} rate", key);

        let row = sqlx::query_as::<sqlx::Postgres, ExchangeRateRow>(
            r#"
            SELECT key, date, rate, fetched_at
            FROM exchange_rates
            WHERE key = $1
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding latest {} rate: {}", key, e);
            AppError::Database(format!("Failed to find latest exchange rate: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, record), fields(key = %record.key, date = %record.date))]
    async fn upsert(&self, record: &ExchangeRateRecord) -> AppResult<ExchangeRateRecord> {
        debug!("Storing {} rate {} for {}", record.key, record.rate, record.date);

        let row = sqlx::query_as::<sqlx::Postgres, ExchangeRateRow>(
            r#"
            INSERT INTO exchange_rates (key, date, rate, fetched_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key, date) DO UPDATE
                SET rate = EXCLUDED.rate,
                    fetched_at = EXCLUDED.fetched_at
            RETURNING key, date, rate, fetched_at
            "#,
        )
        .bind(&record.key)
        .bind(record.date)
        .bind(record.rate)
        .bind(record.fetched_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error storing {} rate: {}", record.key, e);
            AppError::Database(format!("Failed to store exchange rate: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn history(&self, key: &str, limit: i64) -> AppResult<Vec<ExchangeRateRecord>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ExchangeRateRow>(
            r#"
            SELECT key, date, rate, fetched_at
            FROM exchange_rates
            WHERE key = $1
            ORDER BY date DESC
            LIMIT $2
            "#,
        )
        .bind(key)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading {} history: {}", key, e);
            AppError::Database(format!("Failed to load exchange rate history: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct ExchangeRateRow {
    key: String,
    date: NaiveDate,
    rate: Decimal,
    fetched_at: DateTime<Utc>,
}

impl From<ExchangeRateRow> for ExchangeRateRecord {
    fn from(row: ExchangeRateRow) -> Self {
        Self {
            key: row.key,
            date: row.date,
            rate: row.rate,
            fetched_at: row.fetched_at,
        }
    }
}
