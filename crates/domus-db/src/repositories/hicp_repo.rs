//! HICP repository implementation

use async_trait::async_trait;
use domus_core::{
    models::{HicpValue, YearMonth},
    traits::HicpRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of HicpRepository
pub struct PgHicpRepository {
    pool: PgPool,
}

impl PgHicpRepository {
    /// Create a new HICP repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HicpRepository for PgHicpRepository {
    #[instrument(skip(self, values))]
    async fn upsert_many(&self, values: &[HicpValue]) -> AppResult<usize> {
        debug!("Upserting {} HICP values", values.len());

        if values.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        for value in values {
            sqlx::query(
                r#"
                INSERT INTO hicp_values (year, month, value)
                VALUES ($1, $2, $3)
                ON CONFLICT (year, month) DO UPDATE SET value = EXCLUDED.value
                "#,
            )
            .bind(value.year)
            .bind(value.month as i32)
            .bind(value.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(
                    "Database error storing HICP {}-{:02}: {}",
                    value.year, value.month, e
                );
                AppError::Database(format!("Failed to store HICP value: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(values.len())
    }

    #[instrument(skip(self))]
    async fn find(&self, period: YearMonth) -> AppResult<Option<HicpValue>> {
        let row = sqlx::query_as::<sqlx::Postgres, HicpRow>(
            "SELECT year, month, value FROM hicp_values WHERE year = $1 AND month = $2",
        )
        .bind(period.year)
        .bind(period.month as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding HICP {}: {}", period, e);
            AppError::Database(format!("Failed to find HICP value: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list(&self, from_year: i32, to_year: i32) -> AppResult<Vec<HicpValue>> {
        let rows = sqlx::query_as::<sqlx::Postgres, HicpRow>(
            r#"
            SELECT year, month, value
            FROM hicp_values
            WHERE year BETWEEN $1 AND $2
            ORDER BY year, month
            "#,
        )
        .bind(from_year)
        .bind(to_year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing HICP values: {}", e);
            AppError::Database(format!("Failed to list HICP values: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct HicpRow {
    year: i32,
    month: i32,
    value: Decimal,
}

impl From<HicpRow> for HicpValue {
    fn from(row: HicpRow) -> Self {
        Self {
            year: row.year,
            month: row.month as u32,
            value: row.value,
        }
    }
}
