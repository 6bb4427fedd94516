//! Exchange rate DTOs

use chrono::{DateTime, NaiveDate, Utc};
use domus_core::models::{ExchangeRateRecord, ResolvedRate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Resolved rate with the tier that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateResponse {
    pub source: String,
    pub rate: Decimal,
    pub date: NaiveDate,
    /// `db`, `db-stale`, the source name, `cache` or `default`
    pub provenance: String,
}

impl From<ResolvedRate> for ExchangeRateResponse {
    fn from(resolved: ResolvedRate) -> Self {
        Self {
            source: resolved.source.to_string(),
            rate: resolved.rate,
            date: resolved.date,
            provenance: resolved.provenance.to_string(),
        }
    }
}

/// Persisted daily rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateRecordResponse {
    pub source: String,
    pub date: NaiveDate,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl From<ExchangeRateRecord> for ExchangeRateRecordResponse {
    fn from(record: ExchangeRateRecord) -> Self {
        Self {
            source: record.key,
            date: record.date,
            rate: record.rate,
            fetched_at: record.fetched_at,
        }
    }
}

/// History query parameters
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct HistoryParams {
    #[validate(range(min = 1, max = 365))]
    pub limit: Option<i64>,
}
