//! Common traits for repositories and caches
//!
//! Defines abstractions for persistence (PostgreSQL or local JSON files) and
//! for the last-known exchange rate cache.

use crate::error::AppError;
use crate::models::{
    CachedRate, Contract, ExchangeRateRecord, HicpValue, Invoice, InvoiceSequence, IssuedNumber,
    NewContract, RateSource, SequenceDefaults, SequenceSettingsUpdate, YearMonth,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Invoice sequence storage
#[async_trait]
pub trait InvoiceSequenceRepository: Send + Sync {
    /// Atomically hand out the next number of an owner's sequence
    ///
    /// Creates the sequence from `defaults` when absent. The returned number
    /// is the pre-increment value; implementations must perform the
    /// increment as a single atomic operation.
    async fn increment(
        &self,
        owner_key: &str,
        defaults: &SequenceDefaults,
    ) -> Result<IssuedNumber, AppError>;

    /// Find the sequence of an owner
    async fn find(&self, owner_key: &str) -> Result<Option<InvoiceSequence>, AppError>;

    /// Create-or-update the formatting settings of an owner's sequence
    ///
    /// Returns `AppError::Conflict` when the update would move the counter
    /// backwards.
    async fn update_settings(
        &self,
        owner_key: &str,
        defaults: &SequenceDefaults,
        update: &SequenceSettingsUpdate,
    ) -> Result<InvoiceSequence, AppError>;
}

/// Daily exchange rate storage
#[async_trait]
pub trait ExchangeRateRepository: Send + Sync {
    /// Record of a source for a given day
    async fn find_for_date(
        &self,
        key: &str,
        date: NaiveDate,
    ) -> Result<Option<ExchangeRateRecord>, AppError>;

    /// Most recent record of a source regardless of date
    async fn find_latest(&self, key: &str) -> Result<Option<ExchangeRateRecord>, AppError>;

    /// Insert or replace the record keyed by (key, date)
    async fn upsert(&self, record: &ExchangeRateRecord) -> Result<ExchangeRateRecord, AppError>;

    /// Records of a source, newest first
    async fn history(&self, key: &str, limit: i64) -> Result<Vec<ExchangeRateRecord>, AppError>;
}

/// Contract storage
#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Contract>, AppError>;

    /// Contracts ordered by id with the total count
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Contract>, i64), AppError>;

    async fn create(&self, contract: &NewContract) -> Result<Contract, AppError>;

    /// Replace the rent after indexation
    async fn update_rent(
        &self,
        id: i64,
        rent_amount: Decimal,
        indexation_base: YearMonth,
    ) -> Result<Contract, AppError>;
}

/// Invoice storage
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn create(&self, invoice: &Invoice) -> Result<Invoice, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Invoices of a contract, newest first
    async fn list_for_contract(&self, contract_id: i64) -> Result<Vec<Invoice>, AppError>;
}

/// HICP index storage
#[async_trait]
pub trait HicpRepository: Send + Sync {
    /// Insert or replace monthly values, returns the number written
    async fn upsert_many(&self, values: &[HicpValue]) -> Result<usize, AppError>;

    async fn find(&self, period: YearMonth) -> Result<Option<HicpValue>, AppError>;

    /// Values within an inclusive year range, oldest first
    async fn list(&self, from_year: i32, to_year: i32) -> Result<Vec<HicpValue>, AppError>;
}

/// Last successfully fetched rate per source
///
/// Kept per process by default; a shared implementation lets several
/// instances see each other's fetches.
#[async_trait]
pub trait RateMemo: Send + Sync {
    async fn get(&self, source: RateSource) -> Result<Option<CachedRate>, AppError>;

    async fn set(&self, source: RateSource, rate: CachedRate) -> Result<(), AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_meta() {
        assert_eq!(PaginationMeta::new(95, 1, 10).total_pages, 10);
        assert_eq!(PaginationMeta::new(101, 1, 10).total_pages, 11);
        assert_eq!(PaginationMeta::new(0, 1, 10).total_pages, 0);
    }
}
