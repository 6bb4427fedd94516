//! HICP and indexation DTOs

use domus_core::models::{HicpValue, YearMonth};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

/// Bulk HICP upsert
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HicpUpsertRequest {
    #[validate(length(min = 1, max = 1200, message = "Between 1 and 1200 values per request"))]
    pub values: Vec<HicpValue>,
}

/// Inclusive year range
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct HicpRangeParams {
    #[validate(range(min = 1900, max = 2200))]
    pub from_year: i32,

    #[validate(range(min = 1900, max = 2200))]
    pub to_year: i32,
}

/// Ad-hoc indexation of an amount
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IndexRentRequest {
    pub base_amount: Decimal,

    pub from_year: i32,
    #[validate(range(min = 1, max = 12))]
    pub from_month: u32,

    pub to_year: i32,
    #[validate(range(min = 1, max = 12))]
    pub to_month: u32,
}

impl IndexRentRequest {
    pub fn from(&self) -> Option<YearMonth> {
        YearMonth::new(self.from_year, self.from_month)
    }

    pub fn to(&self) -> Option<YearMonth> {
        YearMonth::new(self.to_year, self.to_month)
    }
}

/// Indexation of a stored contract
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContractIndexationRequest {
    pub to_year: i32,
    #[validate(range(min = 1, max = 12))]
    pub to_month: u32,
}

impl ContractIndexationRequest {
    pub fn to(&self) -> Option<YearMonth> {
        YearMonth::new(self.to_year, self.to_month)
    }
}
