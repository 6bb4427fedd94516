//! Invoice model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One billed line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceLine {
    pub description: String,

    /// Fraction of the period billed (1 for a full month)
    pub quantity: Decimal,

    /// Unit price in the contract currency
    pub unit_price: Decimal,

    /// Line total in the invoice currency
    pub amount: Decimal,
}

/// Issued invoice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: Uuid,

    /// Formatted number allocated from the owner's sequence
    pub number: String,

    pub contract_id: i64,

    pub owner_key: String,

    pub issue_date: NaiveDate,

    /// Billed month
    pub period_year: i32,
    pub period_month: u32,

    /// Invoice currency
    pub currency: String,

    /// Rate used to convert the contract currency (1 when no conversion)
    pub exchange_rate: Decimal,

    /// Provenance tag of the rate (`none` when no conversion)
    pub exchange_rate_source: String,

    pub exchange_rate_date: Option<NaiveDate>,

    pub lines: Vec<InvoiceLine>,

    pub total: Decimal,

    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Sum of line amounts
    pub fn compute_total(lines: &[InvoiceLine]) -> Decimal {
        lines.iter().map(|l| l.amount).sum()
    }
}
