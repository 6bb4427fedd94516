//! Invoice DTOs

use chrono::{DateTime, NaiveDate, Utc};
use domus_core::models::{Invoice, InvoiceLine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Monthly invoice request; `year`/`month` is the issue month
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IssueInvoiceRequest {
    #[validate(range(min = 1900, max = 2200))]
    pub year: i32,

    #[validate(range(min = 1, max = 12))]
    pub month: u32,

    /// Skip today's persisted exchange rate
    #[serde(default)]
    pub force_refresh_rate: bool,
}

/// Issued invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub number: String,
    pub contract_id: i64,
    pub owner_key: String,
    pub issue_date: NaiveDate,
    /// Billed month, `YYYY-MM`
    pub period: String,
    pub currency: String,
    pub exchange_rate: Decimal,
    pub exchange_rate_source: String,
    pub exchange_rate_date: Option<NaiveDate>,
    pub lines: Vec<InvoiceLine>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            number: invoice.number,
            contract_id: invoice.contract_id,
            owner_key: invoice.owner_key,
            issue_date: invoice.issue_date,
            period: format!("{:04}-{:02}", invoice.period_year, invoice.period_month),
            currency: invoice.currency,
            exchange_rate: invoice.exchange_rate,
            exchange_rate_source: invoice.exchange_rate_source,
            exchange_rate_date: invoice.exchange_rate_date,
            lines: invoice.lines,
            total: invoice.total,
            created_at: invoice.created_at,
        }
    }
}
