//! Contract DTOs
//!
//! Request and response types for contract endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use domus_core::models::{Contract, InvoiceMode, NewContract, RentType, YearMonth};
use domus_core::proration::Proration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Contract creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContractCreateRequest {
    /// Unique contract number
    #[validate(length(min = 1, max = 50, message = "Contract number is required"))]
    pub number: String,

    #[validate(length(max = 100))]
    pub owner_id: Option<String>,

    #[validate(length(max = 200))]
    pub owner_name: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Partner name is required"))]
    pub partner_name: String,

    pub rent_amount: Decimal,

    /// `EUR` or the local currency
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,

    #[serde(default = "default_rent_type")]
    pub rent_type: RentType,

    #[serde(default = "default_invoice_mode")]
    pub invoice_mode: InvoiceMode,

    /// Calendar days, `YYYY-MM-DD`
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub extended_until: Option<NaiveDate>,

    /// Month of the HICP value the rent was last indexed to
    #[validate(range(min = 1900, max = 2200))]
    pub indexation_base_year: Option<i32>,
    #[validate(range(min = 1, max = 12))]
    pub indexation_base_month: Option<u32>,
}

fn default_rent_type() -> RentType {
    RentType::Monthly
}

fn default_invoice_mode() -> InvoiceMode {
    InvoiceMode::NextMonth
}

impl ContractCreateRequest {
    /// Convert to the domain payload; the base month needs both year and month
    pub fn into_new_contract(self) -> Result<NewContract, String> {
        let indexation_base = match (self.indexation_base_year, self.indexation_base_month) {
            (Some(year), Some(month)) => Some(
                YearMonth::new(year, month)
                    .ok_or_else(|| format!("Invalid indexation base month {}", month))?,
            ),
            (None, None) => None,
            _ => {
                return Err(
                    "Indexation base requires both year and month".to_string(),
                )
            }
        };

        Ok(NewContract {
            number: self.number,
            owner_id: self.owner_id,
            owner_name: self.owner_name,
            partner_name: self.partner_name,
            rent_amount: self.rent_amount,
            currency: self.currency,
            rent_type: self.rent_type,
            invoice_mode: self.invoice_mode,
            start_date: self.start_date,
            end_date: self.end_date,
            extended_until: self.extended_until,
            indexation_base,
        })
    }
}

/// Contract response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractResponse {
    pub id: i64,
    pub number: String,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub partner_name: String,
    pub rent_amount: Decimal,
    pub currency: String,
    pub rent_type: RentType,
    pub invoice_mode: InvoiceMode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub extended_until: Option<NaiveDate>,
    /// Last day covered, extensions included
    pub effective_end: NaiveDate,
    pub indexation_base: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Contract> for ContractResponse {
    fn from(contract: Contract) -> Self {
        Self {
            effective_end: contract.effective_end(),
            indexation_base: contract.indexation_base.map(|base| base.to_string()),
            id: contract.id,
            number: contract.number,
            owner_id: contract.owner_id,
            owner_name: contract.owner_name,
            partner_name: contract.partner_name,
            rent_amount: contract.rent_amount,
            currency: contract.currency,
            rent_type: contract.rent_type,
            invoice_mode: contract.invoice_mode,
            start_date: contract.start_date,
            end_date: contract.end_date,
            extended_until: contract.extended_until,
            created_at: contract.created_at,
            updated_at: contract.updated_at,
        }
    }
}

/// Month selector for coverage queries
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct MonthParams {
    #[validate(range(min = 1900, max = 2200))]
    pub year: i32,

    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

/// Coverage of one month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProrationResponse {
    pub contract_id: i64,
    pub include: bool,
    pub fraction: f64,
    pub covered_days: u32,
    pub days_in_month: u32,
}

impl ProrationResponse {
    pub fn new(contract_id: i64, proration: Proration) -> Self {
        Self {
            contract_id,
            include: proration.include,
            fraction: proration.fraction,
            covered_days: proration.covered_days,
            days_in_month: proration.days_in_month,
        }
    }
}
