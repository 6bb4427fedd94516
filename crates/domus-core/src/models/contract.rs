//! Rental contract model
//!
//! A contract binds an owner and a partner (tenant) for a date range, with a
//! rent billed either for the current month or in advance for the next one.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::YearMonth;

/// How rent is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentType {
    /// Recurring monthly rent
    Monthly,
    /// Single payment for the whole term
    OneOff,
}

impl RentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentType::Monthly => "monthly",
            RentType::OneOff => "one_off",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(RentType::Monthly),
            "one_off" => Some(RentType::OneOff),
            _ => None,
        }
    }
}

/// Which month an invoice issued in month M covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceMode {
    /// Invoice issued in M covers M
    CurrentMonth,
    /// Invoice issued in M covers M+1 (advance billing)
    NextMonth,
}

impl InvoiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceMode::CurrentMonth => "current_month",
            InvoiceMode::NextMonth => "next_month",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "current_month" => Some(InvoiceMode::CurrentMonth),
            "next_month" => Some(InvoiceMode::NextMonth),
            _ => None,
        }
    }
}

/// Rental contract entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    /// Unique identifier
    pub id: i64,

    /// Contract number as printed on documents
    pub number: String,

    /// Owner identifier, scopes invoice numbering
    pub owner_id: Option<String>,

    /// Owner display name, used for numbering when no id is set
    pub owner_name: Option<String>,

    /// Tenant
    pub partner_name: String,

    /// Rent per month (or total for one-off contracts)
    pub rent_amount: Decimal,

    /// Currency the rent is expressed in (e.g. "EUR")
    pub currency: String,

    pub rent_type: RentType,

    pub invoice_mode: InvoiceMode,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    /// End date after extensions, if any
    pub extended_until: Option<NaiveDate>,

    /// Month whose HICP value the current rent refers to
    pub indexation_base: Option<YearMonth>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Last day covered by the contract, extensions included
    pub fn effective_end(&self) -> NaiveDate {
        self.extended_until.unwrap_or(self.end_date)
    }

    /// Whether the contract covers at least one day of the month
    pub fn overlaps(&self, month: YearMonth) -> bool {
        self.start_date <= month.last_day() && self.effective_end() >= month.first_day()
    }

    /// Whether the rent is expressed in EUR and needs conversion
    pub fn is_eur(&self) -> bool {
        self.currency.eq_ignore_ascii_case("EUR")
    }
}

/// Contract creation payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewContract {
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
    pub indexation_base: Option<YearMonth>,
}

impl NewContract {
    /// Validate business rules
    pub fn validate(&self) -> Result<(), String> {
        if self.number.trim().is_empty() {
            return Err("Contract number cannot be empty".to_string());
        }

        if self.partner_name.trim().is_empty() {
            return Err("Partner name cannot be empty".to_string());
        }

        if self.rent_amount <= Decimal::ZERO {
            return Err("Rent amount must be greater than zero".to_string());
        }

        if self.currency.trim().len() != 3 {
            return Err("Currency must be a 3-letter code".to_string());
        }

        if self.start_date > self.end_date {
            return Err("Start date must not be after end date".to_string());
        }

        if let Some(extended) = self.extended_until {
            if extended < self.end_date {
                return Err("Extension cannot end before the contract end date".to_string());
            }
        }

        Ok(())
    }

    /// Materialize the entity once an id has been assigned
    pub fn into_contract(self, id: i64) -> Contract {
        let now = Utc::now();
        Contract {
            id,
            number: self.number.trim().to_string(),
            owner_id: self.owner_id,
            owner_name: self.owner_name,
            partner_name: self.partner_name.trim().to_string(),
            rent_amount: self.rent_amount,
            currency: self.currency.trim().to_uppercase(),
            rent_type: self.rent_type,
            invoice_mode: self.invoice_mode,
            start_date: self.start_date,
            end_date: self.end_date,
            extended_until: self.extended_until,
            indexation_base: self.indexation_base,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_contract() -> NewContract {
        NewContract {
            number: "C-001".to_string(),
            owner_id: Some("7".to_string()),
            owner_name: None,
            partner_name: "Tenant SRL".to_string(),
            rent_amount: dec!(850.00),
            currency: "eur".to_string(),
            rent_type: RentType::Monthly,
            invoice_mode: InvoiceMode::NextMonth,
            start_date: date(2024, 1, 1),
            end_date: date(2025, 12, 31),
            extended_until: None,
            indexation_base: None,
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(new_contract().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_dates() {
        let mut c = new_contract();
        c.start_date = date(2026, 1, 1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_extension() {
        let mut c = new_contract();
        c.extended_until = Some(date(2025, 6, 30));
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_effective_end_uses_extension() {
        let mut c = new_contract();
        c.extended_until = Some(date(2026, 6, 30));
        let contract = c.into_contract(1);
        assert_eq!(contract.effective_end(), date(2026, 6, 30));
        assert_eq!(contract.currency, "EUR");
        assert!(contract.is_eur());
    }

    #[test]
    fn test_overlaps() {
        let contract = new_contract().into_contract(1);
        assert!(contract.overlaps(YearMonth::new(2025, 12).unwrap()));
        assert!(!contract.overlaps(YearMonth::new(2026, 1).unwrap()));
        assert!(!contract.overlaps(YearMonth::new(2023, 12).unwrap()));
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(InvoiceMode::from_str("next_month"), Some(InvoiceMode::NextMonth));
        assert_eq!(RentType::from_str(RentType::OneOff.as_str()), Some(RentType::OneOff));
        assert_eq!(RentType::from_str("weekly"), None);
    }
}
