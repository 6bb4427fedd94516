//! Monthly rent invoicing
//!
//! An invoice bills one month of one contract with a single rent line.
//! EUR rents are converted to the local currency with the rate of the
//! configured invoicing source; rents already in local currency carry rate 1.

use std::sync::Arc;

use chrono::Utc;
use domus_core::{
    config::InvoicingConfig,
    models::{Contract, Invoice, InvoiceLine, InvoiceMode, RateSource, RentType, YearMonth},
    proration::{compute_current_month_coverage, compute_next_month_proration, Proration},
    traits::{ContractRepository, InvoiceRepository},
    AppError, AppResult,
};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::constants::{AMOUNT_DP, NO_CONVERSION_SOURCE, QUANTITY_DP};
use crate::exchange::ExchangeRateResolver;
use crate::sequence::SequenceAllocator;

/// Invoice service
pub struct InvoiceService {
    contracts: Arc<dyn ContractRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    allocator: Arc<SequenceAllocator>,
    resolver: Arc<ExchangeRateResolver>,
    rate_source: RateSource,
    local_currency: String,
}

/// Month billed by an invoice and how much of it
struct Coverage {
    period: YearMonth,
    proration: Proration,
}

/// Amount of the rent line and the rate it was converted with
struct Pricing {
    amount: Decimal,
    currency: String,
    rate: Decimal,
    rate_source: String,
    rate_date: Option<chrono::NaiveDate>,
}

impl InvoiceService {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        allocator: Arc<SequenceAllocator>,
        resolver: Arc<ExchangeRateResolver>,
        config: &InvoicingConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            contracts,
            invoices,
            allocator,
            resolver,
            rate_source: config.source()?,
            local_currency: config.local_currency.trim().to_uppercase(),
        })
    }

    /// Issue the invoice of a contract for the month `year`/`month`
    ///
    /// `year`/`month` is the issue month; advance-billed contracts are
    /// invoiced for the month after it.
    #[instrument(skip(self))]
    pub async fn issue_monthly(
        &self,
        contract_id: i64,
        year: i32,
        month: u32,
        force_refresh_rate: bool,
    ) -> AppResult<Invoice> {
        let contract = self.load_contract(contract_id).await?;
        let coverage = coverage(&contract, year, month)?;

        if !coverage.proration.include {
            return Err(AppError::NothingToInvoice(format!(
                "contract {} has no coverage in {}",
                contract.number, coverage.period
            )));
        }

        let fraction = Decimal::from(coverage.proration.covered_days)
            / Decimal::from(coverage.proration.days_in_month);
        let quantity =
            fraction.round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::MidpointAwayFromZero);
        debug!(
            "Contract {} covers {}/{} days of {}",
            contract.number,
            coverage.proration.covered_days,
            coverage.proration.days_in_month,
            coverage.period
        );

        let amount = contract.rent_amount.checked_mul(fraction).ok_or_else(|| {
            AppError::Validation(format!(
                "Rent {} of contract {} is out of range",
                contract.rent_amount, contract.number
            ))
        })?;
        let pricing = self.price(&contract, amount, force_refresh_rate).await?;

        let line = InvoiceLine {
            description: line_description(&contract, coverage.period),
            quantity,
            unit_price: contract.rent_amount,
            amount: pricing.amount,
        };

        let allocated = self
            .allocator
            .allocate(contract.owner_id.as_deref(), contract.owner_name.as_deref())
            .await?;

        let lines = vec![line];
        let invoice = Invoice {
            id: Uuid::new_v4(),
            number: allocated.formatted,
            contract_id: contract.id,
            owner_key: allocated.owner_key,
            issue_date: self.allocator.today(),
            period_year: coverage.period.year,
            period_month: coverage.period.month,
            currency: pricing.currency,
            exchange_rate: pricing.rate,
            exchange_rate_source: pricing.rate_source,
            exchange_rate_date: pricing.rate_date,
            total: Invoice::compute_total(&lines),
            lines,
            created_at: Utc::now(),
        };

        let invoice = self.invoices.create(&invoice).await?;
        info!(
            "Issued invoice {} for contract {} ({} {})",
            invoice.number, contract.number, invoice.total, invoice.currency
        );
        Ok(invoice)
    }

    /// Invoices of a contract, newest first
    pub async fn list_for_contract(&self, contract_id: i64) -> AppResult<Vec<Invoice>> {
        self.load_contract(contract_id).await?;
        self.invoices.list_for_contract(contract_id).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Invoice> {
        self.invoices
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::InvoiceNotFound(id.to_string()))
    }

    async fn load_contract(&self, id: i64) -> AppResult<Contract> {
        self.contracts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ContractNotFound(id.to_string()))
    }

    async fn price(
        &self,
        contract: &Contract,
        amount: Decimal,
        force_refresh_rate: bool,
    ) -> AppResult<Pricing> {
        if !contract.is_eur() {
            return Ok(Pricing {
                amount: amount
                    .round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::MidpointAwayFromZero),
                currency: contract.currency.clone(),
                rate: Decimal::ONE,
                rate_source: NO_CONVERSION_SOURCE.to_string(),
                rate_date: None,
            });
        }

        let conversion = self
            .resolver
            .convert(amount, self.rate_source, force_refresh_rate)
            .await?;

        Ok(Pricing {
            amount: conversion.amount,
            currency: self.local_currency.clone(),
            rate: conversion.rate.rate,
            rate_source: conversion.rate.provenance.as_str().to_string(),
            rate_date: Some(conversion.rate.date),
        })
    }
}

/// Billed month and coverage of an invoice issued in `year`/`month`
///
/// One-off contracts are billed once, in full, for the month they start in.
fn coverage(contract: &Contract, year: i32, month: u32) -> AppResult<Coverage> {
    let issue = YearMonth::new(year, month)
        .ok_or_else(|| AppError::Validation(format!("Invalid month: {}", month)))?;
    let period = match contract.invoice_mode {
        InvoiceMode::NextMonth => issue.next(),
        InvoiceMode::CurrentMonth => issue,
    };

    let proration = match (contract.rent_type, contract.invoice_mode) {
        (RentType::OneOff, _) if YearMonth::of(contract.start_date) == period => {
            Proration::full(period.days())
        }
        (RentType::OneOff, _) => Proration::none(period.days()),
        (RentType::Monthly, InvoiceMode::NextMonth) => {
            compute_next_month_proration(contract, year, month)?
        }
        (RentType::Monthly, InvoiceMode::CurrentMonth) => {
            compute_current_month_coverage(contract, year, month)?
        }
    };

    Ok(Coverage { period, proration })
}

fn line_description(contract: &Contract, period: YearMonth) -> String {
    match contract.rent_type {
        RentType::Monthly => format!("Rent {} - contract {}", period, contract.number),
        RentType::OneOff => format!("Rent - contract {}", contract.number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use domus_core::{config::ExchangeConfig, models::NewContract, traits::InvoiceSequenceRepository};
    use domus_db::JsonFileStore;
    use rust_decimal_macros::dec;
    use tempfile::{tempdir, TempDir};

    use crate::exchange::{FetchError, MemoryRateMemo, RateFetcher};

    struct FixedFetcher(Decimal);

    #[async_trait]
    impl RateFetcher for FixedFetcher {
        async fn fetch(&self, _source: RateSource) -> Result<Decimal, FetchError> {
            Ok(self.0)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_contract(number: &str, currency: &str, mode: InvoiceMode) -> NewContract {
        NewContract {
            number: number.to_string(),
            owner_id: None,
            owner_name: Some("Maria Ionescu".to_string()),
            partner_name: "Tenant SRL".to_string(),
            rent_amount: dec!(1000),
            currency: currency.to_string(),
            rent_type: RentType::Monthly,
            invoice_mode: mode,
            start_date: date(2024, 6, 10),
            end_date: date(2025, 2, 15),
            extended_until: None,
            indexation_base: None,
        }
    }

    async fn setup() -> (InvoiceService, Arc<JsonFileStore>, TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let config = InvoicingConfig::default();

        let allocator = Arc::new(
            SequenceAllocator::from_config(None, store.clone(), &config).unwrap(),
        );
        let resolver = Arc::new(ExchangeRateResolver::new(
            store.clone(),
            Arc::new(FixedFetcher(dec!(5))),
            Arc::new(MemoryRateMemo::new()),
            &ExchangeConfig::default(),
            config.tz().unwrap(),
        ));
        let service =
            InvoiceService::new(store.clone(), store.clone(), allocator, resolver, &config)
                .unwrap();
        (service, store, dir)
    }

    async fn create(store: &JsonFileStore, contract: NewContract) -> Contract {
        ContractRepository::create(store, &contract).await.unwrap()
    }

    #[tokio::test]
    async fn test_partial_advance_month_is_converted() {
        let (service, store, _dir) = setup().await;
        let contract = create(&store, new_contract("C-1", "EUR", InvoiceMode::NextMonth)).await;

        let invoice = service
            .issue_monthly(contract.id, 2025, 1, false)
            .await
            .unwrap();

        assert_eq!((invoice.period_year, invoice.period_month), (2025, 2));
        assert_eq!(invoice.currency, "RON");
        assert_eq!(invoice.exchange_rate, dec!(5));
        assert_eq!(invoice.exchange_rate_source, "bnr");
        assert_eq!(invoice.lines[0].quantity, dec!(0.5357));
        assert_eq!(invoice.lines[0].unit_price, dec!(1000));
        // 1000 * 15/28 * 5
        assert_eq!(invoice.total, dec!(2678.57));
        assert_eq!(invoice.owner_key, "name:maria-ionescu");
    }

    #[tokio::test]
    async fn test_local_currency_rent_is_not_converted() {
        let (service, store, _dir) = setup().await;
        let contract = create(&store, new_contract("C-2", "RON", InvoiceMode::CurrentMonth)).await;

        let invoice = service
            .issue_monthly(contract.id, 2024, 6, false)
            .await
            .unwrap();

        assert_eq!((invoice.period_year, invoice.period_month), (2024, 6));
        assert_eq!(invoice.currency, "RON");
        assert_eq!(invoice.exchange_rate, Decimal::ONE);
        assert_eq!(invoice.exchange_rate_source, "none");
        assert_eq!(invoice.exchange_rate_date, None);
        // 21 of 30 days
        assert_eq!(invoice.lines[0].quantity, dec!(0.7));
        assert_eq!(invoice.total, dec!(700.00));
    }

    #[tokio::test]
    async fn test_invoices_get_consecutive_numbers() {
        let (service, store, _dir) = setup().await;
        let contract = create(&store, new_contract("C-3", "RON", InvoiceMode::CurrentMonth)).await;

        let first = service.issue_monthly(contract.id, 2024, 7, false).await.unwrap();
        let second = service.issue_monthly(contract.id, 2024, 8, false).await.unwrap();

        let sequence = InvoiceSequenceRepository::find(store.as_ref(), &first.owner_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sequence.next_number, 3);
        assert_ne!(first.number, second.number);
        assert!(first.number.ends_with("00001"));
        assert!(second.number.ends_with("00002"));

        let listed = service.list_for_contract(contract.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(service.get(first.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_owners_number_their_invoices_independently() {
        let (service, store, _dir) = setup().await;
        let first = create(&store, new_contract("C-6", "RON", InvoiceMode::CurrentMonth)).await;
        let mut other = new_contract("C-7", "RON", InvoiceMode::CurrentMonth);
        other.owner_name = Some("Andrei Popescu".to_string());
        let second = create(&store, other).await;

        let a = service.issue_monthly(first.id, 2024, 7, false).await.unwrap();
        let b = service.issue_monthly(second.id, 2024, 7, false).await.unwrap();

        assert_eq!(a.number, b.number);
        assert_eq!(a.owner_key, "name:maria-ionescu");
        assert_eq!(b.owner_key, "name:andrei-popescu");
        assert_eq!(service.list_for_contract(second.id).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_out_of_range_rent_consumes_no_number() {
        let (service, store, _dir) = setup().await;
        let mut huge = new_contract("C-8", "EUR", InvoiceMode::NextMonth);
        huge.rent_amount = Decimal::MAX;
        let contract = create(&store, huge).await;

        assert!(matches!(
            service.issue_monthly(contract.id, 2025, 1, false).await,
            Err(AppError::Validation(_))
        ));
        let sequence = InvoiceSequenceRepository::find(store.as_ref(), "name:maria-ionescu")
            .await
            .unwrap();
        assert!(sequence.is_none());
    }

    #[tokio::test]
    async fn test_nothing_to_invoice_consumes_no_number() {
        let (service, store, _dir) = setup().await;
        let mut ending = new_contract("C-4", "EUR", InvoiceMode::NextMonth);
        ending.end_date = date(2025, 3, 2);
        let contract = create(&store, ending).await;

        assert!(matches!(
            service.issue_monthly(contract.id, 2025, 2, false).await,
            Err(AppError::NothingToInvoice(_))
        ));

        let sequence = InvoiceSequenceRepository::find(store.as_ref(), "name:maria-ionescu")
            .await
            .unwrap();
        assert!(sequence.is_none());
    }

    #[tokio::test]
    async fn test_one_off_is_billed_for_its_start_month_only() {
        let (service, store, _dir) = setup().await;
        let mut one_off = new_contract("C-5", "RON", InvoiceMode::CurrentMonth);
        one_off.rent_type = RentType::OneOff;
        let contract = create(&store, one_off).await;

        let invoice = service.issue_monthly(contract.id, 2024, 6, false).await.unwrap();
        assert_eq!(invoice.total, dec!(1000.00));
        assert_eq!(invoice.lines[0].quantity, dec!(1));

        assert!(matches!(
            service.issue_monthly(contract.id, 2024, 7, false).await,
            Err(AppError::NothingToInvoice(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_contract_and_invoice() {
        let (service, _store, _dir) = setup().await;

        assert!(matches!(
            service.issue_monthly(99, 2025, 1, false).await,
            Err(AppError::ContractNotFound(_))
        ));
        assert!(matches!(
            service.list_for_contract(99).await,
            Err(AppError::ContractNotFound(_))
        ));
        assert!(matches!(
            service.get(Uuid::new_v4()).await,
            Err(AppError::InvoiceNotFound(_))
        ));
    }
}
