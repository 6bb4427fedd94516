//! Contract registration and coverage queries

use std::sync::Arc;

use domus_core::{
    models::{Contract, InvoiceMode, NewContract},
    proration::{compute_current_month_coverage, compute_next_month_proration, Proration},
    traits::ContractRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument};

/// Contract service
pub struct ContractService {
    contracts: Arc<dyn ContractRepository>,
}

impl ContractService {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }

    /// Validate and store a new contract
    #[instrument(skip(self, contract), fields(number = %contract.number))]
    pub async fn create(&self, contract: NewContract) -> AppResult<Contract> {
        contract.validate().map_err(AppError::Validation)?;

        let created = self.contracts.create(&contract).await?;
        info!("Created contract {} (id {})", created.number, created.id);
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> AppResult<Contract> {
        self.contracts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ContractNotFound(id.to_string()))
    }

    /// Page of contracts ordered by id, with the total count
    pub async fn list(&self, page: i64, per_page: i64) -> AppResult<(Vec<Contract>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        debug!("Listing contracts page {} ({} per page)", page, per_page);
        self.contracts.list(per_page, offset).await
    }

    /// Coverage an invoice issued in `year`/`month` would bill
    ///
    /// Advance-billed contracts report the following month, the others the
    /// issue month itself.
    #[instrument(skip(self))]
    pub async fn proration(&self, id: i64, year: i32, month: u32) -> AppResult<Proration> {
        let contract = self.get(id).await?;
        match contract.invoice_mode {
            InvoiceMode::NextMonth => compute_next_month_proration(&contract, year, month),
            InvoiceMode::CurrentMonth => compute_current_month_coverage(&contract, year, month),
        }
    }
}
