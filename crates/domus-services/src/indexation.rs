//! HICP storage and rent indexation

use std::sync::Arc;

use domus_core::{
    config::IndexationConfig,
    models::{Contract, HicpValue, Indexation, YearMonth},
    traits::{ContractRepository, HicpRepository},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

/// Contract after its rent was indexed
#[derive(Debug, Clone, Serialize)]
pub struct ContractIndexation {
    pub contract: Contract,
    pub indexation: Indexation,
}

/// Indexation service
pub struct IndexationService {
    hicp: Arc<dyn HicpRepository>,
    contracts: Arc<dyn ContractRepository>,
    allow_decrease: bool,
}

impl IndexationService {
    pub fn new(
        hicp: Arc<dyn HicpRepository>,
        contracts: Arc<dyn ContractRepository>,
        config: &IndexationConfig,
    ) -> Self {
        Self {
            hicp,
            contracts,
            allow_decrease: config.allow_decrease,
        }
    }

    /// Store monthly index values; the whole batch is rejected if one is invalid
    #[instrument(skip(self, values), fields(count = values.len()))]
    pub async fn upsert_hicp(&self, values: &[HicpValue]) -> AppResult<usize> {
        for value in values {
            value.validate().map_err(AppError::Validation)?;
        }

        let written = self.hicp.upsert_many(values).await?;
        info!("Stored {} HICP values", written);
        Ok(written)
    }

    pub async fn list_hicp(&self, from_year: i32, to_year: i32) -> AppResult<Vec<HicpValue>> {
        if to_year < from_year {
            return Err(AppError::Validation(format!(
                "Year range {}..{} is empty",
                from_year, to_year
            )));
        }
        self.hicp.list(from_year, to_year).await
    }

    /// Index `base_amount` from the index of `from` to the index of `to`
    #[instrument(skip(self))]
    pub async fn index_rent(
        &self,
        base_amount: Decimal,
        from: YearMonth,
        to: YearMonth,
    ) -> AppResult<Indexation> {
        if base_amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Base amount must be greater than zero".to_string(),
            ));
        }
        if to < from {
            return Err(AppError::Validation(format!(
                "Target month {} is before base month {}",
                to, from
            )));
        }

        let from_value = self.index_value(from).await?;
        let to_value = self.index_value(to).await?;

        Indexation::compute(base_amount, from_value, to_value, self.allow_decrease)
            .map_err(AppError::Validation)
    }

    /// Index a contract's rent from its indexation base to `to`
    ///
    /// The indexed rent replaces the current one and `to` becomes the new
    /// indexation base.
    #[instrument(skip(self))]
    pub async fn index_contract(&self, contract_id: i64, to: YearMonth) -> AppResult<ContractIndexation> {
        let contract = self
            .contracts
            .find_by_id(contract_id)
            .await?
            .ok_or_else(|| AppError::ContractNotFound(contract_id.to_string()))?;

        let base = contract.indexation_base.ok_or_else(|| {
            AppError::Validation(format!(
                "Contract {} has no indexation base month",
                contract.number
            ))
        })?;

        let indexation = self.index_rent(contract.rent_amount, base, to).await?;
        let contract = self
            .contracts
            .update_rent(contract_id, indexation.indexed_amount, to)
            .await?;

        info!(
            "Indexed contract {} rent {} -> {} (factor {})",
            contract.number, indexation.base_amount, indexation.indexed_amount, indexation.factor
        );

        Ok(ContractIndexation {
            contract,
            indexation,
        })
    }

    async fn index_value(&self, period: YearMonth) -> AppResult<HicpValue> {
        self.hicp
            .find(period)
            .await?
            .ok_or_else(|| AppError::HicpNotFound(period.to_string()))
    }
}
