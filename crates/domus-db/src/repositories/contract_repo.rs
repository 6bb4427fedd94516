//! Contract repository implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domus_core::{
    models::{Contract, InvoiceMode, NewContract, RentType, YearMonth},
    traits::ContractRepository,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

const CONTRACT_COLUMNS: &str = r#"
    id, number, owner_id, owner_name, partner_name,
    rent_amount, currency, rent_type, invoice_mode,
    start_date, end_date, extended_until,
    indexation_base_year, indexation_base_month,
    created_at, updated_at
"#;

/// PostgreSQL implementation of ContractRepository
pub struct PgContractRepository {
    pool: PgPool,
}

impl PgContractRepository {
    /// Create a new contract repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContractRepository for PgContractRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Contract>> {
        debug!("Finding contract by id: {}", id);

        let query = format!("SELECT {} FROM contracts WHERE id = $1", CONTRACT_COLUMNS);
        let row = sqlx::query_as::<sqlx::Postgres, ContractRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding contract {}: {}", id, e);
                AppError::Database(format!("Failed to find contract: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: i64, offset: i64) -> AppResult<(Vec<Contract>, i64)> {
        debug!("Listing contracts with limit {} offset {}", limit, offset);

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contracts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting contracts: {}", e);
                AppError::Database(format!("Failed to count contracts: {}", e))
            })?;

        let query = format!(
            "SELECT {} FROM contracts ORDER BY id LIMIT $1 OFFSET $2",
            CONTRACT_COLUMNS
        );
        let rows = sqlx::query_as::<sqlx::Postgres, ContractRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing contracts: {}", e);
                AppError::Database(format!("Failed to list contracts: {}", e))
            })?;

        let contracts = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<AppResult<Vec<Contract>>>()?;

        Ok((contracts, total.0))
    }

    #[instrument(skip(self, contract), fields(number = %contract.number))]
    async fn create(&self, contract: &NewContract) -> AppResult<Contract> {
        debug!("Creating contract {}", contract.number);

        let base_year = contract.indexation_base.map(|p| p.year);
        let base_month = contract.indexation_base.map(|p| p.month as i32);

        let query = format!(
            r#"
            INSERT INTO contracts (
                number, owner_id, owner_name, partner_name,
                rent_amount, currency, rent_type, invoice_mode,
                start_date, end_date, extended_until,
                indexation_base_year, indexation_base_month
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, ContractRow>(&query)
            .bind(contract.number.trim())
            .bind(&contract.owner_id)
            .bind(&contract.owner_name)
            .bind(contract.partner_name.trim())
            .bind(contract.rent_amount)
            .bind(contract.currency.trim().to_uppercase())
            .bind(contract.rent_type.as_str())
            .bind(contract.invoice_mode.as_str())
            .bind(contract.start_date)
            .bind(contract.end_date)
            .bind(contract.extended_until)
            .bind(base_year)
            .bind(base_month)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error creating contract: {}", e);
                if e.to_string().contains("unique constraint") {
                    AppError::AlreadyExists(format!(
                        "Contract {} already exists",
                        contract.number
                    ))
                } else {
                    AppError::Database(format!("Failed to create contract: {}", e))
                }
            })?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn update_rent(
        &self,
        id: i64,
        rent_amount: Decimal,
        indexation_base: YearMonth,
    ) -> AppResult<Contract> {
        debug!("Updating rent of contract {} to {}", id, rent_amount);

        let query = format!(
            r#"
            UPDATE contracts
            SET rent_amount = $2,
                indexation_base_year = $3,
                indexation_base_month = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, ContractRow>(&query)
            .bind(id)
            .bind(rent_amount)
            .bind(indexation_base.year)
            .bind(indexation_base.month as i32)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error updating contract {}: {}", id, e);
                AppError::Database(format!("Failed to update contract rent: {}", e))
            })?
            .ok_or_else(|| AppError::ContractNotFound(id.to_string()))?;

        row.try_into()
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct ContractRow {
    id: i64,
    number: String,
    owner_id: Option<String>,
    owner_name: Option<String>,
    partner_name: String,
    rent_amount: Decimal,
    currency: String,
    rent_type: String,
    invoice_mode: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    extended_until: Option<NaiveDate>,
    indexation_base_year: Option<i32>,
    indexation_base_month: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContractRow> for Contract {
    type Error = AppError;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        let rent_type = RentType::from_str(&row.rent_type).ok_or_else(|| {
            AppError::Internal(format!(
                "Unknown rent type '{}' on contract {}",
                row.rent_type, row.id
            ))
        })?;
        let invoice_mode = InvoiceMode::from_str(&row.invoice_mode).ok_or_else(|| {
            AppError::Internal(format!(
                "Unknown invoice mode '{}' on contract {}",
                row.invoice_mode, row.id
            ))
        })?;
        let indexation_base = match (row.indexation_base_year, row.indexation_base_month) {
            (Some(year), Some(month)) => u32::try_from(month)
                .ok()
                .and_then(|m| YearMonth::new(year, m)),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            number: row.number,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            partner_name: row.partner_name,
            rent_amount: row.rent_amount,
            currency: row.currency,
            rent_type,
            invoice_mode,
            start_date: row.start_date,
            end_date: row.end_date,
            extended_until: row.extended_until,
            indexation_base,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
