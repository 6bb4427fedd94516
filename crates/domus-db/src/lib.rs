//! Domus Database Layer
//!
//! This crate provides storage for the Domus back office. It includes:
//!
//! - Connection pool management and migrations with sqlx
//! - PostgreSQL repository implementations of the core traits
//! - A JSON-file store used when no database is configured, and as the
//!   degraded fallback of invoice numbering
//! - [`Repositories`], the bundle of trait objects handed to services

pub mod file_store;
pub mod pool;
pub mod repositories;

use std::sync::Arc;

use domus_core::traits::{
    ContractRepository, ExchangeRateRepository, HicpRepository, InvoiceRepository,
    InvoiceSequenceRepository,
};

pub use file_store::JsonFileStore;
pub use pool::{create_pool, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use domus_core::{AppError, AppResult};
pub use sqlx::PgPool;

/// Storage backends used by the services
#[derive(Clone)]
pub struct Repositories {
    pub sequences: Arc<dyn InvoiceSequenceRepository>,
    pub exchange_rates: Arc<dyn ExchangeRateRepository>,
    pub contracts: Arc<dyn ContractRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub hicp: Arc<dyn HicpRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            sequences: Arc::new(PgInvoiceSequenceRepository::new(pool.clone())),
            exchange_rates: Arc::new(PgExchangeRateRepository::new(pool.clone())),
            contracts: Arc::new(PgContractRepository::new(pool.clone())),
            invoices: Arc::new(PgInvoiceRepository::new(pool.clone())),
            hicp: Arc::new(PgHicpRepository::new(pool)),
        }
    }

    /// Repositories backed by local JSON files
    pub fn file(store: Arc<JsonFileStore>) -> Self {
        Self {
            sequences: store.clone(),
            exchange_rates: store.clone(),
            contracts: store.clone(),
            invoices: store.clone(),
            hicp: store,
        }
    }
}
