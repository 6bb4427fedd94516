//! API layer for the Domus back office
//!
//! HTTP handlers for invoice numbering, exchange rates, contracts, invoices
//! and rent indexation, mounted under `/api/v1`.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

use std::sync::Arc;

use actix_web::{error, web};
use domus_core::AppError;
use domus_services::{
    ContractService, ExchangeRateResolver, IndexationService, InvoiceService, SequenceAllocator,
};

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};

pub use handlers::{
    configure_contracts, configure_exchange_rates, configure_health, configure_indexation,
    configure_invoice_numbers, configure_invoices,
};

/// Services shared by every worker
#[derive(Clone)]
pub struct AppServices {
    pub sequences: Arc<SequenceAllocator>,
    pub exchange: Arc<ExchangeRateResolver>,
    pub contracts: Arc<ContractService>,
    pub invoices: Arc<InvoiceService>,
    pub indexation: Arc<IndexationService>,
}

impl AppServices {
    /// Register the services and every `/api/v1` route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::from(self.sequences.clone()))
            .app_data(web::Data::from(self.exchange.clone()))
            .app_data(web::Data::from(self.contracts.clone()))
            .app_data(web::Data::from(self.invoices.clone()))
            .app_data(web::Data::from(self.indexation.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .service(
                web::scope("/api/v1")
                    .configure(configure_health)
                    .configure(configure_invoice_numbers)
                    .configure(configure_exchange_rates)
                    .configure(configure_contracts)
                    .configure(configure_invoices)
                    .configure(configure_indexation),
            );
    }
}

/// Malformed bodies are reported in the common error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1024 * 1024)
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::InvalidInput(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: error::PathError, _req| {
        AppError::InvalidInput(err.to_string()).into()
    })
}
