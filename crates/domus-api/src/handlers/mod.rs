//! HTTP request handlers

pub mod contract;
pub mod exchange;
pub mod health;
pub mod indexation;
pub mod invoice;
pub mod invoice_number;

pub use contract::configure as configure_contracts;
pub use exchange::configure as configure_exchange_rates;
pub use health::configure as configure_health;
pub use indexation::configure as configure_indexation;
pub use invoice::configure as configure_invoices;
pub use invoice_number::configure as configure_invoice_numbers;
