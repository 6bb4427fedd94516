//! Business logic services for Domus
//!
//! This crate contains the services that orchestrate the back-office
//! operations: invoice numbering, exchange rate resolution, rent indexation
//! and monthly invoicing.
//!
//! # Architecture
//!
//! - Each service owns its dependencies as trait objects from domus-core
//! - Services are wrapped in Arc for sharing across actix workers
//! - All operations are instrumented with tracing
//!
//! # Services
//!
//! - `SequenceAllocator` - Per-owner invoice numbers with a local file fallback
//! - `ExchangeRateResolver` - EUR rates through an ordered chain of fallbacks
//! - `ContractService` - Contract registration and coverage queries
//! - `IndexationService` - HICP storage and rent indexation
//! - `InvoiceService` - Monthly rent invoices

pub mod contracts;
pub mod exchange;
pub mod indexation;
pub mod invoicing;
pub mod sequence;

pub use contracts::ContractService;
pub use exchange::{
    Conversion, ExchangeRateResolver, FetchError, HttpRateFetcher, MemoryRateMemo, RateFetcher,
};
pub use indexation::{ContractIndexation, IndexationService};
pub use invoicing::InvoiceService;
pub use sequence::SequenceAllocator;

/// Business logic constants
pub mod constants {
    /// Default number of history records returned per source
    pub const DEFAULT_HISTORY_LIMIT: i64 = 30;

    /// Upper bound of history records returned per source
    pub const MAX_HISTORY_LIMIT: i64 = 365;

    /// Decimal places of an invoice line quantity
    pub const QUANTITY_DP: u32 = 4;

    /// Decimal places of monetary amounts
    pub const AMOUNT_DP: u32 = 2;

    /// Provenance recorded on invoices issued without conversion
    pub const NO_CONVERSION_SOURCE: &str = "none";

    /// User agent sent to upstream rate sources
    pub const FETCH_USER_AGENT: &str = concat!("domus-backoffice/", env!("CARGO_PKG_VERSION"));
}
