//! Repository implementations
//!
//! PostgreSQL-backed implementations of the repository traits defined in
//! domus-core.

pub mod contract_repo;
pub mod exchange_rate_repo;
pub mod hicp_repo;
pub mod invoice_repo;
pub mod sequence_repo;

pub use contract_repo::PgContractRepository;
pub use exchange_rate_repo::PgExchangeRateRepository;
pub use hicp_repo::PgHicpRepository;
pub use invoice_repo::PgInvoiceRepository;
pub use sequence_repo::PgInvoiceSequenceRepository;
