//! Domain models for Domus
//!
//! This module contains all the core domain models used throughout the application.

pub mod contract;
pub mod exchange;
pub mod hicp;
pub mod invoice;
pub mod period;
pub mod sequence;

pub use contract::{Contract, InvoiceMode, NewContract, RentType};
pub use exchange::{CachedRate, ExchangeRateRecord, Provenance, RateSource, ResolvedRate};
pub use hicp::{HicpValue, Indexation};
pub use invoice::{Invoice, InvoiceLine};
pub use period::YearMonth;
pub use sequence::{
    owner_key, AllocatedNumber, InvoiceSequence, IssuedNumber, SequenceDefaults,
    SequenceSettingsUpdate, GENERIC_OWNER_KEY,
};
