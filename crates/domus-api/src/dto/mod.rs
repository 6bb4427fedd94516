//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod contract;
pub mod exchange;
pub mod indexation;
pub mod invoice;
pub mod invoice_number;

pub use common::*;
pub use contract::*;
pub use exchange::*;
pub use indexation::*;
pub use invoice::*;
pub use invoice_number::*;
