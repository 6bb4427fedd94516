//! Domus Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Domus rental back office. It includes:
//!
//! - Domain models (Contract, Invoice, InvoiceSequence, ExchangeRateRecord, HicpValue)
//! - Repository and cache traits implemented by the storage crates
//! - Pure calculators: proration and rate-text parsing
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod parsing;
pub mod proration;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
