//! Invoice number DTOs

use chrono::{DateTime, Utc};
use domus_core::models::{AllocatedNumber, InvoiceSequence};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Number allocation request; both fields may be omitted
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AllocateNumberRequest {
    #[validate(length(max = 100, message = "Owner id is too long"))]
    pub owner_id: Option<String>,

    #[validate(length(max = 200, message = "Owner name is too long"))]
    pub owner_name: Option<String>,
}

/// Allocated (or previewed) invoice number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceNumberResponse {
    /// Formatted number, e.g. `MS-2025-00042`
    pub number: String,
    pub owner_key: String,
    /// Raw counter value
    pub sequence_number: i64,
    pub year: i32,
}

impl From<AllocatedNumber> for InvoiceNumberResponse {
    fn from(allocated: AllocatedNumber) -> Self {
        Self {
            number: allocated.formatted,
            owner_key: allocated.owner_key,
            sequence_number: allocated.number,
            year: allocated.year,
        }
    }
}

/// Sequence settings of one owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSettingsResponse {
    pub owner_key: String,
    pub series: String,
    pub next_number: i64,
    pub pad_width: i32,
    pub include_year: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<InvoiceSequence> for SequenceSettingsResponse {
    fn from(sequence: InvoiceSequence) -> Self {
        Self {
            owner_key: sequence.owner_key,
            series: sequence.series,
            next_number: sequence.next_number,
            pad_width: sequence.pad_width,
            include_year: sequence.include_year,
            updated_at: sequence.updated_at,
        }
    }
}
