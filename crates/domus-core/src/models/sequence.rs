//! Invoice sequence model
//!
//! One persistent counter per owner key. Numbers are formatted as
//! `{series}-{year?}-{zero-padded number}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Key used when neither an owner id nor an owner name is available
pub const GENERIC_OWNER_KEY: &str = "default";

/// Settings applied when a sequence is created on first allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDefaults {
    pub series: String,
    pub pad_width: i32,
    pub include_year: bool,
}

impl Default for SequenceDefaults {
    fn default() -> Self {
        Self {
            series: "MS".to_string(),
            pad_width: 5,
            include_year: true,
        }
    }
}

/// Invoice numbering sequence of one owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceSequence {
    /// Owner id, `name:<slug>` or [`GENERIC_OWNER_KEY`]
    pub owner_key: String,

    /// Series prefix (e.g. "MS")
    pub series: String,

    /// Number handed out by the next allocation
    pub next_number: i64,

    /// Zero-padding width of the numeric part
    pub pad_width: i32,

    /// Whether the year is part of the formatted number
    pub include_year: bool,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl InvoiceSequence {
    /// Fresh sequence starting at 1
    pub fn new(owner_key: impl Into<String>, defaults: &SequenceDefaults) -> Self {
        Self {
            owner_key: owner_key.into(),
            series: defaults.series.clone(),
            next_number: 1,
            pad_width: defaults.pad_width,
            include_year: defaults.include_year,
            updated_at: Utc::now(),
        }
    }

    /// Format a sequence number with this sequence's settings
    pub fn format_number(&self, number: i64, year: i32) -> String {
        let width = usize::try_from(self.pad_width).unwrap_or(0);
        if self.include_year {
            format!("{}-{}-{:0width$}", self.series, year, number, width = width)
        } else {
            format!("{}-{:0width$}", self.series, number, width = width)
        }
    }

    /// Apply an operator update; the counter may only move forward
    pub fn apply(&mut self, update: &SequenceSettingsUpdate) -> Result<(), String> {
        update.check_series()?;
        if let Some(next) = update.next_number {
            if next < self.next_number {
                return Err(format!(
                    "next_number {} would reuse numbers already issued (current {})",
                    next, self.next_number
                ));
            }
            self.next_number = next;
        }
        if let Some(series) = &update.series {
            self.series = series.trim().to_string();
        }
        if let Some(width) = update.pad_width {
            self.pad_width = width;
        }
        if let Some(include_year) = update.include_year {
            self.include_year = include_year;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Result of one atomic increment: the settings plus the number handed out
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedNumber {
    pub sequence: InvoiceSequence,
    pub number: i64,
}

/// Allocated invoice number returned to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocatedNumber {
    pub owner_key: String,
    pub number: i64,
    pub year: i32,
    pub formatted: String,
}

/// Operator update of a sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SequenceSettingsUpdate {
    #[validate(length(min = 1, max = 16, message = "Series must be 1-16 characters"))]
    pub series: Option<String>,

    #[validate(range(min = 1, max = 12, message = "Pad width must be between 1 and 12"))]
    pub pad_width: Option<i32>,

    pub include_year: Option<bool>,

    #[validate(range(min = 1, message = "Next number must be at least 1"))]
    pub next_number: Option<i64>,
}

impl SequenceSettingsUpdate {
    /// A series made only of whitespace would format numbers like `-2025-00007`
    pub fn check_series(&self) -> Result<(), String> {
        match &self.series {
            Some(series) if series.trim().is_empty() => {
                Err("Series cannot be blank".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Resolve the owner key scoping an invoice sequence
///
/// Prefers a non-empty owner id, then a slug of the owner name, then the
/// generic key.
pub fn owner_key(owner_id: Option<&str>, owner_name: Option<&str>) -> String {
    if let Some(id) = owner_id.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    if let Some(slug) = owner_name.map(slugify).filter(|s| !s.is_empty()) {
        return format!("name:{}", slug);
    }

    GENERIC_OWNER_KEY.to_string()
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase).map(fold_diacritic) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn fold_diacritic(c: char) -> char {
    match c {
        'ă' | 'â' | 'á' | 'à' | 'ä' | 'ã' | 'å' => 'a',
        'î' | 'í' | 'ì' | 'ï' => 'i',
        'ș' | 'ş' | 'ś' | 'š' => 's',
        'ț' | 'ţ' => 't',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ő' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'ű' => 'u',
        'ç' | 'č' | 'ć' => 'c',
        'ñ' | 'ń' => 'n',
        'ž' | 'ź' | 'ż' => 'z',
        other => other,
    }
}
