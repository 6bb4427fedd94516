//! Exchange rate models
//!
//! EUR to local currency rates resolved from an official and two commercial
//! bank sources.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Upstream rate source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Official central bank reference rate
    Bnr,
    /// Commercial bank rate (BCR)
    Bcr,
    /// Commercial bank rate (Banca Transilvania)
    Bt,
}

impl RateSource {
    pub const ALL: [RateSource; 3] = [RateSource::Bnr, RateSource::Bcr, RateSource::Bt];

    /// Persistence key and provenance tag of the source
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Bnr => "bnr",
            RateSource::Bcr => "bcr",
            RateSource::Bt => "bt",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bnr" => Some(RateSource::Bnr),
            "bcr" => Some(RateSource::Bcr),
            "bt" => Some(RateSource::Bt),
            _ => None,
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted daily rate of one source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeRateRecord {
    /// Source identifier (see [`RateSource::as_str`])
    pub key: String,

    /// Day the rate applies to
    pub date: NaiveDate,

    /// EUR to local currency rate, always positive
    pub rate: Decimal,

    /// When the value was fetched upstream
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRateRecord {
    pub fn new(source: RateSource, date: NaiveDate, rate: Decimal) -> Self {
        Self {
            key: source.as_str().to_string(),
            date,
            rate,
            fetched_at: Utc::now(),
        }
    }
}

/// Last value fetched upstream, kept outside the database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CachedRate {
    pub rate: Decimal,
    pub date: NaiveDate,
}

/// Fallback tier that produced a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Today's persisted value
    Db,
    /// Fresh upstream value
    Live(RateSource),
    /// Most recent persisted value of an earlier day
    DbStale,
    /// Last value fetched by this deployment
    Cache,
    /// Configured fallback rate
    Default,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Db => "db",
            Provenance::Live(source) => source.as_str(),
            Provenance::DbStale => "db-stale",
            Provenance::Cache => "cache",
            Provenance::Default => "default",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Provenance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Rate returned by the resolver
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedRate {
    pub source: RateSource,
    pub rate: Decimal,
    pub date: NaiveDate,
    pub provenance: Provenance,
}
