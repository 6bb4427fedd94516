//! Cache key constants and builders for Domus
//!
//! # Key Patterns
//!
//! - `exchange_rate:last:{source}` - Last successfully fetched EUR rate of a source
//!
//! # Example
//!
//! ```
//! use domus_cache::keys;
//! use domus_core::models::RateSource;
//!
//! assert_eq!(keys::last_rate_key(RateSource::Bnr), "exchange_rate:last:bnr");
//! ```

use domus_core::models::RateSource;

/// Prefix for last known exchange rates
///
/// Format: `exchange_rate:last:{source}`
pub const LAST_RATE_PREFIX: &str = "exchange_rate:last";

/// Default TTL for last known rates (7 days)
///
/// Long enough to bridge a weekend or holiday without a published rate.
pub const LAST_RATE_TTL_SECS: u64 = 7 * 24 * 3600;

/// Build the cache key of the last known rate of a source
pub fn last_rate_key(source: RateSource) -> String {
    format!("{}:{}", LAST_RATE_PREFIX, source.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_rate_keys_are_distinct() {
        assert_eq!(last_rate_key(RateSource::Bnr), "exchange_rate:last:bnr");
        assert_eq!(last_rate_key(RateSource::Bcr), "exchange_rate:last:bcr");
        assert_eq!(last_rate_key(RateSource::Bt), "exchange_rate:last:bt");
    }
}
