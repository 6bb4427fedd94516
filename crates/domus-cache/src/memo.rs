//! Shared memo of the last fetched exchange rate per source

use async_trait::async_trait;
use domus_core::error::AppError;
use domus_core::models::{CachedRate, RateSource};
use domus_core::traits::{CacheService, RateMemo};
use tracing::debug;

use crate::keys::{last_rate_key, LAST_RATE_TTL_SECS};
use crate::RedisCache;

/// `RateMemo` stored in a `CacheService`
pub struct CachedRateMemo<C> {
    cache: C,
    ttl_secs: u64,
}

/// Rate memo shared through Redis
pub type RedisRateMemo = CachedRateMemo<RedisCache>;

impl<C: CacheService> CachedRateMemo<C> {
    pub fn new(cache: C) -> Self {
        Self::with_ttl(cache, LAST_RATE_TTL_SECS)
    }

    pub fn with_ttl(cache: C, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }
}

#[async_trait]
impl<C: CacheService> RateMemo for CachedRateMemo<C> {
    async fn get(&self, source: RateSource) -> Result<Option<CachedRate>, AppError> {
        self.cache.get(&last_rate_key(source)).await
    }

    async fn set(&self, source: RateSource, rate: CachedRate) -> Result<(), AppError> {
        debug!("Remembering {} rate {} for {}", source, rate.rate, rate.date);
        self.cache
            .set(&last_rate_key(source), &rate, self.ttl_secs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde::{de::DeserializeOwned, Serialize};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory cache recording the TTL of each write
    #[derive(Default)]
    struct MockCache {
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    #[async_trait]
    impl CacheService for MockCache {
        async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
            let entries = self.entries.lock().unwrap();
            match entries.get(key) {
                Some((json, _)) => Ok(Some(serde_json::from_str(json)?)),
                None => Ok(None),
            }
        }

        async fn set<T: Serialize + Send + Sync>(
            &self,
            key: &str,
            value: &T,
            ttl_secs: u64,
        ) -> Result<(), AppError> {
            let json = serde_json::to_string(value)?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (json, ttl_secs));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_memo_round_trip_per_source() {
        let memo = CachedRateMemo::new(MockCache::default());
        let rate = CachedRate {
            rate: dec!(4.9771),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        };

        assert_eq!(memo.get(RateSource::Bnr).await.unwrap(), None);

        memo.set(RateSource::Bnr, rate).await.unwrap();
        assert_eq!(memo.get(RateSource::Bnr).await.unwrap(), Some(rate));
        assert_eq!(memo.get(RateSource::Bt).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memo_writes_with_ttl() {
        let memo = CachedRateMemo::with_ttl(MockCache::default(), 120);
        let rate = CachedRate {
            rate: dec!(5.01),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        };

        memo.set(RateSource::Bcr, rate).await.unwrap();

        let entries = memo.cache.entries.lock().unwrap();
        let (_, ttl) = entries.get("exchange_rate:last:bcr").unwrap();
        assert_eq!(*ttl, 120);
    }
}
