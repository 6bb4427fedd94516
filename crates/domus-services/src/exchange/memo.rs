//! In-process memo of the last fetched rate per source

use std::collections::HashMap;

use async_trait::async_trait;
use domus_core::{
    models::{CachedRate, RateSource},
    traits::RateMemo,
    AppResult,
};
use parking_lot::RwLock;

/// `RateMemo` living for the lifetime of the process
#[derive(Default)]
pub struct MemoryRateMemo {
    rates: RwLock<HashMap<RateSource, CachedRate>>,
}

impl MemoryRateMemo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateMemo for MemoryRateMemo {
    async fn get(&self, source: RateSource) -> AppResult<Option<CachedRate>> {
        Ok(self.rates.read().get(&source).copied())
    }

    async fn set(&self, source: RateSource, rate: CachedRate) -> AppResult<()> {
        self.rates.write().insert(source, rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_last_write_wins_per_source() {
        let memo = MemoryRateMemo::new();
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        memo.set(RateSource::Bt, CachedRate { rate: dec!(4.95), date: day })
            .await
            .unwrap();
        memo.set(RateSource::Bt, CachedRate { rate: dec!(4.96), date: day })
            .await
            .unwrap();

        assert_eq!(memo.get(RateSource::Bt).await.unwrap().unwrap().rate, dec!(4.96));
        assert!(memo.get(RateSource::Bnr).await.unwrap().is_none());
    }
}
