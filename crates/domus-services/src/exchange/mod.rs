//! Exchange rate resolution
//!
//! A rate request walks an ordered chain of tiers and returns the first
//! value found, tagged with the tier that produced it:
//!
//! 1. today's persisted value (`db`), skipped on forced refresh
//! 2. a live upstream fetch, persisted on success (tagged with the source)
//! 3. the most recent persisted value of any day (`db-stale`)
//! 4. the last value fetched by this deployment (`cache`)
//! 5. the configured default rate (`default`)
//!
//! Tier failures are logged and fall through; callers only see an error if
//! even the default is unusable.

mod fetcher;
mod memo;

pub use fetcher::{FetchError, HttpRateFetcher, RateFetcher};
pub use memo::MemoryRateMemo;

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use domus_core::{
    config::ExchangeConfig,
    models::{CachedRate, ExchangeRateRecord, Provenance, RateSource, ResolvedRate},
    traits::{ExchangeRateRepository, RateMemo},
    AppError, AppResult,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::constants::{AMOUNT_DP, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};

/// Fallback tiers in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Today,
    Live,
    Stale,
    Memo,
    Default,
}

impl Tier {
    const ORDER: [Tier; 5] = [Tier::Today, Tier::Live, Tier::Stale, Tier::Memo, Tier::Default];
}

/// An amount converted from EUR
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Conversion {
    pub amount_eur: Decimal,
    /// Converted amount, 2 decimal places
    pub amount: Decimal,
    pub rate: ResolvedRate,
}

/// Resolves EUR rates per source through the tier chain
pub struct ExchangeRateResolver {
    repo: Arc<dyn ExchangeRateRepository>,
    fetcher: Arc<dyn RateFetcher>,
    memo: Arc<dyn RateMemo>,
    default_rate: Option<Decimal>,
    timeout: Duration,
    tz: Tz,
}

impl ExchangeRateResolver {
    pub fn new(
        repo: Arc<dyn ExchangeRateRepository>,
        fetcher: Arc<dyn RateFetcher>,
        memo: Arc<dyn RateMemo>,
        config: &ExchangeConfig,
        tz: Tz,
    ) -> Self {
        let default_rate = Decimal::try_from(config.default_rate)
            .ok()
            .filter(|rate| *rate > Decimal::ZERO)
            .map(|rate| rate.normalize());

        if default_rate.is_none() {
            warn!(
                "Configured default exchange rate {} is unusable",
                config.default_rate
            );
        }

        Self {
            repo,
            fetcher,
            memo,
            default_rate,
            timeout: Duration::from_secs(config.timeout_secs),
            tz,
        }
    }

    /// Current day in the configured timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Resolve the rate of one source
    #[instrument(skip(self))]
    pub async fn get_rate(&self, source: RateSource, force_refresh: bool) -> AppResult<ResolvedRate> {
        let today = self.today();

        for tier in Tier::ORDER {
            if force_refresh && tier == Tier::Today {
                continue;
            }
            if let Some(resolved) = self.try_tier(tier, source, today).await {
                debug!(
                    "Resolved {} rate {} ({})",
                    source, resolved.rate, resolved.provenance
                );
                return Ok(resolved);
            }
        }

        Err(AppError::RateUnavailable(source.to_string()))
    }

    /// Resolve every source concurrently, in [`RateSource::ALL`] order
    #[instrument(skip(self))]
    pub async fn get_all_rates(&self, force_refresh: bool) -> AppResult<Vec<ResolvedRate>> {
        let lookups = RateSource::ALL
            .iter()
            .map(|source| self.get_rate(*source, force_refresh));

        futures::future::join_all(lookups)
            .await
            .into_iter()
            .collect()
    }

    /// Persisted records of a source, newest first
    pub async fn history(
        &self,
        source: RateSource,
        limit: Option<i64>,
    ) -> AppResult<Vec<ExchangeRateRecord>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.repo.history(source.as_str(), limit).await
    }

    /// Convert a EUR amount with the resolved rate of `source`
    pub async fn convert(
        &self,
        amount_eur: Decimal,
        source: RateSource,
        force_refresh: bool,
    ) -> AppResult<Conversion> {
        let rate = self.get_rate(source, force_refresh).await?;
        let amount = amount_eur
            .checked_mul(rate.rate)
            .ok_or_else(|| {
                AppError::Validation(format!("Converted amount of {} EUR is out of range", amount_eur))
            })?
            .round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::MidpointAwayFromZero);

        Ok(Conversion {
            amount_eur,
            amount,
            rate,
        })
    }

    async fn try_tier(
        &self,
        tier: Tier,
        source: RateSource,
        today: NaiveDate,
    ) -> Option<ResolvedRate> {
        match tier {
            Tier::Today => match self.repo.find_for_date(source.as_str(), today).await {
                Ok(found) => found.map(|record| resolved(source, &record, Provenance::Db)),
                Err(e) => {
                    warn!("Could not read today's {} rate: {}", source, e);
                    None
                }
            },
            Tier::Live => self.fetch_live(source, today).await,
            Tier::Stale => match self.repo.find_latest(source.as_str()).await {
                Ok(found) => found.map(|record| resolved(source, &record, Provenance::DbStale)),
                Err(e) => {
                    warn!("Could not read latest {} rate: {}", source, e);
                    None
                }
            },
            Tier::Memo => match self.memo.get(source).await {
                Ok(found) => found.map(|cached| ResolvedRate {
                    source,
                    rate: cached.rate,
                    date: cached.date,
                    provenance: Provenance::Cache,
                }),
                Err(e) => {
                    warn!("Could not read remembered {} rate: {}", source, e);
                    None
                }
            },
            Tier::Default => self.default_rate.map(|rate| {
                warn!("Using default {} rate {}", source, rate);
                ResolvedRate {
                    source,
                    rate,
                    date: today,
                    provenance: Provenance::Default,
                }
            }),
        }
    }

    async fn fetch_live(&self, source: RateSource, today: NaiveDate) -> Option<ResolvedRate> {
        let rate = match tokio::time::timeout(self.timeout, self.fetcher.fetch(source)).await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                warn!("Fetching {} rate failed: {}", source, e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Fetching {} rate timed out after {}s",
                    source,
                    self.timeout.as_secs()
                );
                return None;
            }
        };

        info!("Fetched {} rate {} for {}", source, rate, today);

        let record = ExchangeRateRecord::new(source, today, rate);
        if let Err(e) = self.repo.upsert(&record).await {
            warn!("Could not persist {} rate: {}", source, e);
        }
        if let Err(e) = self.memo.set(source, CachedRate { rate, date: today }).await {
            warn!("Could not remember {} rate: {}", source, e);
        }

        Some(ResolvedRate {
            source,
            rate,
            date: today,
            provenance: Provenance::Live(source),
        })
    }
}

fn resolved(source: RateSource, record: &ExchangeRateRecord, provenance: Provenance) -> ResolvedRate {
    ResolvedRate {
        source,
        rate: record.rate,
        date: record.date,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockRateRepository {
        records: Mutex<Vec<ExchangeRateRecord>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    #[async_trait]
    impl ExchangeRateRepository for MockRateRepository {
        async fn find_for_date(
            &self,
            key: &str,
            date: NaiveDate,
        ) -> AppResult<Option<ExchangeRateRecord>> {
            if self.fail_reads {
                return Err(AppError::Database("down".to_string()));
            }
            Ok(self
                .records
                .lock()
                .iter()
                .find(|r| r.key == key && r.date == date)
                .cloned())
        }

        async fn find_latest(&self, key: &str) -> AppResult<Option<ExchangeRateRecord>> {
            if self.fail_reads {
                return Err(AppError::Database("down".to_string()));
            }
            Ok(self
                .records
                .lock()
                .iter()
                .filter(|r| r.key == key)
                .max_by_key(|r| r.date)
                .cloned())
        }

        async fn upsert(&self, record: &ExchangeRateRecord) -> AppResult<ExchangeRateRecord> {
            if self.fail_writes {
                return Err(AppError::Database("read-only".to_string()));
            }
            let mut records = self.records.lock();
            records.retain(|r| !(r.key == record.key && r.date == record.date));
            records.push(record.clone());
            Ok(record.clone())
        }

        async fn history(&self, key: &str, limit: i64) -> AppResult<Vec<ExchangeRateRecord>> {
            let mut matching: Vec<_> = self
                .records
                .lock()
                .iter()
                .filter(|r| r.key == key)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.date.cmp(&a.date));
            matching.truncate(limit as usize);
            Ok(matching)
        }
    }

    enum Behaviour {
        Rate(Decimal),
        Fail,
        Hang,
    }

    struct MockFetcher {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateFetcher for MockFetcher {
        async fn fetch(&self, _source: RateSource) -> Result<Decimal, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Rate(rate) => Ok(rate),
                Behaviour::Fail => Err(FetchError::HttpError(503)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(FetchError::Timeout(3600))
                }
            }
        }
    }

    struct Fixture {
        repo: Arc<MockRateRepository>,
        fetcher: Arc<MockFetcher>,
        memo: Arc<MemoryRateMemo>,
        resolver: ExchangeRateResolver,
    }

    fn fixture(repo: MockRateRepository, behaviour: Behaviour) -> Fixture {
        let repo = Arc::new(repo);
        let fetcher = Arc::new(MockFetcher::new(behaviour));
        let memo = Arc::new(MemoryRateMemo::new());
        let config = ExchangeConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let resolver = ExchangeRateResolver::new(
            repo.clone(),
            fetcher.clone(),
            memo.clone(),
            &config,
            chrono_tz::Europe::Bucharest,
        );
        Fixture {
            repo,
            fetcher,
            memo,
            resolver,
        }
    }

    fn record(source: RateSource, date: NaiveDate, rate: Decimal) -> ExchangeRateRecord {
        ExchangeRateRecord::new(source, date, rate)
    }

    #[tokio::test]
    async fn test_todays_record_is_served_without_fetching() {
        let f = fixture(MockRateRepository::default(), Behaviour::Rate(dec!(5.10)));
        let today = f.resolver.today();
        f.repo
            .records
            .lock()
            .push(record(RateSource::Bnr, today, dec!(4.97)));

        let resolved = f.resolver.get_rate(RateSource::Bnr, false).await.unwrap();

        assert_eq!(resolved.rate, dec!(4.97));
        assert_eq!(resolved.provenance, Provenance::Db);
        assert_eq!(f.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_live_fetch_is_persisted_and_then_served_from_db() {
        let f = fixture(MockRateRepository::default(), Behaviour::Rate(dec!(4.9771)));

        let first = f.resolver.get_rate(RateSource::Bnr, false).await.unwrap();
        assert_eq!(first.provenance, Provenance::Live(RateSource::Bnr));
        assert_eq!(first.provenance.as_str(), "bnr");
        assert_eq!(first.date, f.resolver.today());
        assert_eq!(f.repo.records.lock().len(), 1);

        let second = f.resolver.get_rate(RateSource::Bnr, false).await.unwrap();
        assert_eq!(second.provenance, Provenance::Db);
        assert_eq!(second.rate, dec!(4.9771));
        assert_eq!(f.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_skips_todays_record() {
        let f = fixture(MockRateRepository::default(), Behaviour::Rate(dec!(5.01)));
        let today = f.resolver.today();
        f.repo
            .records
            .lock()
            .push(record(RateSource::Bt, today, dec!(4.90)));

        let resolved = f.resolver.get_rate(RateSource::Bt, true).await.unwrap();

        assert_eq!(resolved.provenance, Provenance::Live(RateSource::Bt));
        assert_eq!(resolved.rate, dec!(5.01));

        let stored = f.repo.records.lock().clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rate, dec!(5.01));
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_latest_record() {
        let f = fixture(MockRateRepository::default(), Behaviour::Fail);
        let last_week = f.resolver.today() - chrono::Duration::days(7);
        let yesterday = f.resolver.today() - chrono::Duration::days(1);
        {
            let mut records = f.repo.records.lock();
            records.push(record(RateSource::Bcr, last_week, dec!(4.95)));
            records.push(record(RateSource::Bcr, yesterday, dec!(4.96)));
            records.push(record(RateSource::Bnr, yesterday, dec!(4.99)));
        }

        let resolved = f.resolver.get_rate(RateSource::Bcr, false).await.unwrap();

        assert_eq!(resolved.provenance, Provenance::DbStale);
        assert_eq!(resolved.rate, dec!(4.96));
        assert_eq!(resolved.date, yesterday);
    }

    #[tokio::test]
    async fn test_memo_then_default_when_store_is_down() {
        let repo = MockRateRepository {
            fail_reads: true,
            ..Default::default()
        };
        let f = fixture(repo, Behaviour::Fail);

        let fallback = f.resolver.get_rate(RateSource::Bnr, false).await.unwrap();
        assert_eq!(fallback.provenance, Provenance::Default);
        assert_eq!(fallback.rate, dec!(5));

        let remembered = CachedRate {
            rate: dec!(4.98),
            date: f.resolver.today() - chrono::Duration::days(2),
        };
        f.memo.set(RateSource::Bnr, remembered).await.unwrap();

        let cached = f.resolver.get_rate(RateSource::Bnr, false).await.unwrap();
        assert_eq!(cached.provenance, Provenance::Cache);
        assert_eq!(cached.rate, dec!(4.98));
        assert_eq!(cached.date, remembered.date);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_fetched_rate() {
        let repo = MockRateRepository {
            fail_writes: true,
            ..Default::default()
        };
        let f = fixture(repo, Behaviour::Rate(dec!(4.97)));

        let resolved = f.resolver.get_rate(RateSource::Bnr, false).await.unwrap();
        assert_eq!(resolved.provenance, Provenance::Live(RateSource::Bnr));
        assert!(f.repo.records.lock().is_empty());

        let remembered = f.memo.get(RateSource::Bnr).await.unwrap().unwrap();
        assert_eq!(remembered.rate, dec!(4.97));
    }

    #[tokio::test]
    async fn test_hung_upstream_is_bounded_by_timeout() {
        let f = fixture(MockRateRepository::default(), Behaviour::Hang);

        let started = std::time::Instant::now();
        let resolved = f.resolver.get_rate(RateSource::Bt, false).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(resolved.provenance, Provenance::Default);
    }

    #[tokio::test]
    async fn test_unusable_default_exhausts_the_chain() {
        let repo = Arc::new(MockRateRepository::default());
        let config = ExchangeConfig {
            default_rate: 0.0,
            ..Default::default()
        };
        let resolver = ExchangeRateResolver::new(
            repo,
            Arc::new(MockFetcher::new(Behaviour::Fail)),
            Arc::new(MemoryRateMemo::new()),
            &config,
            chrono_tz::UTC,
        );

        assert!(matches!(
            resolver.get_rate(RateSource::Bnr, false).await,
            Err(AppError::RateUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_get_all_rates_resolves_every_source() {
        let f = fixture(MockRateRepository::default(), Behaviour::Rate(dec!(4.97)));

        let rates = f.resolver.get_all_rates(false).await.unwrap();

        let sources: Vec<RateSource> = rates.iter().map(|r| r.source).collect();
        assert_eq!(sources, RateSource::ALL.to_vec());
        assert_eq!(f.fetcher.calls(), 3);
        assert_eq!(f.repo.records.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_convert_rounds_to_cents() {
        let f = fixture(MockRateRepository::default(), Behaviour::Rate(dec!(4.9771)));

        let conversion = f
            .resolver
            .convert(dec!(1234.56), RateSource::Bnr, false)
            .await
            .unwrap();

        assert_eq!(conversion.amount, dec!(6144.53));
        assert_eq!(conversion.rate.rate, dec!(4.9771));
    }

    #[tokio::test]
    async fn test_convert_out_of_range_amount() {
        let f = fixture(MockRateRepository::default(), Behaviour::Rate(dec!(4.9771)));

        let result = f.resolver.convert(Decimal::MAX, RateSource::Bnr, false).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped() {
        let f = fixture(MockRateRepository::default(), Behaviour::Fail);
        let today = f.resolver.today();
        for days in 0..5 {
            f.repo.records.lock().push(record(
                RateSource::Bnr,
                today - chrono::Duration::days(days),
                dec!(4.97),
            ));
        }

        assert_eq!(f.resolver.history(RateSource::Bnr, Some(2)).await.unwrap().len(), 2);
        assert_eq!(f.resolver.history(RateSource::Bnr, Some(0)).await.unwrap().len(), 1);
        assert_eq!(f.resolver.history(RateSource::Bnr, None).await.unwrap().len(), 5);
    }
}
