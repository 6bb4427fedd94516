//! Invoice number allocation
//!
//! Numbers come from the primary store's atomic increment. When the primary
//! store is unreachable, allocation degrades to the local JSON-file counters
//! so invoicing can continue; those counters are only safe within a single
//! process.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use domus_core::{
    config::InvoicingConfig,
    models::{
        owner_key, AllocatedNumber, InvoiceSequence, IssuedNumber, SequenceDefaults,
        SequenceSettingsUpdate,
    },
    traits::InvoiceSequenceRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument, warn};

/// Allocates formatted invoice numbers per owner
pub struct SequenceAllocator {
    primary: Option<Arc<dyn InvoiceSequenceRepository>>,
    fallback: Arc<dyn InvoiceSequenceRepository>,
    defaults: SequenceDefaults,
    tz: Tz,
}

impl SequenceAllocator {
    /// Create an allocator
    ///
    /// Without a primary store every operation goes to `fallback` directly.
    pub fn new(
        primary: Option<Arc<dyn InvoiceSequenceRepository>>,
        fallback: Arc<dyn InvoiceSequenceRepository>,
        defaults: SequenceDefaults,
        tz: Tz,
    ) -> Self {
        Self {
            primary,
            fallback,
            defaults,
            tz,
        }
    }

    pub fn from_config(
        primary: Option<Arc<dyn InvoiceSequenceRepository>>,
        fallback: Arc<dyn InvoiceSequenceRepository>,
        config: &InvoicingConfig,
    ) -> AppResult<Self> {
        Ok(Self::new(
            primary,
            fallback,
            config.sequence_defaults(),
            config.tz()?,
        ))
    }

    /// Current day in the invoicing timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Allocate the next number of the owner identified by id or name
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        owner_id: Option<&str>,
        owner_name: Option<&str>,
    ) -> AppResult<AllocatedNumber> {
        let key = owner_key(owner_id, owner_name);
        let issued = self.increment(&key).await?;
        let year = self.today().year();
        let formatted = issued.sequence.format_number(issued.number, year);

        info!("Allocated invoice number {} for {}", formatted, key);

        Ok(AllocatedNumber {
            owner_key: key,
            number: issued.number,
            year,
            formatted,
        })
    }

    /// Number the next allocation would return, without consuming it
    #[instrument(skip(self))]
    pub async fn peek(&self, owner_key: &str) -> AppResult<AllocatedNumber> {
        let sequence = self.settings(owner_key).await?;
        let year = self.today().year();

        Ok(AllocatedNumber {
            owner_key: sequence.owner_key.clone(),
            number: sequence.next_number,
            year,
            formatted: sequence.format_number(sequence.next_number, year),
        })
    }

    /// Stored settings of an owner, or the defaults a first allocation would use
    #[instrument(skip(self))]
    pub async fn settings(&self, owner_key: &str) -> AppResult<InvoiceSequence> {
        let found = match &self.primary {
            Some(primary) => match primary.find(owner_key).await {
                Ok(found) => found,
                Err(e) if is_store_failure(&e) => {
                    warn!("Primary sequence store unavailable, reading local counters: {}", e);
                    self.fallback.find(owner_key).await?
                }
                Err(e) => return Err(e),
            },
            None => self.fallback.find(owner_key).await?,
        };

        Ok(found.unwrap_or_else(|| InvoiceSequence::new(owner_key, &self.defaults)))
    }

    /// Update the formatting settings of an owner's sequence
    ///
    /// The counter may only move forward; a lower `next_number` is a
    /// conflict. Updates are never redirected to the fallback store, since
    /// settings written there would be lost once the primary recovers.
    #[instrument(skip(self, update))]
    pub async fn update_settings(
        &self,
        owner_key: &str,
        update: &SequenceSettingsUpdate,
    ) -> AppResult<InvoiceSequence> {
        if owner_key.trim().is_empty() {
            return Err(AppError::Validation("Owner key cannot be empty".to_string()));
        }
        update.check_series().map_err(AppError::Validation)?;

        let store = self.primary.as_ref().unwrap_or(&self.fallback);
        let updated = store
            .update_settings(owner_key, &self.defaults, update)
            .await?;

        info!(
            "Updated invoice sequence {}: series={} next={}",
            owner_key, updated.series, updated.next_number
        );
        Ok(updated)
    }

    async fn increment(&self, key: &str) -> AppResult<IssuedNumber> {
        if let Some(primary) = &self.primary {
            match primary.increment(key, &self.defaults).await {
                Ok(issued) => return Ok(issued),
                Err(e) if is_store_failure(&e) => {
                    warn!(
                        "Primary sequence store failed for {}, using local counters: {}",
                        key, e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Incrementing local counter for {}", key);
        self.fallback.increment(key, &self.defaults).await
    }
}

/// Errors that mean the store itself is unavailable
fn is_store_failure(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(_) | AppError::Pool(_) | AppError::Transaction(_) | AppError::Storage(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domus_db::JsonFileStore;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// In-memory store whose increment is a single critical section
    #[derive(Default)]
    struct MockSequenceRepository {
        sequences: Mutex<HashMap<String, InvoiceSequence>>,
        failing: bool,
    }

    impl MockSequenceRepository {
        fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        fn check(&self) -> AppResult<()> {
            if self.failing {
                Err(AppError::Database("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl InvoiceSequenceRepository for MockSequenceRepository {
        async fn increment(
            &self,
            owner_key: &str,
            defaults: &SequenceDefaults,
        ) -> AppResult<IssuedNumber> {
            self.check()?;
            let mut sequences = self.sequences.lock();
            let sequence = sequences
                .entry(owner_key.to_string())
                .or_insert_with(|| InvoiceSequence::new(owner_key, defaults));
            let number = sequence.next_number;
            sequence.next_number += 1;
            Ok(IssuedNumber {
                sequence: sequence.clone(),
                number,
            })
        }

        async fn find(&self, owner_key: &str) -> AppResult<Option<InvoiceSequence>> {
            self.check()?;
            Ok(self.sequences.lock().get(owner_key).cloned())
        }

        async fn update_settings(
            &self,
            owner_key: &str,
            defaults: &SequenceDefaults,
            update: &SequenceSettingsUpdate,
        ) -> AppResult<InvoiceSequence> {
            self.check()?;
            let mut sequences = self.sequences.lock();
            let sequence = sequences
                .entry(owner_key.to_string())
                .or_insert_with(|| InvoiceSequence::new(owner_key, defaults));
            sequence.apply(update).map_err(AppError::Conflict)?;
            Ok(sequence.clone())
        }
    }

    fn allocator(
        primary: Option<Arc<dyn InvoiceSequenceRepository>>,
        fallback: Arc<dyn InvoiceSequenceRepository>,
    ) -> SequenceAllocator {
        SequenceAllocator::new(
            primary,
            fallback,
            SequenceDefaults::default(),
            chrono_tz::Europe::Bucharest,
        )
    }

    #[tokio::test]
    async fn test_allocate_formats_with_year_and_padding() {
        let primary = Arc::new(MockSequenceRepository::default());
        let allocator = allocator(Some(primary), Arc::new(MockSequenceRepository::default()));
        let year = allocator.today().year();

        let first = allocator.allocate(Some("owner-7"), None).await.unwrap();
        let second = allocator.allocate(Some("owner-7"), None).await.unwrap();

        assert_eq!(first.owner_key, "owner-7");
        assert_eq!(first.formatted, format!("MS-{}-00001", year));
        assert_eq!(second.formatted, format!("MS-{}-00002", year));
    }

    #[tokio::test]
    async fn test_allocate_scopes_by_owner() {
        let allocator = allocator(
            Some(Arc::new(MockSequenceRepository::default())),
            Arc::new(MockSequenceRepository::default()),
        );

        let by_id = allocator.allocate(Some(" 42 "), Some("Ignored")).await.unwrap();
        let by_name = allocator.allocate(None, Some("Ștefan Popescu")).await.unwrap();
        let generic = allocator.allocate(Some("  "), None).await.unwrap();

        assert_eq!(by_id.owner_key, "42");
        assert_eq!(by_name.owner_key, "name:stefan-popescu");
        assert_eq!(generic.owner_key, "default");
        assert_eq!(by_id.number, 1);
        assert_eq!(by_name.number, 1);
        assert_eq!(generic.number, 1);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_contiguous() {
        let allocator = Arc::new(allocator(
            Some(Arc::new(MockSequenceRepository::default())),
            Arc::new(MockSequenceRepository::default()),
        ));

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move {
                    allocator.allocate(Some("busy"), None).await.unwrap().number
                })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();

        assert_eq!(numbers, (1..=40).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_file_store() {
        let dir = tempdir().unwrap();
        let fallback = Arc::new(JsonFileStore::new(dir.path()));
        let allocator = allocator(
            Some(Arc::new(MockSequenceRepository::failing())),
            fallback.clone(),
        );

        let first = allocator.allocate(Some("owner-1"), None).await.unwrap();
        let second = allocator.allocate(Some("owner-1"), None).await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);

        let stored = fallback.find("owner-1").await.unwrap().unwrap();
        assert_eq!(stored.next_number, 3);

        let peeked = allocator.peek("owner-1").await.unwrap();
        assert_eq!(peeked.number, 3);
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let allocator = allocator(None, Arc::new(MockSequenceRepository::default()));

        let peeked = allocator.peek("owner-1").await.unwrap();
        assert_eq!(peeked.number, 1);
        assert_eq!(allocator.peek("owner-1").await.unwrap().number, 1);

        let allocated = allocator.allocate(Some("owner-1"), None).await.unwrap();
        assert_eq!(allocated.formatted, peeked.formatted);
        assert_eq!(allocator.peek("owner-1").await.unwrap().number, 2);
    }

    #[tokio::test]
    async fn test_update_settings_changes_format_and_rejects_rewind() {
        let allocator = allocator(
            Some(Arc::new(MockSequenceRepository::default())),
            Arc::new(MockSequenceRepository::default()),
        );
        allocator.allocate(Some("owner-1"), None).await.unwrap();

        let update = SequenceSettingsUpdate {
            series: Some("RX".to_string()),
            pad_width: Some(3),
            include_year: Some(false),
            next_number: Some(50),
        };
        allocator.update_settings("owner-1", &update).await.unwrap();

        let next = allocator.allocate(Some("owner-1"), None).await.unwrap();
        assert_eq!(next.formatted, "RX-050");

        let rewind = SequenceSettingsUpdate {
            next_number: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            allocator.update_settings("owner-1", &rewind).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_series_is_rejected() {
        let primary = Arc::new(MockSequenceRepository::default());
        let allocator = allocator(Some(primary.clone()), Arc::new(MockSequenceRepository::default()));

        let update = SequenceSettingsUpdate {
            series: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            allocator.update_settings("owner-1", &update).await,
            Err(AppError::Validation(_))
        ));
        assert!(primary.sequences.lock().is_empty());

        let next = allocator.allocate(Some("owner-1"), None).await.unwrap();
        assert!(next.formatted.starts_with("MS-"));
    }

    #[tokio::test]
    async fn test_update_settings_does_not_fall_back() {
        let fallback = Arc::new(MockSequenceRepository::default());
        let allocator = allocator(
            Some(Arc::new(MockSequenceRepository::failing())),
            fallback.clone(),
        );

        let update = SequenceSettingsUpdate {
            series: Some("RX".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            allocator.update_settings("owner-1", &update).await,
            Err(AppError::Database(_))
        ));
        assert!(fallback.sequences.lock().is_empty());
    }
}
