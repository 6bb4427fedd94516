//! JSON-file store
//!
//! Keeps every collection in its own JSON file under a data directory.
//! Files are read and written wholesale; a write goes to a temporary file
//! that is then renamed over the target, so readers never see a partial
//! document. All operations run under one async mutex, which makes
//! read-modify-write cycles (notably sequence increments) atomic within
//! this process. Several processes sharing a data directory are not
//! coordinated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use domus_core::{
    models::{
        Contract, ExchangeRateRecord, HicpValue, Invoice, InvoiceSequence, IssuedNumber,
        NewContract, SequenceDefaults, SequenceSettingsUpdate, YearMonth,
    },
    traits::{
        ContractRepository, ExchangeRateRepository, HicpRepository, InvoiceRepository,
        InvoiceSequenceRepository,
    },
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};
use uuid::Uuid;

const SEQUENCES_FILE: &str = "invoice_settings.json";
const EXCHANGE_RATES_FILE: &str = "exchange_rates.json";
const CONTRACTS_FILE: &str = "contracts.json";
const INVOICES_FILE: &str = "invoices.json";
const HICP_FILE: &str = "hicp_values.json";

type Sequences = BTreeMap<String, InvoiceSequence>;

/// Repositories persisted as JSON documents in a local directory
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Data directory of this store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<C>(&self, file: &str) -> AppResult<C>
    where
        C: DeserializeOwned + Default,
    {
        let path = self.dir.join(file);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(C::default()),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(C::default());
        }

        // A corrupt document is an error rather than an empty collection:
        // silently resetting would reissue invoice numbers.
        serde_json::from_slice(&raw).map_err(|e| {
            error!("Failed to parse {}: {}", path.display(), e);
            AppError::Storage(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    async fn write<C>(&self, file: &str, collection: &C) -> AppResult<()>
    where
        C: Serialize,
    {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to prepare data directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let payload = serde_json::to_vec_pretty(collection)?;
        let path = self.dir.join(file);
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        tokio::fs::write(&temp_path, payload).await.map_err(|e| {
            error!("Failed to write {}: {}", temp_path.display(), e);
            AppError::Storage(format!("Failed to write {}: {}", file, e))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            error!("Failed to replace {}: {}", path.display(), e);
            return Err(AppError::Storage(format!("Failed to replace {}: {}", file, e)));
        }

        Ok(())
    }

    /// Read a collection under the store lock
    async fn view<C, T, F>(&self, file: &str, op: F) -> AppResult<T>
    where
        C: DeserializeOwned + Default,
        F: FnOnce(&C) -> T,
    {
        let _guard = self.lock.lock().await;
        let collection = self.read::<C>(file).await?;
        Ok(op(&collection))
    }

    /// Read, modify and write back a collection under the store lock
    ///
    /// Nothing is written when `op` fails.
    async fn mutate<C, T, F>(&self, file: &str, op: F) -> AppResult<T>
    where
        C: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut C) -> AppResult<T>,
    {
        let _guard = self.lock.lock().await;
        let mut collection = self.read::<C>(file).await?;
        let result = op(&mut collection)?;
        self.write(file, &collection).await?;
        Ok(result)
    }
}

#[async_trait]
impl InvoiceSequenceRepository for JsonFileStore {
    #[instrument(skip(self, defaults))]
    async fn increment(
        &self,
        owner_key: &str,
        defaults: &SequenceDefaults,
    ) -> AppResult<IssuedNumber> {
        debug!("Incrementing file sequence for {}", owner_key);

        self.mutate::<Sequences, _, _>(SEQUENCES_FILE, |sequences| {
            let sequence = sequences
                .entry(owner_key.to_string())
                .or_insert_with(|| InvoiceSequence::new(owner_key, defaults));

            let number = sequence.next_number;
            sequence.next_number += 1;
            sequence.updated_at = Utc::now();

            Ok(IssuedNumber {
                sequence: sequence.clone(),
                number,
            })
        })
        .await
    }

    async fn find(&self, owner_key: &str) -> AppResult<Option<InvoiceSequence>> {
        self.view::<Sequences, _, _>(SEQUENCES_FILE, |sequences| {
            sequences.get(owner_key).cloned()
        })
        .await
    }

    #[instrument(skip(self, defaults, update))]
    async fn update_settings(
        &self,
        owner_key: &str,
        defaults: &SequenceDefaults,
        update: &SequenceSettingsUpdate,
    ) -> AppResult<InvoiceSequence> {
        self.mutate::<Sequences, _, _>(SEQUENCES_FILE, |sequences| {
            let mut sequence = sequences
                .get(owner_key)
                .cloned()
                .unwrap_or_else(|| InvoiceSequence::new(owner_key, defaults));

            sequence.apply(update).map_err(AppError::Conflict)?;
            sequences.insert(owner_key.to_string(), sequence.clone());
            Ok(sequence)
        })
        .await
    }
}

#[async_trait]
impl ExchangeRateRepository for JsonFileStore {
    async fn find_for_date(
        &self,
        key: &str,
        date: NaiveDate,
    ) -> AppResult<Option<ExchangeRateRecord>> {
        self.view::<Vec<ExchangeRateRecord>, _, _>(EXCHANGE_RATES_FILE, |records| {
            records
                .iter()
                .find(|r| r.key == key && r.date == date)
                .cloned()
        })
        .await
    }

    async fn find_latest(&self, key: &str) -> AppResult<Option<ExchangeRateRecord>> {
        self.view::<Vec<ExchangeRateRecord>, _, _>(EXCHANGE_RATES_FILE, |records| {
            records
                .iter()
                .filter(|r| r.key == key)
                .max_by_key(|r| r.date)
                .cloned()
        })
        .await
    }

    #[instrument(skip(self, record), fields(key = %record.key, date = %record.date))]
    async fn upsert(&self, record: &ExchangeRateRecord) -> AppResult<ExchangeRateRecord> {
        self.mutate::<Vec<ExchangeRateRecord>, _, _>(EXCHANGE_RATES_FILE, |records| {
            match records
                .iter_mut()
                .find(|r| r.key == record.key && r.date == record.date)
            {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
            Ok(record.clone())
        })
        .await
    }

    async fn history(&self, key: &str, limit: i64) -> AppResult<Vec<ExchangeRateRecord>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        self.view::<Vec<ExchangeRateRecord>, _, _>(EXCHANGE_RATES_FILE, |records| {
            let mut matching: Vec<_> = records.iter().filter(|r| r.key == key).cloned().collect();
            matching.sort_by(|a, b| b.date.cmp(&a.date));
            matching.truncate(limit);
            matching
        })
        .await
    }
}

#[async_trait]
impl ContractRepository for JsonFileStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Contract>> {
        self.view::<Vec<Contract>, _, _>(CONTRACTS_FILE, |contracts| {
            contracts.iter().find(|c| c.id == id).cloned()
        })
        .await
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<(Vec<Contract>, i64)> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);

        self.view::<Vec<Contract>, _, _>(CONTRACTS_FILE, |contracts| {
            let mut sorted: Vec<&Contract> = contracts.iter().collect();
            sorted.sort_by_key(|c| c.id);
            let page = sorted
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect();
            (page, contracts.len() as i64)
        })
        .await
    }

    #[instrument(skip(self, contract), fields(number = %contract.number))]
    async fn create(&self, contract: &NewContract) -> AppResult<Contract> {
        self.mutate::<Vec<Contract>, _, _>(CONTRACTS_FILE, |contracts| {
            let number = contract.number.trim();
            if contracts.iter().any(|c| c.number == number) {
                return Err(AppError::AlreadyExists(format!(
                    "Contract {} already exists",
                    number
                )));
            }

            let id = contracts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
            let created = contract.clone().into_contract(id);
            contracts.push(created.clone());
            Ok(created)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn update_rent(
        &self,
        id: i64,
        rent_amount: Decimal,
        indexation_base: YearMonth,
    ) -> AppResult<Contract> {
        self.mutate::<Vec<Contract>, _, _>(CONTRACTS_FILE, |contracts| {
            let contract = contracts
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| AppError::ContractNotFound(id.to_string()))?;

            contract.rent_amount = rent_amount;
            contract.indexation_base = Some(indexation_base);
            contract.updated_at = Utc::now();
            Ok(contract.clone())
        })
        .await
    }
}

#[async_trait]
impl InvoiceRepository for JsonFileStore {
    #[instrument(skip(self, invoice), fields(number = %invoice.number))]
    async fn create(&self, invoice: &Invoice) -> AppResult<Invoice> {
        self.mutate::<Vec<Invoice>, _, _>(INVOICES_FILE, |invoices| {
            if invoices
                .iter()
                .any(|i| i.owner_key == invoice.owner_key && i.number == invoice.number)
            {
                return Err(AppError::AlreadyExists(format!(
                    "Invoice {} already exists for {}",
                    invoice.number, invoice.owner_key
                )));
            }
            invoices.push(invoice.clone());
            Ok(invoice.clone())
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        self.view::<Vec<Invoice>, _, _>(INVOICES_FILE, |invoices| {
            invoices.iter().find(|i| i.id == id).cloned()
        })
        .await
    }

    async fn list_for_contract(&self, contract_id: i64) -> AppResult<Vec<Invoice>> {
        self.view::<Vec<Invoice>, _, _>(INVOICES_FILE, |invoices| {
            let mut matching: Vec<Invoice> = invoices
                .iter()
                .filter(|i| i.contract_id == contract_id)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            matching
        })
        .await
    }
}

#[async_trait]
impl HicpRepository for JsonFileStore {
    #[instrument(skip(self, values))]
    async fn upsert_many(&self, values: &[HicpValue]) -> AppResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }

        self.mutate::<Vec<HicpValue>, _, _>(HICP_FILE, |stored| {
            for value in values {
                match stored
                    .iter_mut()
                    .find(|v| v.year == value.year && v.month == value.month)
                {
                    Some(existing) => existing.value = value.value,
                    None => stored.push(*value),
                }
            }
            stored.sort_by_key(|v| (v.year, v.month));
            Ok(values.len())
        })
        .await
    }

    async fn find(&self, period: YearMonth) -> AppResult<Option<HicpValue>> {
        self.view::<Vec<HicpValue>, _, _>(HICP_FILE, |stored| {
            stored
                .iter()
                .find(|v| v.year == period.year && v.month == period.month)
                .copied()
        })
        .await
    }

    async fn list(&self, from_year: i32, to_year: i32) -> AppResult<Vec<HicpValue>> {
        self.view::<Vec<HicpValue>, _, _>(HICP_FILE, |stored| {
            let mut matching: Vec<HicpValue> = stored
                .iter()
                .filter(|v| (from_year..=to_year).contains(&v.year))
                .copied()
                .collect();
            matching.sort_by_key(|v| (v.year, v.month));
            matching
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domus_core::models::{InvoiceMode, RateSource, RentType};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn new_contract(number: &str) -> NewContract {
        NewContract {
            number: number.to_string(),
            owner_id: Some("owner-1".to_string()),
            owner_name: None,
            partner_name: "Tenant SRL".to_string(),
            rent_amount: dec!(1200),
            currency: "eur".to_string(),
            rent_type: RentType::Monthly,
            invoice_mode: InvoiceMode::NextMonth,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            extended_until: None,
            indexation_base: None,
        }
    }

    #[tokio::test]
    async fn test_increment_creates_and_persists_sequence() {
        let dir = tempdir().unwrap();
        let defaults = SequenceDefaults::default();

        let store = JsonFileStore::new(dir.path());
        assert_eq!(store.increment("owner-1", &defaults).await.unwrap().number, 1);
        assert_eq!(store.increment("owner-1", &defaults).await.unwrap().number, 2);
        assert_eq!(store.increment("owner-2", &defaults).await.unwrap().number, 1);

        let reopened = JsonFileStore::new(dir.path());
        let issued = reopened.increment("owner-1", &defaults).await.unwrap();
        assert_eq!(issued.number, 3);
        assert_eq!(issued.sequence.next_number, 4);
        assert_eq!(issued.sequence.series, "MS");
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_contiguous() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let defaults = SequenceDefaults::default();

        let tasks = (0..50).map(|_| {
            let store = store.clone();
            let defaults = defaults.clone();
            async move { store.increment("shared", &defaults).await.unwrap().number }
        });
        let mut numbers = futures::future::join_all(tasks).await;
        numbers.sort_unstable();

        assert_eq!(numbers, (1..=50).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_update_settings_is_forward_only() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let defaults = SequenceDefaults::default();

        store.increment("owner-1", &defaults).await.unwrap();
        store.increment("owner-1", &defaults).await.unwrap();

        let backwards = SequenceSettingsUpdate {
            next_number: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            store.update_settings("owner-1", &defaults, &backwards).await,
            Err(AppError::Conflict(_))
        ));

        let forward = SequenceSettingsUpdate {
            series: Some("AB".to_string()),
            next_number: Some(100),
            include_year: Some(false),
            ..Default::default()
        };
        let updated = store
            .update_settings("owner-1", &defaults, &forward)
            .await
            .unwrap();
        assert_eq!(updated.next_number, 100);
        assert_eq!(updated.series, "AB");

        let issued = store.increment("owner-1", &defaults).await.unwrap();
        assert_eq!(issued.number, 100);
        assert!(!issued.sequence.include_year);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SEQUENCES_FILE), b"{not json").unwrap();

        let store = JsonFileStore::new(dir.path());
        let result = store.increment("owner-1", &SequenceDefaults::default()).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_writes_leave_no_temporary_files() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        store
            .increment("owner-1", &SequenceDefaults::default())
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SEQUENCES_FILE.to_string()]);
    }

    #[tokio::test]
    async fn test_exchange_rate_upsert_and_history() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let day1 = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();

        store
            .upsert(&ExchangeRateRecord::new(RateSource::Bnr, day1, dec!(4.97)))
            .await
            .unwrap();
        store
            .upsert(&ExchangeRateRecord::new(RateSource::Bnr, day2, dec!(4.98)))
            .await
            .unwrap();
        store
            .upsert(&ExchangeRateRecord::new(RateSource::Bnr, day2, dec!(4.99)))
            .await
            .unwrap();

        let today = store.find_for_date("bnr", day2).await.unwrap().unwrap();
        assert_eq!(today.rate, dec!(4.99));

        let latest = store.find_latest("bnr").await.unwrap().unwrap();
        assert_eq!(latest.date, day2);
        assert!(store.find_latest("bt").await.unwrap().is_none());

        let history = store.history("bnr", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, day2);
        assert_eq!(store.history("bnr", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_contract_lifecycle() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let first = ContractRepository::create(&store, &new_contract("C-1"))
            .await
            .unwrap();
        let second = ContractRepository::create(&store, &new_contract("C-2"))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.currency, "EUR");

        let duplicate = ContractRepository::create(&store, &new_contract("C-1")).await;
        assert!(matches!(duplicate, Err(AppError::AlreadyExists(_))));

        let (page, total) = ContractRepository::list(&store, 1, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].number, "C-2");

        let base = YearMonth::new(2025, 1).unwrap();
        let updated = store.update_rent(1, dec!(1260), base).await.unwrap();
        assert_eq!(updated.rent_amount, dec!(1260));
        assert_eq!(updated.indexation_base, Some(base));

        assert!(matches!(
            store.update_rent(99, dec!(1), base).await,
            Err(AppError::ContractNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hicp_upsert_overwrites_and_lists_in_order() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let written = store
            .upsert_many(&[
                HicpValue { year: 2024, month: 2, value: dec!(121.0) },
                HicpValue { year: 2024, month: 1, value: dec!(120.0) },
                HicpValue { year: 2023, month: 12, value: dec!(119.0) },
            ])
            .await
            .unwrap();
        assert_eq!(written, 3);

        store
            .upsert_many(&[HicpValue { year: 2024, month: 1, value: dec!(120.5) }])
            .await
            .unwrap();

        let jan = HicpRepository::find(&store, YearMonth::new(2024, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(jan.unwrap().value, dec!(120.5));

        let listed = HicpRepository::list(&store, 2024, 2024).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].month, 1);
    }
}
