//! Value store interface and the in-process implementation

use std::collections::HashMap;
use std::sync::RwLock;

use log::{info, warn};

use super::record::{ClientRecord, RecordKey};
use crate::schema::Activity;

/// Errors raised by a value store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound { key: RecordKey },
    AlreadyEnrolled { key: RecordKey },
    /// The record changed since the snapshot being saved was read
    StaleWrite {
        key: RecordKey,
        expected: u64,
        actual: u64,
    },
    /// A writer panicked while holding the lock
    Poisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { key } => write!(f, "no record for {}", key),
            StoreError::AlreadyEnrolled { key } => write!(f, "{} is already enrolled", key),
            StoreError::StaleWrite {
                key,
                expected,
                actual,
            } => write!(
                f,
                "stale write for {}: read version {}, stored version is {}",
                key, expected, actual
            ),
            StoreError::Poisoned => write!(f, "value store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence collaborator for client records
///
/// Implementations must reject a save whose `expected_version` no longer
/// matches the stored record.
pub trait ValueStore {
    fn load(&self, key: &RecordKey) -> Result<ClientRecord, StoreError>;

    /// Save `record`, returning the new version
    fn save(&self, record: ClientRecord, expected_version: u64) -> Result<u64, StoreError>;

    /// Create an empty record for a client joining an activity
    fn enroll(&self, key: RecordKey, activity: &Activity) -> Result<ClientRecord, StoreError>;
}

/// Value store kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, ClientRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records, keeping their versions
    pub fn from_records(records: impl IntoIterator<Item = ClientRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.key(), r)).collect();
        MemoryStore {
            records: RwLock::new(records),
        }
    }

    /// Snapshot of every record, ordered by key
    pub fn records(&self) -> Result<Vec<ClientRecord>, StoreError> {
        let guard = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let mut records: Vec<ClientRecord> = guard.values().cloned().collect();
        records.sort_by_key(ClientRecord::key);
        Ok(records)
    }
}

impl ValueStore for MemoryStore {
    fn load(&self, key: &RecordKey) -> Result<ClientRecord, StoreError> {
        let guard = self.records.read().map_err(|_| StoreError::Poisoned)?;
        guard
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound { key: *key })
    }

    fn save(&self, mut record: ClientRecord, expected_version: u64) -> Result<u64, StoreError> {
        let key = record.key();
        let mut guard = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let actual = guard.get(&key).map(|r| r.version).unwrap_or(0);
        if actual != expected_version {
            warn!(
                "Rejected save for {}: expected version {}, found {}",
                key, expected_version, actual
            );
            return Err(StoreError::StaleWrite {
                key,
                expected: expected_version,
                actual,
            });
        }

        record.version = actual + 1;
        let version = record.version;
        guard.insert(key, record);
        info!("Saved {} at version {}", key, version);
        Ok(version)
    }

    fn enroll(&self, key: RecordKey, activity: &Activity) -> Result<ClientRecord, StoreError> {
        let mut guard = self.records.write().map_err(|_| StoreError::Poisoned)?;
        if guard.contains_key(&key) {
            return Err(StoreError::AlreadyEnrolled { key });
        }
        let record = ClientRecord::enroll(key, activity);
        guard.insert(key, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldDefinition, FieldId, PeriodType};

    fn activity() -> Activity {
        let mut layout = PeriodType::standard("Quarterly", 4, 2025).unwrap();
        layout.fields = vec![FieldDefinition::new(FieldId::parse("Saldo").unwrap(), DataType::Decimal)];
        Activity::periodic(5, "Saldi", layout)
    }

    fn key() -> RecordKey {
        RecordKey {
            client_id: 10,
            activity_id: 5,
            fiscal_year: Some(2025),
        }
    }

    #[test]
    fn test_enroll_creates_all_periods() {
        let store = MemoryStore::new();
        let record = store.enroll(key(), &activity()).unwrap();
        assert_eq!(record.periods.len(), 4);
        assert_eq!(store.load(&key()).unwrap(), record);
        assert_eq!(
            store.enroll(key(), &activity()),
            Err(StoreError::AlreadyEnrolled { key: key() })
        );
    }

    #[test]
    fn test_save_bumps_version() {
        let store = MemoryStore::new();
        let record = store.enroll(key(), &activity()).unwrap();
        assert_eq!(store.save(record, 0).unwrap(), 1);
        assert_eq!(store.load(&key()).unwrap().version, 1);
    }

    #[test]
    fn test_stale_write_rejected() {
        let store = MemoryStore::new();
        store.enroll(key(), &activity()).unwrap();

        let first = store.load(&key()).unwrap();
        let mut second = store.load(&key()).unwrap();

        store.save(first, 0).unwrap();
        second
            .period_mut(1)
            .set_raw(FieldId::parse("Saldo").unwrap(), "5");
        let err = store.save(second, 0).unwrap_err();
        assert_eq!(
            err,
            StoreError::StaleWrite {
                key: key(),
                expected: 0,
                actual: 1
            }
        );
    }

    #[test]
    fn test_load_missing() {
        let store = MemoryStore::new();
        assert!(matches!(store.load(&key()), Err(StoreError::NotFound { .. })));
    }
}
