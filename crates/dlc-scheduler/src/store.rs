//! In-memory [`RecordStore`].
//!
//! Useful for tests and for dry runs of the CLI. The lock is `parking_lot`
//! and never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use dlc_core::{BatchId, RecordStore, RegionCode, StoreError, SyncDate};
use parking_lot::RwLock;
use serde_json::Value;

/// What was stored for one region/date.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBatch {
    pub batch_id: BatchId,
    pub meta: Value,
    pub records: Vec<Value>,
}

/// Thread-safe, cloneable in-memory store. Clones share data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    data: Arc<RwLock<HashMap<(RegionCode, SyncDate), StoredBatch>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, region: &RegionCode, date: SyncDate) -> Option<StoredBatch> {
        self.data.read().get(&(region.clone(), date)).cloned()
    }

    /// Number of region/date entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_records(&self) -> usize {
        self.data.read().values().map(|b| b.records.len()).sum()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn save_batch_result(
        &self,
        region: &RegionCode,
        date: SyncDate,
        batch_id: &BatchId,
        meta: &Value,
    ) -> Result<(), StoreError> {
        self.data.write().insert(
            (region.clone(), date),
            StoredBatch {
                batch_id: batch_id.clone(),
                meta: meta.clone(),
                records: Vec::new(),
            },
        );
        Ok(())
    }

    fn save_records(
        &self,
        region: &RegionCode,
        date: SyncDate,
        batch_id: &BatchId,
        records: &[Value],
    ) -> Result<(), StoreError> {
        let mut data = self.data.write();
        let entry = data
            .entry((region.clone(), date))
            .or_insert_with(|| StoredBatch {
                batch_id: batch_id.clone(),
                meta: Value::Null,
                records: Vec::new(),
            });
        if &entry.batch_id != batch_id {
            return Err(StoreError::Unavailable(format!(
                "{region} {date}: records for batch {batch_id} but batch {} is recorded",
                entry.batch_id
            )));
        }
        entry.records.extend_from_slice(records);
        Ok(())
    }
}
