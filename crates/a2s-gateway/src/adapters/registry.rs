//! In-memory target registry.
//!
//! Mutated only by administrative calls; reads hand out clones so the bridge
//! never holds the lock across an await.

use crate::domain::error::RegistryError;
use crate::domain::target::TargetRecord;
use crate::ports::TargetRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

#[derive(Default)]
pub struct InMemoryTargetRegistry {
    records: RwLock<HashMap<String, TargetRecord>>,
}

impl InMemoryTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl TargetRegistry for InMemoryTargetRegistry {
    fn get(&self, request_id: &str) -> Option<TargetRecord> {
        self.records.read().get(request_id).cloned()
    }

    fn insert(&self, record: TargetRecord) -> Result<TargetRecord, RegistryError> {
        let mut records = self.records.write();
        if records.contains_key(&record.request_id) {
            return Err(RegistryError::TargetExists(record.request_id));
        }
        records.insert(record.request_id.clone(), record.clone());
        drop(records);

        info!(
            request_id = %record.request_id,
            bridged = record.is_bridged(),
            expire_secs = record.expire,
            "Registered target"
        );
        Ok(record)
    }

    fn list(&self) -> Vec<TargetRecord> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        records
    }

    fn remove(&self, request_id: &str) -> bool {
        let removed = self.records.write().remove(request_id).is_some();
        if removed {
            info!(request_id = request_id, "Deleted target");
        }
        removed
    }
}
