// file: src/store/mod.rs
// description: in-memory pipeline store with one lock per record
// reference: shared map of Arc<Mutex<_>> entries behind an async RwLock

mod record;

pub use record::{PipelineId, PipelineRecord, PipelineSummary, RecordUpdate};

use crate::error::{PipelineError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// A record plus the summary of its last completed merge. The summary sits
/// outside the record mutex so listings never wait on a running stage.
#[derive(Debug, Clone)]
struct Slot {
    record: Arc<Mutex<PipelineRecord>>,
    summary: Arc<std::sync::Mutex<PipelineSummary>>,
}

impl Slot {
    fn new(record: PipelineRecord) -> Self {
        Self {
            summary: Arc::new(std::sync::Mutex::new(record.summary())),
            record: Arc::new(Mutex::new(record)),
        }
    }

    fn publish(&self, summary: PipelineSummary) {
        *self.summary.lock().unwrap_or_else(PoisonError::into_inner) = summary;
    }

    fn last_summary(&self) -> PipelineSummary {
        self.summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The map lock is only held for lookups and inserts. Record work happens
/// under the record's own mutex, so pipelines never contend with each other.
#[derive(Debug, Default)]
pub struct PipelineStore {
    records: RwLock<HashMap<PipelineId, Slot>>,
}

impl PipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty record under a fresh id.
    pub async fn create(&self) -> PipelineId {
        self.insert(PipelineRecord::new(PipelineId::new())).await
    }

    /// Publishes a fully built record; readers see all of it or nothing.
    pub async fn insert(&self, record: PipelineRecord) -> PipelineId {
        let id = record.id;
        self.records.write().await.insert(id, Slot::new(record));
        debug!("Created pipeline {}", id);
        id
    }

    async fn slot(&self, id: &PipelineId) -> Result<Slot> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    /// Exclusive guard over one record, held across a read-compute-merge
    /// sequence. Changes made through the guard should go through `apply`
    /// so listings pick them up.
    pub async fn lock(&self, id: &PipelineId) -> Result<OwnedMutexGuard<PipelineRecord>> {
        let slot = self.slot(id).await?;
        Ok(slot.record.lock_owned().await)
    }

    /// Merges a delta into a locked record and refreshes its listed summary.
    pub async fn apply(&self, record: &mut PipelineRecord, update: RecordUpdate) {
        update.apply(record);
        if let Some(slot) = self.records.read().await.get(&record.id) {
            slot.publish(record.summary());
        }
    }

    pub async fn merge(&self, id: &PipelineId, update: RecordUpdate) -> Result<()> {
        let mut record = self.lock(id).await?;
        self.apply(&mut record, update).await;
        Ok(())
    }

    /// A consistent snapshot; never observes a half-applied merge.
    pub async fn read(&self, id: &PipelineId) -> Result<PipelineRecord> {
        let record = self.lock(id).await?;
        Ok(record.clone())
    }

    /// Never waits on a record lock: records busy with a stage are listed
    /// from their last published summary and flagged `busy`.
    pub async fn list(&self) -> Vec<PipelineSummary> {
        let slots: Vec<Slot> = self.records.read().await.values().cloned().collect();

        let mut summaries: Vec<PipelineSummary> = slots
            .iter()
            .map(|slot| match slot.record.try_lock() {
                Ok(record) => record.summary(),
                Err(_) => PipelineSummary {
                    busy: true,
                    ..slot.last_summary()
                },
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    pub async fn remove(&self, id: &PipelineId) -> Result<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| debug!("Removed pipeline {}", id))
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Cell, Dataset};
    use crate::stages::SplitData;
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_read_remove() {
        let store = PipelineStore::new();
        let id = store.create().await;
        assert_eq!(store.len().await, 1);

        let record = store.read(&id).await.unwrap();
        assert_eq!(record.id, id);
        assert!(record.dataset.is_none());

        store.remove(&id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(store.read(&id).await.unwrap_err().is_not_found());
        assert!(store.remove(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_merge_unknown_id() {
        let store = PipelineStore::new();
        let err = store
            .merge(&PipelineId::new(), RecordUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_merge_replaces_group() {
        let store = PipelineStore::new();
        let id = store.create().await;
        let update = RecordUpdate {
            dataset: Some(Dataset::default()),
            ..RecordUpdate::default()
        };
        store.merge(&id, update).await.unwrap();
        assert!(store.read(&id).await.unwrap().dataset.is_some());
    }

    #[tokio::test]
    async fn test_lock_blocks_same_record_only() {
        let store = Arc::new(PipelineStore::new());
        let first = store.create().await;
        let second = store.create().await;

        let guard = store.lock(&first).await.unwrap();

        let other = tokio::time::timeout(Duration::from_millis(200), store.read(&second)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), store.read(&first)).await;
        assert!(same.is_err());

        drop(guard);
        assert!(store.read(&first).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_reports_every_pipeline() {
        let store = PipelineStore::new();
        store.create().await;
        store.create().await;
        let summaries = store.list().await;
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| !s.has_model));
    }

    #[tokio::test]
    async fn test_list_does_not_wait_on_busy_record() {
        let store = PipelineStore::new();
        let busy = store.create().await;
        let idle = store.create().await;

        let mut guard = store.lock(&busy).await.unwrap();
        store
            .apply(
                &mut guard,
                RecordUpdate {
                    dataset: Some(Dataset::default()),
                    ..RecordUpdate::default()
                },
            )
            .await;

        let summaries = tokio::time::timeout(Duration::from_millis(300), store.list())
            .await
            .expect("list waited on a locked record");
        assert_eq!(summaries.len(), 2);

        let find = |id: PipelineId| summaries.iter().find(|s| s.pipeline_id == id).unwrap();
        assert!(find(busy).busy);
        assert!(!find(idle).busy);

        drop(guard);
        assert!(store.list().await.iter().all(|s| !s.busy));
    }

    #[tokio::test]
    async fn test_busy_listing_shows_last_applied_merge() {
        let store = PipelineStore::new();
        let id = store.create().await;

        let mut guard = store.lock(&id).await.unwrap();
        let split = SplitData {
            x_train: vec![vec![1.0]],
            x_test: vec![vec![2.0]],
            y_train: vec![Cell::Number(1.0)],
            y_test: vec![Cell::Number(2.0)],
            feature_columns: vec!["x".to_string()],
            target_column: "y".to_string(),
            ratio: 0.5,
        };
        store
            .apply(
                &mut guard,
                RecordUpdate {
                    split: Some(split),
                    ..RecordUpdate::default()
                },
            )
            .await;

        let listed = store.list().await;
        assert!(listed[0].busy);
        assert!(listed[0].has_split);
        assert!(!listed[0].has_model);
    }

    #[tokio::test]
    async fn test_insert_publishes_complete_record() {
        let store = PipelineStore::new();
        let mut record = PipelineRecord::new(PipelineId::new());
        record.dataset = Some(Dataset::default());
        let id = store.insert(record).await;

        let stored = store.read(&id).await.unwrap();
        assert!(stored.dataset.is_some());
        assert_eq!(store.list().await[0].pipeline_id, id);
    }
}
