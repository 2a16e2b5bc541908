//! Keyed run storage with atomic partial-update merging.
//!
//! Any implementation satisfying the merge contract is valid; the
//! in-memory store here is the reference implementation used by the
//! server and the tests. Merges for the same run are serialized behind a
//! per-run mutex; different runs never block each other.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Checkpoint, PartialUpdate, RunRecord};
use crate::error::{Error, Result};

/// Durable keyed map from run id to RunRecord.
///
/// `merge` must be atomic with respect to other `merge`/`get` calls on
/// the same run id: no reader observes a record with some but not all
/// fields of one partial applied.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Establish a new record. Fails if the run id already exists.
    async fn create(&self, record: RunRecord) -> Result<()>;

    /// Fetch a snapshot of the current record
    async fn get(&self, run_id: Uuid) -> Result<RunRecord>;

    /// Apply a partial update and return the resulting record.
    ///
    /// Non-message fields in the partial replace the stored values;
    /// messages are appended with `unique_id` de-duplication.
    async fn merge(&self, run_id: Uuid, partial: PartialUpdate) -> Result<RunRecord>;

    /// Apply a partial only if the run is currently paused at `expected`.
    ///
    /// The check and the merge happen under the same per-run lock, so
    /// of any number of concurrent callers expecting the same
    /// checkpoint, exactly one gets `Some`. Returns `None` when the
    /// checkpoint does not match (the run is not paused there, or
    /// another caller won).
    async fn merge_if_paused_at(
        &self,
        run_id: Uuid,
        expected: Checkpoint,
        partial: PartialUpdate,
    ) -> Result<Option<RunRecord>>;
}

/// In-memory reference implementation of [`RunStore`]
#[derive(Default)]
pub struct MemoryRunStore {
    // Arc<Mutex<_>> per run so a merge holds only its own run's lock,
    // never a map shard, across await points
    runs: DashMap<Uuid, Arc<Mutex<RunRecord>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, run_id: Uuid) -> Result<Arc<Mutex<RunRecord>>> {
        self.runs
            .get(&run_id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::NotFound(run_id))
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create(&self, record: RunRecord) -> Result<()> {
        let run_id = record.run_id;
        match self.runs.entry(run_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::AlreadyExists(run_id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(record)));
                Ok(())
            }
        }
    }

    async fn get(&self, run_id: Uuid) -> Result<RunRecord> {
        let entry = self.entry(run_id)?;
        let record = entry.lock().await;
        Ok(record.clone())
    }

    async fn merge(&self, run_id: Uuid, partial: PartialUpdate) -> Result<RunRecord> {
        let entry = self.entry(run_id)?;
        let mut record = entry.lock().await;
        record.apply(partial);
        Ok(record.clone())
    }

    async fn merge_if_paused_at(
        &self,
        run_id: Uuid,
        expected: Checkpoint,
        partial: PartialUpdate,
    ) -> Result<Option<RunRecord>> {
        let entry = self.entry(run_id)?;
        let mut record = entry.lock().await;
        if record.checkpoint != Some(expected) {
            return Ok(None);
        }
        record.apply(partial);
        Ok(Some(record.clone()))
    }
}
