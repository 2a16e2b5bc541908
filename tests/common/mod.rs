//! Shared stubs for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use curio::adapters::{Generator, ImageCandidate, Ledger};
use curio::core::{MemoryRunStore, RunStore};
use curio::domain::{
    Checkpoint, FinalTally, LorePack, MintReceipt, PartialUpdate, PreparedTx, PromptSeed,
    RunRecord, VoteConfig, VoteStatus,
};
use curio::error::{Error, Result};

/// Store wrapper that records the order of operations
pub struct LoggingStore {
    inner: MemoryRunStore,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl LoggingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRunStore::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl RunStore for LoggingStore {
    async fn create(&self, record: RunRecord) -> Result<()> {
        self.record(format!("create:{}", record.run_id));
        self.inner.create(record).await
    }

    async fn get(&self, run_id: Uuid) -> Result<RunRecord> {
        self.inner.get(run_id).await
    }

    async fn merge(&self, run_id: Uuid, partial: PartialUpdate) -> Result<RunRecord> {
        let tag = if partial.messages.is_empty() {
            "merge"
        } else {
            "merge+msg"
        };
        self.record(format!("{}:{}", tag, run_id));
        self.inner.merge(run_id, partial).await
    }

    async fn merge_if_paused_at(
        &self,
        run_id: Uuid,
        expected: Checkpoint,
        partial: PartialUpdate,
    ) -> Result<Option<RunRecord>> {
        self.record(format!("merge_if:{}", run_id));
        self.inner.merge_if_paused_at(run_id, expected, partial).await
    }
}

/// Store whose reads take long enough to widen check-then-act windows
pub struct SlowReadStore {
    inner: MemoryRunStore,
    read_delay: Duration,
}

impl SlowReadStore {
    pub fn new(read_delay: Duration) -> Self {
        Self {
            inner: MemoryRunStore::new(),
            read_delay,
        }
    }
}

#[async_trait]
impl RunStore for SlowReadStore {
    async fn create(&self, record: RunRecord) -> Result<()> {
        self.inner.create(record).await
    }

    async fn get(&self, run_id: Uuid) -> Result<RunRecord> {
        tokio::time::sleep(self.read_delay).await;
        self.inner.get(run_id).await
    }

    async fn merge(&self, run_id: Uuid, partial: PartialUpdate) -> Result<RunRecord> {
        self.inner.merge(run_id, partial).await
    }

    async fn merge_if_paused_at(
        &self,
        run_id: Uuid,
        expected: Checkpoint,
        partial: PartialUpdate,
    ) -> Result<Option<RunRecord>> {
        self.inner.merge_if_paused_at(run_id, expected, partial).await
    }
}

/// Generator whose research call always fails (render succeeds)
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing-generator"
    }

    async fn research(&self, _date_label: &str) -> Result<LorePack> {
        Err(Error::Collaborator("generator offline".to_string()))
    }

    async fn render(&self, _seed: &PromptSeed, count: usize) -> Result<Vec<ImageCandidate>> {
        Ok((0..count)
            .map(|i| ImageCandidate {
                bytes: vec![i as u8],
                thumbnail: format!("data:thumb-{}", i),
                style_note: format!("note {}", i),
            })
            .collect())
    }
}

/// Ledger whose vote never closes, never collects a ballot, and reports
/// an end time in the past from the first poll. Forces the timeout path.
pub struct StuckVoteLedger;

#[async_trait]
impl Ledger for StuckVoteLedger {
    fn name(&self) -> &str {
        "stuck-vote-ledger"
    }

    async fn pin_image(&self, _bytes: &[u8]) -> Result<String> {
        Ok(format!("ipfs://QmPinned{}", Uuid::new_v4().simple()))
    }

    async fn pin_metadata(&self, _metadata: &serde_json::Value) -> Result<String> {
        Ok(format!("ipfs://QmMeta{}", Uuid::new_v4().simple()))
    }

    async fn start_vote(
        &self,
        _cids: &[String],
        _config: &VoteConfig,
    ) -> Result<(String, PreparedTx)> {
        Ok((
            "vote_stuck".to_string(),
            PreparedTx {
                to: "0x0".to_string(),
                data: "0x".to_string(),
                value: None,
                gas: None,
            },
        ))
    }

    async fn vote_status(&self, _vote_id: &str) -> Result<VoteStatus> {
        Ok(VoteStatus {
            is_open: true,
            counts: vec![0, 0, 0, 0],
            ends_at: Utc::now() - chrono::Duration::minutes(5),
        })
    }

    async fn final_tally(&self, _vote_id: &str) -> Result<FinalTally> {
        Err(Error::Collaborator("tally never available".to_string()))
    }

    async fn settle_mint(
        &self,
        _vote_id: &str,
        _winner_cid: &str,
        metadata_cid: &str,
    ) -> Result<MintReceipt> {
        Ok(MintReceipt {
            tx_hash: "0xstuck".to_string(),
            token_id: "1".to_string(),
            token_uri: metadata_cid.to_string(),
        })
    }
}

/// Poll the store until the predicate holds or the timeout elapses
pub async fn wait_for<F>(store: &dyn RunStore, run_id: Uuid, timeout: Duration, predicate: F) -> RunRecord
where
    F: Fn(&RunRecord) -> bool,
{
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let record = store.get(run_id).await.expect("run must exist");
        if predicate(&record) {
            return record;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting for run {} to reach expected state; record: {:?}",
            run_id,
            record
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
