//! Externally-facing run coordinator.
//!
//! Creates runs (spawning the pipeline task), exposes current state,
//! opens change feeds, and applies checkpoint decisions. Resume on a run
//! that is not paused is a no-op returning the current record; resume
//! against the wrong checkpoint or with an invalid decision is a
//! validation error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::feed::ChangeFeed;
use super::pipeline::Pipeline;
use super::store::RunStore;
use crate::domain::{
    Checkpoint, LorePack, Message, PartialUpdate, RunRecord, StageName,
};
use crate::error::{Error, Result};

/// A checkpoint decision submitted by a client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResumeRequest {
    /// Checkpoint the client believes the run is paused at
    pub checkpoint: Checkpoint,

    /// What to do at that checkpoint
    pub decision: Decision,

    /// Decision-specific edits
    #[serde(default)]
    pub payload: ResumePayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Accept the stage output as-is
    Approve,

    /// Replace the lore with the payload's version, then continue
    Edit,

    /// Confirm the settled mint, completing the run
    Finalize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResumePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lore: Option<LorePack>,
}

/// Result of a resume call
#[derive(Debug, Clone)]
pub struct ResumeOutcome {
    /// The record after the call
    pub record: RunRecord,

    /// Whether this call cleared the checkpoint and restarted the
    /// pipeline. False for the no-op path (run not paused, or another
    /// caller resumed it first).
    pub resumed: bool,
}

pub struct RunController {
    store: Arc<dyn RunStore>,
    pipeline: Arc<Pipeline>,
}

impl RunController {
    pub fn new(store: Arc<dyn RunStore>, pipeline: Arc<Pipeline>) -> Self {
        Self { store, pipeline }
    }

    /// Create a run and start its pipeline asynchronously
    pub async fn create_run(&self, date_label: impl Into<String>) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        self.store
            .create(RunRecord::new(run_id, date_label))
            .await?;
        info!(%run_id, "Run created");

        self.spawn_pipeline(run_id, 0);
        Ok(run_id)
    }

    /// Snapshot of the current record
    pub async fn get_run(&self, run_id: Uuid) -> Result<RunRecord> {
        self.store.get(run_id).await
    }

    /// Open a change feed at the given message cursor
    pub fn feed(&self, run_id: Uuid, cursor: usize) -> ChangeFeed {
        ChangeFeed::new(self.store.clone(), run_id, cursor)
    }

    /// Apply a checkpoint decision and unblock the pipeline.
    ///
    /// A run that is not paused is returned unchanged with
    /// `resumed: false` (never restarts completed stages). The
    /// checkpoint check and clear are one atomic store operation, so
    /// concurrent resume calls for the same checkpoint spawn exactly
    /// one continuation.
    pub async fn resume(&self, run_id: Uuid, request: ResumeRequest) -> Result<ResumeOutcome> {
        let record = self.store.get(run_id).await?;

        let checkpoint = match record.checkpoint {
            Some(checkpoint) => checkpoint,
            None => {
                return Ok(ResumeOutcome {
                    record,
                    resumed: false,
                })
            }
        };

        if checkpoint != request.checkpoint {
            return Err(Error::Validation(format!(
                "run is paused at {}, not {}",
                checkpoint, request.checkpoint
            )));
        }

        let partial = match (checkpoint, request.decision) {
            (Checkpoint::LoreApproval, Decision::Approve) => PartialUpdate {
                checkpoint: Some(None),
                ..Default::default()
            },
            (Checkpoint::LoreApproval, Decision::Edit) => {
                let lore = request.payload.lore.ok_or_else(|| {
                    Error::Validation("edit decision requires a lore payload".to_string())
                })?;
                PartialUpdate {
                    lore: Some(lore),
                    checkpoint: Some(None),
                    ..Default::default()
                }
            }
            (Checkpoint::FinalizeMint, Decision::Finalize) => PartialUpdate {
                checkpoint: Some(None),
                messages: vec![Message::info(
                    StageName::System,
                    "Mint finalized by user approval",
                )],
                ..Default::default()
            },
            (checkpoint, decision) => {
                return Err(Error::Validation(format!(
                    "invalid decision {:?} for checkpoint {}",
                    decision, checkpoint
                )))
            }
        };

        // Clear-if-still-paused: a concurrent resume that lost this
        // race gets the no-op path instead of a second pipeline task.
        match self
            .store
            .merge_if_paused_at(run_id, checkpoint, partial)
            .await?
        {
            Some(record) => {
                info!(%run_id, %checkpoint, "Run resumed");
                self.spawn_pipeline(run_id, checkpoint.resume_index());
                Ok(ResumeOutcome {
                    record,
                    resumed: true,
                })
            }
            None => {
                let record = self.store.get(run_id).await?;
                Ok(ResumeOutcome {
                    record,
                    resumed: false,
                })
            }
        }
    }

    fn spawn_pipeline(&self, run_id: Uuid, start: usize) {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            if let Err(err) = pipeline.run_from(run_id, start).await {
                error!(%run_id, error = %err, "Pipeline task failed");
            }
        });
    }
}
