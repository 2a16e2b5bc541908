//! Pipeline state machine.
//!
//! An explicit tagged-state loop drives the fixed stage order
//! (lore → artist → vote_open → vote_resolve → mint). Each stage's
//! partial is merged into the store before the next stage is invoked;
//! a checkpoint in a partial suspends the loop until an explicit resume
//! re-enters it at the following stage.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::executor::StageExecutor;
use super::poller::PollerConfig;
use super::store::RunStore;
use crate::adapters::{Generator, Ledger};
use crate::domain::{Checkpoint, VoteConfig};
use crate::error::Result;
use crate::stages::{
    ArtistStage, LoreStage, MintStage, Stage, StageContext, VoteOpenStage, VoteResolveStage,
};

/// Tunables for the standard stage set
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// How many art candidates to produce
    pub art_candidates: usize,

    /// Vote configuration handed to the ledger
    pub vote: VoteConfig,

    /// Bounds for the resolution poller
    pub poller: PollerConfig,

    /// Grace buffer past the vote duration, in seconds
    pub vote_grace_s: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            art_candidates: 4,
            vote: VoteConfig::default(),
            poller: PollerConfig::default(),
            vote_grace_s: 30,
        }
    }
}

/// State of the pipeline driver for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Stage `i` is queued
    Pending(usize),

    /// Stage `i` is executing
    Running(usize),

    /// Suspended at a checkpoint, awaiting resume
    Paused(Checkpoint),

    /// All stages done
    Completed,

    /// Terminal failure
    Failed(String),
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    store: Arc<dyn RunStore>,
}

impl Pipeline {
    /// Build a pipeline over an explicit stage list (used by tests)
    pub fn new(stages: Vec<Arc<dyn Stage>>, store: Arc<dyn RunStore>) -> Self {
        Self { stages, store }
    }

    /// The standard five-stage curation pipeline
    pub fn standard(
        store: Arc<dyn RunStore>,
        generator: Arc<dyn Generator>,
        ledger: Arc<dyn Ledger>,
        settings: PipelineSettings,
    ) -> Self {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(LoreStage::new(generator.clone())),
            Arc::new(ArtistStage::new(
                generator,
                ledger.clone(),
                settings.art_candidates,
            )),
            Arc::new(VoteOpenStage::new(ledger.clone(), settings.vote)),
            Arc::new(VoteResolveStage::new(
                ledger.clone(),
                settings.poller,
                settings.vote_grace_s,
            )),
            Arc::new(MintStage::new(ledger)),
        ];
        Self::new(stages, store)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Drive a run from its first stage
    pub async fn run(&self, run_id: Uuid) -> Result<PipelineState> {
        self.run_from(run_id, 0).await
    }

    /// Drive a run starting at stage `start` until it completes, fails
    /// or pauses at a checkpoint.
    #[instrument(skip(self), fields(%run_id, start))]
    pub async fn run_from(&self, run_id: Uuid, start: usize) -> Result<PipelineState> {
        let ctx = StageContext::new(run_id, self.store.clone());
        let mut state = PipelineState::Pending(start);

        loop {
            state = match state {
                PipelineState::Pending(i) if i >= self.stages.len() => {
                    info!(%run_id, "Run completed");
                    PipelineState::Completed
                }
                PipelineState::Pending(i) => PipelineState::Running(i),

                PipelineState::Running(i) => {
                    let record = self.store.get(run_id).await?;
                    if let Some(error) = record.error {
                        // A terminal record never re-enters a stage
                        warn!(%run_id, "Refusing to run stage on a failed run");
                        break Ok(PipelineState::Failed(error));
                    }

                    let stage = &self.stages[i];
                    let partial = StageExecutor::execute(stage.as_ref(), &ctx, &record).await;

                    let error = partial.error.clone();
                    let checkpoint = partial.checkpoint.flatten();

                    // Merge before advancing: stage i+1 must never start
                    // until stage i's partial is durable.
                    self.store.merge(run_id, partial).await?;

                    if let Some(error) = error {
                        warn!(%run_id, stage = %stage.name(), %error, "Run failed");
                        PipelineState::Failed(error)
                    } else if let Some(checkpoint) = checkpoint {
                        info!(%run_id, %checkpoint, "Run paused at checkpoint");
                        PipelineState::Paused(checkpoint)
                    } else {
                        PipelineState::Pending(i + 1)
                    }
                }

                terminal => break Ok(terminal),
            };
        }
    }
}
