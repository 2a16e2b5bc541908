//! Pipeline stages.
//!
//! A stage is a function of the current RunRecord producing a partial
//! update. Stages tolerate missing inputs by returning an error partial,
//! catch all collaborator failures, and flush progress messages to the
//! store as they happen so observers see live progress inside a single
//! long-running stage.

pub mod artist;
pub mod lore;
pub mod mint;
pub mod vote;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use artist::ArtistStage;
pub use lore::LoreStage;
pub use mint::MintStage;
pub use vote::{VoteOpenStage, VoteResolveStage};

use crate::core::store::RunStore;
use crate::domain::{Message, PartialUpdate, RunRecord, StageName};
use crate::error::Result;

/// A single pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name, used in messages and logs
    fn name(&self) -> StageName;

    /// Run the stage against the current record.
    ///
    /// Implementations return an error partial (not `Err`) for missing
    /// inputs, and substitute fallback artifacts for collaborator
    /// failures where a sane fallback exists. `Err` is reserved for
    /// unexpected faults; the executor converts those into error
    /// partials so the pipeline never sees a bare failure.
    async fn execute(&self, ctx: &StageContext, record: &RunRecord) -> Result<PartialUpdate>;
}

/// Handle stages use to flush progress to the store mid-execution
pub struct StageContext {
    run_id: Uuid,
    store: Arc<dyn RunStore>,
}

impl StageContext {
    pub fn new(run_id: Uuid, store: Arc<dyn RunStore>) -> Self {
        Self { run_id, store }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append a message to the run immediately, without waiting for the
    /// stage to complete.
    pub async fn emit(&self, message: Message) -> Result<()> {
        self.store
            .merge(self.run_id, PartialUpdate::messages_only(vec![message]))
            .await?;
        Ok(())
    }
}
