//! Orchestration core.
//!
//! - `store`: keyed run storage with atomic partial merges
//! - `executor`: stage invocation guard
//! - `pipeline`: the stage-sequencing state machine
//! - `poller`: bounded vote-resolution polling
//! - `feed`: incremental change feed for observers
//! - `controller`: run creation, state access, checkpoint resume

pub mod controller;
pub mod executor;
pub mod feed;
pub mod pipeline;
pub mod poller;
pub mod store;

pub use controller::{Decision, ResumeOutcome, ResumePayload, ResumeRequest, RunController};
pub use executor::StageExecutor;
pub use feed::{ChangeFeed, FeedConfig, FeedEvent, StateUpdate};
pub use pipeline::{Pipeline, PipelineSettings, PipelineState};
pub use poller::{PollerConfig, ResolutionPoller};
pub use store::{MemoryRunStore, RunStore};
