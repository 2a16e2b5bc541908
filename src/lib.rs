//! curio - run-state orchestrator for a multi-stage curation pipeline
//!
//! A short research → art → vote → mint pipeline where stages can pause
//! for human approval or for an external vote to close. Clients observe
//! progress through a continuously updated run record and a live SSE
//! feed.
//!
//! # Architecture
//!
//! The system is built around one shared record per run:
//! - Stages produce partial updates merged atomically into the store
//! - The pipeline state machine sequences stages and halts at checkpoints
//! - A bounded poller resolves the external vote with a deterministic
//!   timeout fallback, so the voting stage always terminates
//! - Change feeds diff successive record snapshots into incremental
//!   events for remote observers
//!
//! # Modules
//!
//! - `adapters`: External collaborators (generator, ledger)
//! - `core`: Orchestration logic (store, pipeline, poller, feed)
//! - `stages`: The five pipeline stages
//! - `domain`: Data structures (RunRecord, Message, artifacts)
//! - `api`: HTTP surface (REST + SSE)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Start the server (simulated collaborators unless configured)
//! curio serve
//!
//! # Execute one run locally with auto-approved checkpoints
//! curio run "2015-07-30"
//! ```

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod stages;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{
    ChangeFeed, FeedConfig, FeedEvent, MemoryRunStore, Pipeline, PipelineSettings, PipelineState,
    PollerConfig, ResolutionPoller, RunController, RunStore,
};
pub use domain::{
    Checkpoint, Message, PartialUpdate, RunPhase, RunRecord, Severity, StageName, VoteResolution,
};
pub use error::Error;
