//! Domain types for the curio orchestrator.
//!
//! This module contains the core data structures:
//! - RunRecord: the shared orchestration state for one pipeline run
//! - Message: append-only event entries streamed to observers
//! - Stage artifacts: LorePack, ArtSet, VoteSession, MintReceipt

pub mod artifacts;
pub mod message;
pub mod record;

// Re-export commonly used types
pub use artifacts::{
    ArtSet, FinalTally, LorePack, MintReceipt, PreparedTx, PromptSeed, ResolvedBy, VoteConfig,
    VoteResolution, VoteSession, VoteStatus,
};
pub use message::{Link, Message, Severity};
pub use record::{Checkpoint, PartialUpdate, RunPhase, RunRecord, StageName};
