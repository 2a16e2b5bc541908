//! Adapter interfaces for external collaborators.
//!
//! Stages talk to two collaborators: a content generator (research text
//! and candidate images) and a ledger (pinning, votes, settlement). Both
//! are fallible, possibly slow black boxes; stages own the fallback
//! behavior when a call fails.

pub mod generator;
pub mod ledger;

use async_trait::async_trait;

pub use generator::{HttpGenerator, ImageCandidate, SimGenerator};
pub use ledger::{HttpLedger, SimLedger};

use crate::domain::{FinalTally, LorePack, PreparedTx, PromptSeed, VoteConfig, VoteStatus};
use crate::error::Result;

/// Content generator: research summaries and candidate images
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Produce a research pack for a date label
    async fn research(&self, date_label: &str) -> Result<LorePack>;

    /// Render candidate images from a prompt seed
    async fn render(&self, seed: &PromptSeed, count: usize) -> Result<Vec<ImageCandidate>>;
}

/// Ledger client: content pinning, vote lifecycle and settlement
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Pin image bytes, returning a content id
    async fn pin_image(&self, bytes: &[u8]) -> Result<String>;

    /// Pin a metadata document, returning a content id
    async fn pin_metadata(&self, metadata: &serde_json::Value) -> Result<String>;

    /// Open a vote over the given content ids
    async fn start_vote(
        &self,
        cids: &[String],
        config: &VoteConfig,
    ) -> Result<(String, PreparedTx)>;

    /// Current status of a vote
    async fn vote_status(&self, vote_id: &str) -> Result<VoteStatus>;

    /// Authoritative tally, valid once the vote has closed
    async fn final_tally(&self, vote_id: &str) -> Result<FinalTally>;

    /// Settle the mint for the winning candidate
    async fn settle_mint(
        &self,
        vote_id: &str,
        winner_cid: &str,
        metadata_cid: &str,
    ) -> Result<crate::domain::MintReceipt>;
}
