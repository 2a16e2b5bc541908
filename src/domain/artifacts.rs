//! Artifacts produced by pipeline stages.
//!
//! Each artifact is owned by the stage that produced it and is never
//! mutated by a later stage, with one exception: the vote session's
//! `result` field, which the resolution poller fills in once the vote
//! settles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Research output for a date label: summary, facts, sources and a seed
/// for image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LorePack {
    /// Markdown summary (kept short, ~200 words)
    pub summary_md: String,

    /// Crisp facts about the subject
    pub bullet_facts: Vec<String>,

    /// Source URLs backing the summary
    pub sources: Vec<String>,

    /// Seed parameters handed to the image generator
    pub prompt_seed: PromptSeed,
}

impl LorePack {
    /// Deterministic research pack used when no generator is reachable.
    /// Also what the simulated generator returns.
    pub fn fallback(date_label: &str) -> Self {
        Self {
            summary_md: format!(
                "# {date_label}\n\nThis historical moment represents a pivotal point in \
                 technological and social history. The date marks developments that shaped \
                 decentralized systems, digital innovation and community-driven progress, \
                 with implications for digital sovereignty and community governance.",
            ),
            bullet_facts: vec![
                format!("Historical date: {date_label}"),
                "Significant technological milestone achieved".to_string(),
                "Community-driven development model established".to_string(),
                "Open-source principles emphasized".to_string(),
                "Decentralized governance concepts introduced".to_string(),
            ],
            sources: vec![
                "https://ethereum.org/en/history/".to_string(),
                "https://blog.ethereum.org/".to_string(),
                "https://ethereum.github.io/yellowpaper/paper.pdf".to_string(),
            ],
            prompt_seed: PromptSeed {
                style: "digital art, futuristic, blockchain aesthetic".to_string(),
                palette: "blue, purple, gold, electric colors".to_string(),
                motifs: vec![
                    "geometric patterns".to_string(),
                    "network nodes".to_string(),
                    "flowing data".to_string(),
                    "crystalline structures".to_string(),
                ],
                negative: "dark, dystopian, chaotic".to_string(),
            },
        }
    }
}

/// Style parameters for image generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSeed {
    pub style: String,
    pub palette: String,
    pub motifs: Vec<String>,
    pub negative: String,
}

/// Candidate images produced by the artist stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtSet {
    /// Content ids of the pinned full-size images
    pub cids: Vec<String>,

    /// Small previews (content ids or data URLs)
    pub thumbnails: Vec<String>,

    /// One style note per candidate
    pub style_notes: Vec<String>,
}

impl ArtSet {
    /// Number of vote options this set offers
    pub fn option_count(&self) -> usize {
        self.cids.len()
    }

    /// Deterministic placeholder set used when generation or pinning fails
    pub fn placeholder(count: usize) -> Self {
        const CIDS: [&str; 4] = [
            "ipfs://QmYjtig7VJQ6XsnUjqqJvj7QaMcCAwtrgNdahSiFofrE7o",
            "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
            "ipfs://QmPZ9gcCEpqKTo6aq61g2nXGUhM4iCL3ewB6LDXZzVHEYT",
            "ipfs://QmYjtig7VJQ6XsnUjqqJvj7QaMcCAwtrgNdahSiFofrE8p",
        ];
        let n = count.clamp(1, CIDS.len());
        Self {
            cids: CIDS[..n].iter().map(|s| s.to_string()).collect(),
            thumbnails: (0..n)
                .map(|i| format!("data:image/svg+xml;utf8,<svg><!-- placeholder {} --></svg>", i))
                .collect(),
            style_notes: (0..n).map(|i| format!("Placeholder candidate {}", i + 1)).collect(),
        }
    }
}

/// Configuration for a vote on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteConfig {
    /// Counting method, e.g. "simple"
    pub method: String,

    /// Eligibility gate: "allowlist" | "open"
    pub gate: String,

    /// How long the vote stays open, in seconds
    pub duration_s: u64,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            method: "simple".to_string(),
            gate: "allowlist".to_string(),
            duration_s: 120,
        }
    }
}

/// A vote opened on the ledger, plus its eventual resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteSession {
    /// Ledger-assigned vote id
    pub vote_id: String,

    /// Configuration the vote was opened with
    pub config: VoteConfig,

    /// Transaction prepared by the ledger to open the vote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_tx: Option<PreparedTx>,

    /// Filled in by the resolution poller when the vote settles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<VoteResolution>,
}

/// Live status of a vote as reported by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteStatus {
    /// Whether the vote is still accepting ballots
    pub is_open: bool,

    /// Running count per option index
    pub counts: Vec<u64>,

    /// When the vote closes on the ledger
    pub ends_at: DateTime<Utc>,
}

impl VoteStatus {
    /// True if any option has received at least one ballot
    pub fn has_votes(&self) -> bool {
        self.counts.iter().any(|&c| c > 0)
    }
}

/// Authoritative final tally fetched from the ledger after close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalTally {
    /// Winning option index
    pub winner: usize,

    /// Ballot count per option index
    pub tally: BTreeMap<usize, u64>,
}

/// The settled outcome of a vote. Created only by the resolution poller
/// and immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResolution {
    /// Winning option index
    pub winner: usize,

    /// Content id of the winning candidate
    pub winner_cid: String,

    /// Ballot count per option index
    pub tally: BTreeMap<usize, u64>,

    /// Total ballots cast
    pub participation: u64,

    /// How the resolution was reached
    pub resolved_by: ResolvedBy,
}

/// How a vote resolution was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedBy {
    /// The vote closed on its own and the final tally was fetched
    Natural,

    /// The vote never closed and no ballots were observed; option 0 wins
    Timeout,

    /// The final tally fetch failed after close; option 0 wins
    EmergencyFallback,
}

/// A transaction prepared by the ledger for client-side signing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedTx {
    pub to: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

/// Receipt for the settled mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub tx_hash: String,
    pub token_id: String,
    pub token_uri: String,
}
