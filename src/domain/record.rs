//! Run state and partial-update merging.
//!
//! A RunRecord is the single shared view of one pipeline run. It is
//! mutated only through [`PartialUpdate`]s applied by the store, which
//! keeps the merge semantics in one place: non-message fields are
//! replaced wholesale, messages are appended with duplicate suppression.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifacts::{ArtSet, LorePack, MintReceipt, VoteSession};
use super::message::Message;

/// The shared orchestration state for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique identifier, assigned at creation, immutable
    pub run_id: Uuid,

    /// Immutable task input: the date label being curated
    pub date_label: String,

    /// When the run was created
    pub created_at: DateTime<Utc>,

    /// Research output (lore stage)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lore: Option<LorePack>,

    /// Candidate images (artist stage)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<ArtSet>,

    /// Vote session and eventual resolution (vote stages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<VoteSession>,

    /// Mint receipt (mint stage; final output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<MintReceipt>,

    /// Checkpoint the run is paused at, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,

    /// Terminal failure description; once set no further stages execute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Ordered, append-only message log
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl RunRecord {
    /// Create a fresh record for a new run
    pub fn new(run_id: Uuid, date_label: impl Into<String>) -> Self {
        Self {
            run_id,
            date_label: date_label.into(),
            created_at: Utc::now(),
            lore: None,
            art: None,
            vote: None,
            mint: None,
            checkpoint: None,
            error: None,
            messages: Vec::new(),
        }
    }

    /// Apply a partial update in place.
    ///
    /// Non-message fields present in the partial replace the stored value.
    /// Messages are appended in the order given, skipping any whose
    /// `unique_id` is already present. Existing messages are never touched.
    pub fn apply(&mut self, partial: PartialUpdate) {
        if let Some(lore) = partial.lore {
            self.lore = Some(lore);
        }
        if let Some(art) = partial.art {
            self.art = Some(art);
        }
        if let Some(vote) = partial.vote {
            self.vote = Some(vote);
        }
        if let Some(mint) = partial.mint {
            self.mint = Some(mint);
        }
        if let Some(checkpoint) = partial.checkpoint {
            self.checkpoint = checkpoint;
        }
        if let Some(error) = partial.error {
            self.error = Some(error);
        }

        for message in partial.messages {
            let seen = self
                .messages
                .iter()
                .any(|m| m.unique_id == message.unique_id);
            if !seen {
                self.messages.push(message);
            }
        }
    }

    /// Current mode of the run, derived from its fields.
    ///
    /// At most one of {checkpoint set, error set, final output present}
    /// holds at any instant; error wins if an invariant was violated.
    pub fn phase(&self) -> RunPhase {
        if self.error.is_some() {
            RunPhase::Failed
        } else if let Some(checkpoint) = self.checkpoint {
            RunPhase::Paused(checkpoint)
        } else if self.mint.is_some() {
            RunPhase::Completed
        } else {
            RunPhase::Running
        }
    }

    /// Whether the run has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase(), RunPhase::Completed | RunPhase::Failed)
    }
}

/// Observable mode of a run, derived from the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// A stage is executing or queued
    Running,

    /// Paused at a checkpoint, awaiting an explicit resume
    Paused(Checkpoint),

    /// Final stage output present, no error, no checkpoint
    Completed,

    /// Terminal failure
    Failed,
}

/// Named pause points in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// After the lore stage: human approves or edits the research
    LoreApproval,

    /// After the mint stage: human confirms the settled mint
    FinalizeMint,
}

impl Checkpoint {
    /// Index of the stage the pipeline continues from after this
    /// checkpoint is cleared.
    pub fn resume_index(&self) -> usize {
        match self {
            Checkpoint::LoreApproval => 1,
            // Mint is the last stage; resuming past it completes the run
            Checkpoint::FinalizeMint => 5,
        }
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Checkpoint::LoreApproval => write!(f, "lore_approval"),
            Checkpoint::FinalizeMint => write!(f, "finalize_mint"),
        }
    }
}

/// Names of the pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Lore,
    Artist,
    VoteOpen,
    VoteResolve,
    Mint,
    /// Used for controller-originated messages (e.g. finalize confirmation)
    System,
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageName::Lore => "lore",
            StageName::Artist => "artist",
            StageName::VoteOpen => "vote_open",
            StageName::VoteResolve => "vote_resolve",
            StageName::Mint => "mint",
            StageName::System => "system",
        };
        write!(f, "{}", name)
    }
}

/// A partial update produced by one stage (or the controller).
///
/// `None` fields are left untouched by the merge. The checkpoint field
/// is doubly optional so a partial can explicitly clear it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lore: Option<LorePack>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub art: Option<ArtSet>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<VoteSession>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint: Option<MintReceipt>,

    /// Outer `Some` means "set the checkpoint field to the inner value"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Option<Checkpoint>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl PartialUpdate {
    /// A partial carrying only messages
    pub fn messages_only(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// A terminal-error partial with an accompanying error message
    pub fn terminal_error(stage: StageName, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            error: Some(text.clone()),
            messages: vec![Message::error(stage, text)],
            ..Default::default()
        }
    }

    /// Attach a checkpoint to this partial
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(Some(checkpoint));
        self
    }

    /// True if this partial carries a terminal error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
