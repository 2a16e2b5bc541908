//! Messages emitted by stages during a run.
//!
//! Messages form an append-only log inside the RunRecord. Each message
//! carries a unique id assigned at creation; the store uses that id to
//! suppress duplicates, so re-merging the same message is harmless.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::StageName;

/// A single entry in a run's message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// De-duplication key, assigned when the message is created
    pub unique_id: Uuid,

    /// Stage that emitted this message
    pub stage: StageName,

    /// Severity level
    pub severity: Severity,

    /// Human-readable text (no secrets)
    pub text: String,

    /// Optional links to artifacts, sources or transactions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Message {
    /// Create an info-level message
    pub fn info(stage: StageName, text: impl Into<String>) -> Self {
        Self::new(stage, Severity::Info, text)
    }

    /// Create a warning-level message
    pub fn warning(stage: StageName, text: impl Into<String>) -> Self {
        Self::new(stage, Severity::Warning, text)
    }

    /// Create an error-level message
    pub fn error(stage: StageName, text: impl Into<String>) -> Self {
        Self::new(stage, Severity::Error, text)
    }

    fn new(stage: StageName, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            unique_id: Uuid::new_v4(),
            stage,
            severity,
            text: text.into(),
            links: Vec::new(),
        }
    }

    /// Attach links to this message
    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }
}

/// Severity of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A labeled hyperlink attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub href: String,
}

impl Link {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
        }
    }
}
