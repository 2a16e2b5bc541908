//! Incremental change feed over a run record.
//!
//! Converts a sequence of store snapshots into only the new messages and
//! changed fields since the previous poll, for delivery to a remote
//! observer. Field-change detection uses deep (serialized) equality
//! because the store replaces whole substructures on every merge. The
//! only client-supplied state is the message cursor, so a dropped feed
//! can reconnect and resume safely.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::store::RunStore;
use crate::domain::{Message, RunPhase, RunRecord};
use crate::error::{Error, Result};

/// Polling bounds for a feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Fixed interval between store polls
    pub poll_interval: Duration,

    /// Wall-clock cap; the feed ends without a terminal marker after
    /// this long and the client reconnects with its cursor
    pub max_duration: Duration,
}

impl FeedConfig {
    /// Number of polls the feed performs before giving up
    pub fn max_polls(&self) -> u64 {
        let interval = self.poll_interval.as_millis().max(1);
        (self.max_duration.as_millis() / interval) as u64
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_duration: Duration::from_secs(600),
        }
    }
}

/// One event delivered to a feed observer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "payload")]
pub enum FeedEvent {
    /// A single new message entry
    Update(Message),

    /// Snapshot of non-message fields that changed since the last poll
    State(StateUpdate),

    /// The run completed
    Complete { run_id: Uuid },

    /// The run failed (or the feed hit a fatal condition)
    Error { run_id: Uuid, error: String },
}

/// Changed-field snapshot sent as one `state` event
#[derive(Debug, Clone, Serialize)]
pub struct StateUpdate {
    pub run_id: Uuid,
    /// Current non-null values of the fields that changed
    pub state_update: BTreeMap<&'static str, Value>,
}

/// Stateful differ over successive snapshots of one run
pub struct ChangeFeed {
    store: Arc<dyn RunStore>,
    run_id: Uuid,
    cursor: usize,
    last_fields: BTreeMap<&'static str, Value>,
}

/// Non-message fields tracked for change detection
const TRACKED_FIELDS: [&str; 6] = ["lore", "art", "vote", "mint", "checkpoint", "error"];

impl ChangeFeed {
    /// Open a feed at a client-supplied message cursor (0 on first call)
    pub fn new(store: Arc<dyn RunStore>, run_id: Uuid, cursor: usize) -> Self {
        Self {
            store,
            run_id,
            cursor,
            last_fields: BTreeMap::new(),
        }
    }

    /// Current message cursor (number of messages delivered)
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The run this feed observes
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// One poll: returns the events to deliver and whether the feed is
    /// done (terminal event emitted).
    pub async fn poll(&mut self) -> Result<(Vec<FeedEvent>, bool)> {
        let record = match self.store.get(self.run_id).await {
            Ok(record) => record,
            Err(Error::NotFound(run_id)) => {
                let event = FeedEvent::Error {
                    run_id,
                    error: format!("Run {} not found", run_id),
                };
                return Ok((vec![event], true));
            }
            Err(err) => return Err(err),
        };

        let mut events = Vec::new();

        // (a) messages at index >= cursor, exactly once each
        if record.messages.len() > self.cursor {
            for message in &record.messages[self.cursor..] {
                events.push(FeedEvent::Update(message.clone()));
            }
            self.cursor = record.messages.len();
        }

        // (b) changed non-message fields, by deep equality
        let fields = Self::field_values(&record);
        if fields != self.last_fields {
            let current: BTreeMap<&'static str, Value> = fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (*k, v.clone()))
                .collect();
            if !current.is_empty() || !self.last_fields.is_empty() {
                events.push(FeedEvent::State(StateUpdate {
                    run_id: self.run_id,
                    state_update: current,
                }));
            }
            self.last_fields = fields;
        }

        // (c) terminal marker
        match record.phase() {
            RunPhase::Completed => {
                events.push(FeedEvent::Complete {
                    run_id: self.run_id,
                });
                Ok((events, true))
            }
            RunPhase::Failed => {
                events.push(FeedEvent::Error {
                    run_id: self.run_id,
                    error: record.error.unwrap_or_default(),
                });
                Ok((events, true))
            }
            _ => Ok((events, false)),
        }
    }

    fn field_values(record: &RunRecord) -> BTreeMap<&'static str, Value> {
        let mut fields = BTreeMap::new();
        fields.insert(
            "lore",
            serde_json::to_value(&record.lore).unwrap_or(Value::Null),
        );
        fields.insert(
            "art",
            serde_json::to_value(&record.art).unwrap_or(Value::Null),
        );
        fields.insert(
            "vote",
            serde_json::to_value(&record.vote).unwrap_or(Value::Null),
        );
        fields.insert(
            "mint",
            serde_json::to_value(&record.mint).unwrap_or(Value::Null),
        );
        fields.insert(
            "checkpoint",
            serde_json::to_value(record.checkpoint).unwrap_or(Value::Null),
        );
        fields.insert(
            "error",
            serde_json::to_value(&record.error).unwrap_or(Value::Null),
        );
        debug_assert_eq!(fields.len(), TRACKED_FIELDS.len());
        fields
    }
}
