//! SSE delivery of the change feed.
//!
//! Each feed event maps to one SSE event: `update` for a message,
//! `state` for a changed-field snapshot, `complete`/`error` as terminal
//! markers. The stream polls the store at a fixed interval up to the
//! configured wall-clock cap, then ends silently; the client reconnects
//! with its message cursor.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::core::{ChangeFeed, FeedEvent};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Number of messages the client has already seen
    #[serde(default)]
    pub cursor: usize,
}

struct FeedLoop {
    feed: ChangeFeed,
    interval: Duration,
    polls_left: u64,
    first: bool,
    done: bool,
}

/// GET /runs/:id/stream — live run updates as SSE
pub async fn stream_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let feed = state.controller.feed(run_id, query.cursor);
    let feed_loop = FeedLoop {
        feed,
        interval: state.feed_config.poll_interval,
        polls_left: state.feed_config.max_polls().max(1),
        first: true,
        done: false,
    };

    let stream = stream::unfold(feed_loop, |mut fl| async move {
        if fl.done || fl.polls_left == 0 {
            return None;
        }
        if !fl.first {
            tokio::time::sleep(fl.interval).await;
        }
        fl.first = false;
        fl.polls_left -= 1;

        let events = match fl.feed.poll().await {
            Ok((events, done)) => {
                fl.done = done;
                events
            }
            Err(err) => {
                fl.done = true;
                vec![FeedEvent::Error {
                    run_id: fl.feed.run_id(),
                    error: err.to_string(),
                }]
            }
        };

        let batch: Vec<Result<Event, Infallible>> =
            events.iter().map(|e| Ok(to_sse_event(e))).collect();
        Some((stream::iter(batch), fl))
    })
    .flatten();

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &FeedEvent) -> Event {
    let (name, data) = match event {
        FeedEvent::Update(message) => ("update", serde_json::to_string(message)),
        FeedEvent::State(update) => ("state", serde_json::to_string(update)),
        FeedEvent::Complete { run_id } => (
            "complete",
            serde_json::to_string(&serde_json::json!({
                "run_id": run_id,
                "status": "completed",
            })),
        ),
        FeedEvent::Error { run_id, error } => (
            "error",
            serde_json::to_string(&serde_json::json!({
                "run_id": run_id,
                "error": error,
            })),
        ),
    };

    match data {
        Ok(data) => Event::default().event(name).data(data),
        // Serialization of these types cannot fail in practice; keep the
        // stream alive with an empty payload if it ever does.
        Err(_) => Event::default().event(name).data("{}"),
    }
}
