//! Change Feed Delivery Tests
//!
//! A feed polling a run concurrently with a writer must deliver every
//! message exactly once, and a reconnecting feed must resume from its
//! cursor without duplicates.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use curio::core::{ChangeFeed, FeedEvent, MemoryRunStore, RunStore};
use curio::domain::{Message, PartialUpdate, RunRecord, StageName};
use uuid::Uuid;

const WRITER_MESSAGES: usize = 25;

async fn seeded_store() -> (Arc<MemoryRunStore>, Uuid) {
    let store = Arc::new(MemoryRunStore::new());
    let run_id = Uuid::new_v4();
    store.create(RunRecord::new(run_id, "test")).await.unwrap();
    (store, run_id)
}

#[tokio::test]
async fn every_message_delivered_exactly_once_under_concurrent_writes() {
    let (store, run_id) = seeded_store().await;

    // Writer appends faster than the feed polls, then marks the run failed
    // so the feed terminates on its own.
    let writer_store = store.clone();
    let writer = tokio::spawn(async move {
        for i in 0..WRITER_MESSAGES {
            writer_store
                .merge(
                    run_id,
                    PartialUpdate::messages_only(vec![Message::info(
                        StageName::Artist,
                        format!("msg-{}", i),
                    )]),
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        writer_store
            .merge(
                run_id,
                PartialUpdate::terminal_error(StageName::Artist, "writer done"),
            )
            .await
            .unwrap();
    });

    let mut feed = ChangeFeed::new(store.clone(), run_id, 0);
    let mut delivered = Vec::new();
    loop {
        let (events, done) = feed.poll().await.unwrap();
        for event in events {
            if let FeedEvent::Update(message) = event {
                delivered.push(message);
            }
        }
        if done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    writer.await.unwrap();

    // msg-0..msg-24 plus the terminal error's own log entry
    let texts: Vec<_> = delivered.iter().map(|m| m.text.as_str()).collect();
    let expected: Vec<String> = (0..WRITER_MESSAGES).map(|i| format!("msg-{}", i)).collect();
    assert_eq!(&texts[..WRITER_MESSAGES], &expected.iter().map(|s| s.as_str()).collect::<Vec<_>>()[..]);

    let ids: HashSet<Uuid> = delivered.iter().map(|m| m.unique_id).collect();
    assert_eq!(ids.len(), delivered.len(), "duplicate delivery detected");
}

#[tokio::test]
async fn reconnect_with_cursor_skips_delivered_messages() {
    let (store, run_id) = seeded_store().await;
    store
        .merge(
            run_id,
            PartialUpdate::messages_only(
                (0..6)
                    .map(|i| Message::info(StageName::Lore, format!("m{}", i)))
                    .collect(),
            ),
        )
        .await
        .unwrap();

    // First connection consumes everything available
    let mut feed = ChangeFeed::new(store.clone(), run_id, 0);
    let (events, done) = feed.poll().await.unwrap();
    assert!(!done);
    let first = events
        .iter()
        .filter(|e| matches!(e, FeedEvent::Update(_)))
        .count();
    assert_eq!(first, 6);
    let cursor = feed.cursor();
    assert_eq!(cursor, 6);
    drop(feed);

    // More messages arrive while disconnected
    store
        .merge(
            run_id,
            PartialUpdate::messages_only(vec![
                Message::info(StageName::Artist, "m6"),
                Message::info(StageName::Artist, "m7"),
            ]),
        )
        .await
        .unwrap();

    // Reconnect at the saved cursor: only the new messages arrive
    let mut feed = ChangeFeed::new(store, run_id, cursor);
    let (events, _) = feed.poll().await.unwrap();
    let texts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            FeedEvent::Update(m) => Some(m.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["m6", "m7"]);
}

#[tokio::test]
async fn completion_closes_feed_with_complete_event() {
    let (store, run_id) = seeded_store().await;

    let mut feed = ChangeFeed::new(store.clone(), run_id, 0);
    let (_, done) = feed.poll().await.unwrap();
    assert!(!done);

    // Deriving completion requires a settled mint with no checkpoint
    store
        .merge(
            run_id,
            PartialUpdate {
                mint: Some(curio::domain::MintReceipt {
                    tx_hash: "0xabc".to_string(),
                    token_id: "1".to_string(),
                    token_uri: "ipfs://QmMeta".to_string(),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (events, done) = feed.poll().await.unwrap();
    assert!(done);
    assert!(matches!(events.last(), Some(FeedEvent::Complete { .. })));

    // The state event carrying the mint precedes the terminal marker
    assert!(events
        .iter()
        .any(|e| matches!(e, FeedEvent::State(s) if s.state_update.contains_key("mint"))));
}
