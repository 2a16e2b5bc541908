//! Vote stages: opening the on-chain vote and resolving it.
//!
//! `VoteOpenStage` asks the ledger to start a vote over the art set.
//! There is no sane fallback for a vote that failed to open, so that
//! failure terminates the run. `VoteResolveStage` drives the resolution
//! poller and writes the result into the vote session in place; it
//! always produces a resolution.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use super::{Stage, StageContext};
use crate::adapters::Ledger;
use crate::core::poller::{PollerConfig, ResolutionPoller};
use crate::domain::{
    Link, Message, PartialUpdate, ResolvedBy, RunRecord, StageName, VoteConfig, VoteSession,
};
use crate::error::Result;

pub struct VoteOpenStage {
    ledger: Arc<dyn Ledger>,
    config: VoteConfig,
}

impl VoteOpenStage {
    pub fn new(ledger: Arc<dyn Ledger>, config: VoteConfig) -> Self {
        Self { ledger, config }
    }
}

#[async_trait]
impl Stage for VoteOpenStage {
    fn name(&self) -> StageName {
        StageName::VoteOpen
    }

    async fn execute(&self, ctx: &StageContext, record: &RunRecord) -> Result<PartialUpdate> {
        let art = match &record.art {
            Some(art) => art,
            None => {
                return Ok(PartialUpdate::terminal_error(
                    StageName::VoteOpen,
                    "No art available for voting",
                ))
            }
        };

        match self.ledger.start_vote(&art.cids, &self.config).await {
            Ok((vote_id, tx)) => {
                info!(run_id = %ctx.run_id(), %vote_id, "Vote opened");
                let links = art
                    .cids
                    .iter()
                    .enumerate()
                    .map(|(i, cid)| Link::new(format!("Option {}", i + 1), cid))
                    .collect();
                let message = Message::info(
                    StageName::VoteOpen,
                    format!("Started vote {} with {} options", vote_id, art.option_count()),
                )
                .with_links(links);

                Ok(PartialUpdate {
                    vote: Some(VoteSession {
                        vote_id,
                        config: self.config.clone(),
                        pending_tx: Some(tx),
                        result: None,
                    }),
                    messages: vec![message],
                    ..Default::default()
                })
            }
            Err(err) => Ok(PartialUpdate::terminal_error(
                StageName::VoteOpen,
                format!("Vote creation failed: {}", err),
            )),
        }
    }
}

pub struct VoteResolveStage {
    ledger: Arc<dyn Ledger>,
    poller_config: PollerConfig,
    /// Extra wait past the vote's configured duration
    grace: chrono::Duration,
}

impl VoteResolveStage {
    pub fn new(ledger: Arc<dyn Ledger>, poller_config: PollerConfig, grace_s: u64) -> Self {
        Self {
            ledger,
            poller_config,
            grace: chrono::Duration::seconds(grace_s as i64),
        }
    }
}

#[async_trait]
impl Stage for VoteResolveStage {
    fn name(&self) -> StageName {
        StageName::VoteResolve
    }

    async fn execute(&self, ctx: &StageContext, record: &RunRecord) -> Result<PartialUpdate> {
        let (session, art) = match (&record.vote, &record.art) {
            (Some(vote), Some(art)) => (vote, art),
            _ => {
                return Ok(PartialUpdate::terminal_error(
                    StageName::VoteResolve,
                    "Missing vote or art data for tally",
                ))
            }
        };

        ctx.emit(Message::info(
            StageName::VoteResolve,
            format!("Waiting for vote {} to settle", session.vote_id),
        ))
        .await?;

        let deadline =
            Utc::now() + chrono::Duration::seconds(session.config.duration_s as i64) + self.grace;
        let poller = ResolutionPoller::new(self.ledger.clone(), self.poller_config.clone());
        let resolution = poller.resolve(&session.vote_id, &art.cids, deadline).await;

        let message = match resolution.resolved_by {
            ResolvedBy::Natural => Message::info(
                StageName::VoteResolve,
                format!("Vote completed! Winner: {}", resolution.winner_cid),
            )
            .with_links(vec![Link::new("Winning Art", &resolution.winner_cid)]),
            ResolvedBy::Timeout => Message::warning(
                StageName::VoteResolve,
                format!(
                    "Vote timed out with no ballots; defaulting to {}",
                    resolution.winner_cid
                ),
            ),
            ResolvedBy::EmergencyFallback => Message::warning(
                StageName::VoteResolve,
                format!(
                    "Final tally unavailable; defaulting to {}",
                    resolution.winner_cid
                ),
            ),
        };

        // The one in-place artifact update in the pipeline: the session
        // written by vote_open gains its result.
        let mut updated = session.clone();
        updated.result = Some(resolution);

        Ok(PartialUpdate {
            vote: Some(updated),
            messages: vec![message],
            ..Default::default()
        })
    }
}
