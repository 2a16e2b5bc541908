//! Bounded polling loop that turns an asynchronous external vote into a
//! synchronous resolution.
//!
//! The loop terminates on natural close, on the vote's own end time, on
//! an absolute deadline, on "smart completion" (real ballots observed
//! after half the poll budget), or when the poll budget runs out.
//! Whatever happens, a VoteResolution is produced: a vote that never
//! closed and never saw a ballot resolves by timeout to option 0, and a
//! failed final-tally fetch resolves the same way as an emergency
//! fallback. The voting stage therefore always terminates.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::adapters::Ledger;
use crate::domain::{ResolvedBy, VoteResolution, VoteStatus};

/// Polling bounds
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed sleep between status queries
    pub poll_interval: Duration,

    /// Upper bound on status queries; bounds total wait
    pub max_polls: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_polls: 60,
        }
    }
}

/// Why the polling loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    NaturalClose,
    DeadlineExceeded,
    SmartCompletion,
    BudgetExhausted,
}

pub struct ResolutionPoller {
    ledger: Arc<dyn Ledger>,
    config: PollerConfig,
}

impl ResolutionPoller {
    pub fn new(ledger: Arc<dyn Ledger>, config: PollerConfig) -> Self {
        Self { ledger, config }
    }

    /// Poll the vote until it settles, then compute the final resolution.
    ///
    /// `cids` are the vote options in order; `deadline` is the vote's
    /// configured end plus a grace buffer. Never fails and never hangs:
    /// total wait is bounded by `max_polls * poll_interval`.
    pub async fn resolve(
        &self,
        vote_id: &str,
        cids: &[String],
        deadline: DateTime<Utc>,
    ) -> VoteResolution {
        let (reason, last_status) = self.poll_until_stopped(vote_id, deadline).await;

        let saw_votes = last_status.as_ref().map(VoteStatus::has_votes).unwrap_or(false);
        let closed = reason == StopReason::NaturalClose;

        // True timeout: the vote never closed and no ballot was ever
        // observed. Resolve deterministically rather than hanging or
        // surfacing an unresolved vote.
        if !closed && !saw_votes {
            debug!(vote_id, ?reason, "Vote timed out with no ballots");
            return Self::fallback_resolution(cids, ResolvedBy::Timeout);
        }

        match self.ledger.final_tally(vote_id).await {
            Ok(tally) => {
                let winner = tally.winner;
                let participation = tally.tally.values().sum();
                VoteResolution {
                    winner,
                    winner_cid: Self::winner_cid(cids, winner),
                    tally: tally.tally,
                    participation,
                    resolved_by: ResolvedBy::Natural,
                }
            }
            Err(err) => {
                warn!(vote_id, error = %err, "Final tally fetch failed, using emergency fallback");
                Self::fallback_resolution(cids, ResolvedBy::EmergencyFallback)
            }
        }
    }

    /// One bounded pass over the status endpoint
    async fn poll_until_stopped(
        &self,
        vote_id: &str,
        deadline: DateTime<Utc>,
    ) -> (StopReason, Option<VoteStatus>) {
        let mut last_status: Option<VoteStatus> = None;
        let smart_threshold = (self.config.max_polls / 2).max(1);

        for poll in 1..=self.config.max_polls {
            match self.ledger.vote_status(vote_id).await {
                Ok(status) => {
                    let is_open = status.is_open;
                    let has_votes = status.has_votes();
                    let ends_at = status.ends_at;
                    last_status = Some(status);

                    if !is_open {
                        debug!(vote_id, poll, "Vote closed naturally");
                        return (StopReason::NaturalClose, last_status);
                    }

                    let now = Utc::now();
                    if now >= ends_at || now >= deadline {
                        debug!(vote_id, poll, "Vote past its end time");
                        return (StopReason::DeadlineExceeded, last_status);
                    }

                    // Real ballots plus half the budget spent: declare
                    // done early instead of waiting out the full window.
                    // A real winner is still computed from real counts.
                    if poll >= smart_threshold && has_votes {
                        debug!(vote_id, poll, "Smart completion with live ballots");
                        return (StopReason::SmartCompletion, last_status);
                    }
                }
                Err(err) => {
                    // One failed query does not abort the poll
                    warn!(vote_id, poll, error = %err, "Vote status query failed, continuing");
                }
            }

            if poll < self.config.max_polls {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        (StopReason::BudgetExhausted, last_status)
    }

    fn winner_cid(cids: &[String], winner: usize) -> String {
        cids.get(winner)
            .or_else(|| cids.first())
            .cloned()
            .unwrap_or_default()
    }

    fn fallback_resolution(cids: &[String], resolved_by: ResolvedBy) -> VoteResolution {
        VoteResolution {
            winner: 0,
            winner_cid: Self::winner_cid(cids, 0),
            tally: BTreeMap::from([(0, 1)]),
            participation: 1,
            resolved_by,
        }
    }
}
