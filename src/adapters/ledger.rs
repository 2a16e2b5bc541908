//! Ledger adapters: pinning, votes and settlement.
//!
//! `HttpLedger` speaks to a ledger gateway over REST with bounded
//! retries. `SimLedger` runs a deterministic in-process vote lifecycle
//! so the whole pipeline can be exercised with no external services.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::Ledger;
use crate::domain::{FinalTally, MintReceipt, PreparedTx, VoteConfig, VoteStatus};
use crate::error::{Error, Result};

/// Ledger backed by an HTTP gateway
pub struct HttpLedger {
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct StartVoteResponse {
    vote_id: String,
    tx: PreparedTx,
}

#[derive(Debug, Deserialize)]
struct VoteStatusResponse {
    open: bool,
    tallies: Vec<u64>,
    #[serde(rename = "endsAt")]
    ends_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TallyResponse {
    winner: usize,
    tally: BTreeMap<usize, u64>,
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    cid: String,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_retry(base_url, 3, Duration::from_secs(1))
    }

    pub fn with_retry(
        base_url: impl Into<String>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            max_retries,
            retry_delay,
        }
    }

    /// POST a JSON body with exponential backoff on transport errors
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..self.max_retries {
            let result = async {
                let response = self
                    .client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<T, Error>(response.json::<T>().await?)
            }
            .await;

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(%url, attempt, error = %err, "Ledger call failed");
                    last_err = Some(err);
                    // No sleep after the last attempt; the caller gets
                    // the error immediately.
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.retry_delay * 2u32.pow(attempt)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Collaborator("ledger unreachable".to_string())))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    fn name(&self) -> &str {
        "http-ledger"
    }

    async fn pin_image(&self, bytes: &[u8]) -> Result<String> {
        // The gateway accepts base64-encoded payloads for small images
        let encoded: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        let response: PinResponse = self
            .post_json("/ledger/pin", json!({ "data_hex": encoded }))
            .await?;
        Ok(response.cid)
    }

    async fn pin_metadata(&self, metadata: &serde_json::Value) -> Result<String> {
        let response: PinResponse = self
            .post_json("/ledger/pin_metadata", metadata.clone())
            .await?;
        Ok(response.cid)
    }

    async fn start_vote(
        &self,
        cids: &[String],
        config: &VoteConfig,
    ) -> Result<(String, PreparedTx)> {
        let response: StartVoteResponse = self
            .post_json(
                "/ledger/start_vote",
                json!({ "artCids": cids, "cfg": config }),
            )
            .await?;
        Ok((response.vote_id, response.tx))
    }

    async fn vote_status(&self, vote_id: &str) -> Result<VoteStatus> {
        let response: VoteStatusResponse = self
            .get_json("/ledger/vote_status", &[("vote_id", vote_id)])
            .await?;
        Ok(VoteStatus {
            is_open: response.open,
            counts: response.tallies,
            ends_at: response.ends_at,
        })
    }

    async fn final_tally(&self, vote_id: &str) -> Result<FinalTally> {
        let response: TallyResponse = self
            .post_json("/ledger/tally_vote", json!({ "vote_id": vote_id }))
            .await?;
        Ok(FinalTally {
            winner: response.winner,
            tally: response.tally,
        })
    }

    async fn settle_mint(
        &self,
        vote_id: &str,
        winner_cid: &str,
        metadata_cid: &str,
    ) -> Result<MintReceipt> {
        let receipt: MintReceipt = self
            .post_json(
                "/ledger/mint_final",
                json!({
                    "vote_id": vote_id,
                    "winner_cid": winner_cid,
                    "metadata_cid": metadata_cid,
                }),
            )
            .await?;
        Ok(receipt)
    }
}

/// In-process ledger with a deterministic vote lifecycle.
///
/// A vote opens at `start_vote` and closes after its configured
/// duration. Ballots appear once a quarter of the duration has elapsed,
/// with option 0 leading, so both the natural-close and smart-completion
/// paths are reachable in a demo.
pub struct SimLedger {
    votes: DashMap<String, SimVote>,
}

struct SimVote {
    option_count: usize,
    opened_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    duration: chrono::Duration,
}

impl SimVote {
    fn counts(&self, now: DateTime<Utc>) -> Vec<u64> {
        let elapsed = now - self.opened_at;
        if elapsed * 4 < self.duration {
            return vec![0; self.option_count];
        }
        // Option 0 leads a fixed scripted tally
        const SCRIPT: [u64; 4] = [3, 1, 0, 1];
        (0..self.option_count)
            .map(|i| SCRIPT.get(i).copied().unwrap_or(0))
            .collect()
    }
}

impl SimLedger {
    pub fn new() -> Self {
        Self {
            votes: DashMap::new(),
        }
    }

    fn sim_cid(prefix: &str) -> String {
        format!("ipfs://Qm{}{}", prefix, &Uuid::new_v4().simple().to_string()[..16])
    }
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for SimLedger {
    fn name(&self) -> &str {
        "sim-ledger"
    }

    async fn pin_image(&self, _bytes: &[u8]) -> Result<String> {
        Ok(Self::sim_cid("Img"))
    }

    async fn pin_metadata(&self, _metadata: &serde_json::Value) -> Result<String> {
        Ok(Self::sim_cid("Meta"))
    }

    async fn start_vote(
        &self,
        cids: &[String],
        config: &VoteConfig,
    ) -> Result<(String, PreparedTx)> {
        if cids.is_empty() {
            return Err(Error::Collaborator("no options to vote on".to_string()));
        }

        let vote_id = format!("vote_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let now = Utc::now();
        let duration = chrono::Duration::seconds(config.duration_s as i64);
        self.votes.insert(
            vote_id.clone(),
            SimVote {
                option_count: cids.len(),
                opened_at: now,
                ends_at: now + duration,
                duration,
            },
        );

        let tx = PreparedTx {
            to: "0x000000000000000000000000000000000000c0de".to_string(),
            data: format!("0x{}", Uuid::new_v4().simple()),
            value: None,
            gas: Some(120_000),
        };
        Ok((vote_id, tx))
    }

    async fn vote_status(&self, vote_id: &str) -> Result<VoteStatus> {
        let vote = self
            .votes
            .get(vote_id)
            .ok_or_else(|| Error::Collaborator(format!("unknown vote {}", vote_id)))?;

        let now = Utc::now();
        Ok(VoteStatus {
            is_open: now < vote.ends_at,
            counts: vote.counts(now),
            ends_at: vote.ends_at,
        })
    }

    async fn final_tally(&self, vote_id: &str) -> Result<FinalTally> {
        let vote = self
            .votes
            .get(vote_id)
            .ok_or_else(|| Error::Collaborator(format!("unknown vote {}", vote_id)))?;

        let counts = vote.counts(vote.ends_at);
        let winner = counts
            .iter()
            .enumerate()
            .max_by_key(|(_, &c)| c)
            .map(|(i, _)| i)
            .unwrap_or(0);

        Ok(FinalTally {
            winner,
            tally: counts.into_iter().enumerate().map(|(i, c)| (i, c)).collect(),
        })
    }

    async fn settle_mint(
        &self,
        _vote_id: &str,
        _winner_cid: &str,
        metadata_cid: &str,
    ) -> Result<MintReceipt> {
        Ok(MintReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            token_id: "1".to_string(),
            token_uri: metadata_cid.to_string(),
        })
    }
}
