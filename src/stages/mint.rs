//! Mint stage: metadata assembly and settlement.
//!
//! Builds the NFT metadata for the winning candidate, pins it, and asks
//! the ledger to settle the mint. Settlement failures downgrade to a
//! deterministic simulated receipt with a warning; missing prior-stage
//! outputs terminate the run. Pauses at the finalize checkpoint so a
//! human confirms the settled mint.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::{Stage, StageContext};
use crate::adapters::Ledger;
use crate::domain::{
    Checkpoint, Link, LorePack, Message, MintReceipt, PartialUpdate, RunRecord, StageName,
};
use crate::error::Result;

pub struct MintStage {
    ledger: Arc<dyn Ledger>,
}

impl MintStage {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    fn metadata(record: &RunRecord, lore: &LorePack, winner_cid: &str) -> serde_json::Value {
        json!({
            "name": format!("{} — Historical Moment", record.date_label),
            "description": lore.summary_md,
            "image": winner_cid,
            "attributes": [
                { "trait_type": "Date", "value": record.date_label },
                { "trait_type": "WinnerCID", "value": winner_cid },
                { "trait_type": "Sources", "value": lore.sources.len() },
            ],
            "properties": {
                "summary_md": lore.summary_md,
                "sources": lore.sources,
                "prompt_seed": lore.prompt_seed,
            },
        })
    }

    /// Deterministic receipt used when settlement is unreachable
    fn fallback_receipt(record: &RunRecord) -> MintReceipt {
        let id = record.run_id.simple().to_string();
        MintReceipt {
            tx_hash: format!("0x{}", id),
            token_id: "1".to_string(),
            token_uri: format!("ipfs://QmMetadata{}", &id[..16]),
        }
    }
}

#[async_trait]
impl Stage for MintStage {
    fn name(&self) -> StageName {
        StageName::Mint
    }

    async fn execute(&self, ctx: &StageContext, record: &RunRecord) -> Result<PartialUpdate> {
        let (lore, session, resolution) = match (&record.lore, &record.vote) {
            (Some(lore), Some(session)) => match &session.result {
                Some(resolution) => (lore, session, resolution),
                None => {
                    return Ok(PartialUpdate::terminal_error(
                        StageName::Mint,
                        "Vote is unresolved; cannot settle mint",
                    ))
                }
            },
            _ => {
                return Ok(PartialUpdate::terminal_error(
                    StageName::Mint,
                    "Missing lore or vote result for mint",
                ))
            }
        };

        let winner_cid = resolution.winner_cid.clone();
        ctx.emit(Message::info(
            StageName::Mint,
            format!("Settling mint for winner {}", winner_cid),
        ))
        .await?;

        let metadata = Self::metadata(record, lore, &winner_cid);
        let settled = async {
            let metadata_cid = self.ledger.pin_metadata(&metadata).await?;
            let receipt = self
                .ledger
                .settle_mint(&session.vote_id, &winner_cid, &metadata_cid)
                .await?;
            Ok::<MintReceipt, crate::error::Error>(receipt)
        }
        .await;

        let (receipt, message) = match settled {
            Ok(receipt) => {
                let message = Message::info(
                    StageName::Mint,
                    format!("Minted token {} for the winning art", receipt.token_id),
                )
                .with_links(vec![
                    Link::new("Transaction", format!("https://explorer.example/tx/{}", receipt.tx_hash)),
                    Link::new("Metadata", &receipt.token_uri),
                    Link::new("Winner Art", &winner_cid),
                ]);
                (receipt, message)
            }
            Err(err) => {
                warn!(run_id = %ctx.run_id(), error = %err, "Settlement failed, recording simulated receipt");
                let receipt = Self::fallback_receipt(record);
                let message = Message::warning(
                    StageName::Mint,
                    format!("Settlement unavailable ({}), recorded simulated receipt", err),
                );
                (receipt, message)
            }
        };

        Ok(PartialUpdate {
            mint: Some(receipt),
            messages: vec![message],
            ..Default::default()
        }
        .with_checkpoint(Checkpoint::FinalizeMint))
    }
}
