//! Artist stage: candidate image generation and pinning.
//!
//! Renders candidates from the approved lore's prompt seed and pins each
//! one. Any generator or pinning failure downgrades to the placeholder
//! art set with a warning; a missing lore pack terminates the run.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Stage, StageContext};
use crate::adapters::{Generator, Ledger};
use crate::domain::{ArtSet, Link, Message, PartialUpdate, RunRecord, StageName};
use crate::error::Result;

pub struct ArtistStage {
    generator: Arc<dyn Generator>,
    ledger: Arc<dyn Ledger>,
    candidates: usize,
}

impl ArtistStage {
    pub fn new(generator: Arc<dyn Generator>, ledger: Arc<dyn Ledger>, candidates: usize) -> Self {
        Self {
            generator,
            ledger,
            candidates,
        }
    }

    /// Render and pin the full candidate set
    async fn produce_art(&self, record: &RunRecord) -> Result<ArtSet> {
        let lore = record
            .lore
            .as_ref()
            .ok_or_else(|| crate::error::Error::Validation("missing lore".to_string()))?;

        let candidates = self
            .generator
            .render(&lore.prompt_seed, self.candidates)
            .await?;

        let mut cids = Vec::with_capacity(candidates.len());
        let mut thumbnails = Vec::with_capacity(candidates.len());
        let mut style_notes = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let cid = self.ledger.pin_image(&candidate.bytes).await?;
            cids.push(cid);
            thumbnails.push(candidate.thumbnail);
            style_notes.push(candidate.style_note);
        }

        Ok(ArtSet {
            cids,
            thumbnails,
            style_notes,
        })
    }
}

#[async_trait]
impl Stage for ArtistStage {
    fn name(&self) -> StageName {
        StageName::Artist
    }

    async fn execute(&self, ctx: &StageContext, record: &RunRecord) -> Result<PartialUpdate> {
        if record.lore.is_none() {
            return Ok(PartialUpdate::terminal_error(
                StageName::Artist,
                "No lore available for art generation",
            ));
        }

        ctx.emit(Message::info(
            StageName::Artist,
            format!("Generating {} art candidates", self.candidates),
        ))
        .await?;

        let (art, message) = match self.produce_art(record).await {
            Ok(art) => {
                let links = art
                    .cids
                    .iter()
                    .enumerate()
                    .map(|(i, cid)| Link::new(format!("Art #{}", i + 1), cid))
                    .collect();
                let message = Message::info(
                    StageName::Artist,
                    format!("Generated and pinned {} art pieces", art.cids.len()),
                )
                .with_links(links);
                (art, message)
            }
            Err(err) => {
                warn!(run_id = %ctx.run_id(), error = %err, "Art generation failed, using placeholders");
                let art = ArtSet::placeholder(self.candidates);
                let message = Message::warning(
                    StageName::Artist,
                    format!("Art generation failed ({}), using placeholder candidates", err),
                );
                (art, message)
            }
        };

        Ok(PartialUpdate {
            art: Some(art),
            messages: vec![message],
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SimGenerator, SimLedger};
    use crate::core::store::{MemoryRunStore, RunStore};
    use crate::domain::{LorePack, RunRecord};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_missing_lore_is_terminal() {
        let store = Arc::new(MemoryRunStore::new());
        let run_id = Uuid::new_v4();
        store
            .create(RunRecord::new(run_id, "2015-07-30"))
            .await
            .unwrap();

        let stage = ArtistStage::new(Arc::new(SimGenerator::new()), Arc::new(SimLedger::new()), 4);
        let ctx = StageContext::new(run_id, store.clone());
        let record = store.get(run_id).await.unwrap();

        let partial = stage.execute(&ctx, &record).await.unwrap();
        assert!(partial.is_error());
        assert!(partial.art.is_none());
    }

    #[tokio::test]
    async fn test_produces_pinned_candidates() {
        let store = Arc::new(MemoryRunStore::new());
        let run_id = Uuid::new_v4();
        let mut record = RunRecord::new(run_id, "2015-07-30");
        record.lore = Some(LorePack::fallback("2015-07-30"));
        store.create(record.clone()).await.unwrap();

        let stage = ArtistStage::new(Arc::new(SimGenerator::new()), Arc::new(SimLedger::new()), 4);
        let ctx = StageContext::new(run_id, store.clone());

        let partial = stage.execute(&ctx, &record).await.unwrap();
        let art = partial.art.unwrap();
        assert_eq!(art.cids.len(), 4);
        assert_eq!(art.style_notes.len(), 4);
        assert!(art.cids[0].starts_with("ipfs://"));
    }
}
