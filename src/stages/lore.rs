//! Lore stage: research and context generation.
//!
//! Produces a LorePack for the run's date label and pauses the pipeline
//! at the lore approval checkpoint. A generator failure downgrades to a
//! deterministic fallback pack with a warning; research never fails the
//! run.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Stage, StageContext};
use crate::adapters::Generator;
use crate::domain::{Checkpoint, Link, LorePack, Message, PartialUpdate, RunRecord, StageName};
use crate::error::Result;

pub struct LoreStage {
    generator: Arc<dyn Generator>,
}

impl LoreStage {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for LoreStage {
    fn name(&self) -> StageName {
        StageName::Lore
    }

    async fn execute(&self, ctx: &StageContext, record: &RunRecord) -> Result<PartialUpdate> {
        let date_label = &record.date_label;
        ctx.emit(Message::info(
            StageName::Lore,
            format!("Researching historical context for {}", date_label),
        ))
        .await?;

        let (lore, message) = match self.generator.research(date_label).await {
            Ok(lore) => {
                let links = lore
                    .sources
                    .iter()
                    .take(3)
                    .enumerate()
                    .map(|(i, url)| Link::new(format!("Source {}", i + 1), url))
                    .collect();
                let message =
                    Message::info(StageName::Lore, format!("Generated lore for {}", date_label))
                        .with_links(links);
                (lore, message)
            }
            Err(err) => {
                warn!(run_id = %ctx.run_id(), error = %err, "Generator failed, using fallback lore");
                let message = Message::warning(
                    StageName::Lore,
                    format!("Generator unavailable ({}), using fallback lore", err),
                );
                (LorePack::fallback(date_label), message)
            }
        };

        Ok(PartialUpdate {
            lore: Some(lore),
            messages: vec![message],
            ..Default::default()
        }
        .with_checkpoint(Checkpoint::LoreApproval))
    }
}
