//! Stage invocation wrapper.
//!
//! The pipeline only ever sees a well-formed partial update. A stage
//! that returns `Err` (instead of an error partial) is itself a bug;
//! the executor guards against it by synthesizing a terminal error
//! partial carrying an error-severity message.

use std::time::Instant;

use tracing::{debug, error};

use crate::domain::{PartialUpdate, RunRecord};
use crate::stages::{Stage, StageContext};

pub struct StageExecutor;

impl StageExecutor {
    /// Run one stage against the record. Never fails.
    pub async fn execute(
        stage: &dyn Stage,
        ctx: &StageContext,
        record: &RunRecord,
    ) -> PartialUpdate {
        let name = stage.name();
        let start = Instant::now();
        debug!(run_id = %ctx.run_id(), stage = %name, "Executing stage");

        match stage.execute(ctx, record).await {
            Ok(partial) => {
                debug!(
                    run_id = %ctx.run_id(),
                    stage = %name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = partial.is_error(),
                    "Stage returned partial"
                );
                partial
            }
            Err(err) => {
                error!(run_id = %ctx.run_id(), stage = %name, error = %err, "Stage crashed");
                PartialUpdate::terminal_error(name, format!("Stage {} crashed: {}", name, err))
            }
        }
    }
}
