//! Command-line interface for curio.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::{Generator, HttpGenerator, HttpLedger, Ledger, SimGenerator, SimLedger};
use crate::api;
use crate::config::Config;
use crate::core::{MemoryRunStore, Pipeline, PipelineState, RunController, RunStore};

/// curio - run-state orchestrator for a multi-stage curation pipeline
#[derive(Parser, Debug)]
#[command(name = "curio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides CURIO_BIND)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Execute one run locally and print the final record as JSON
    Run {
        /// Date label to curate, e.g. "2015-07-30"
        date_label: String,
    },

    /// Fetch a run's current record from a running server
    Status {
        /// Run id to look up
        run_id: uuid::Uuid,

        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        url: String,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Config::from_env();
        match self.command {
            Commands::Serve { bind } => serve(config, bind).await,
            Commands::Run { date_label } => run_once(config, date_label).await,
            Commands::Status { run_id, url } => status(run_id, url).await,
        }
    }
}

async fn status(run_id: uuid::Uuid, url: String) -> Result<()> {
    let response = reqwest::Client::new()
        .get(format!("{}/runs/{}", url.trim_end_matches('/'), run_id))
        .send()
        .await?
        .error_for_status()?;
    let record: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn build_adapters(config: &Config) -> (Arc<dyn Generator>, Arc<dyn Ledger>) {
    let generator: Arc<dyn Generator> = match &config.generator_url {
        Some(url) => Arc::new(HttpGenerator::new(url.clone())),
        None => Arc::new(SimGenerator::new()),
    };
    let ledger: Arc<dyn Ledger> = match &config.ledger_url {
        Some(url) => Arc::new(HttpLedger::new(url.clone())),
        None => Arc::new(SimLedger::new()),
    };
    (generator, ledger)
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let (generator, ledger) = build_adapters(&config);
    info!(generator = generator.name(), ledger = ledger.name(), "Adapters selected");

    let store: Arc<dyn RunStore> = Arc::new(MemoryRunStore::new());
    let pipeline = Arc::new(Pipeline::standard(
        store.clone(),
        generator,
        ledger,
        config.pipeline_settings(),
    ));
    let controller = Arc::new(RunController::new(store, pipeline));

    let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());
    api::serve(controller, config.feed_config(), &bind_addr).await
}

/// One local pipeline run with checkpoints auto-approved; handy for
/// smoke-testing adapters without a client.
async fn run_once(config: Config, date_label: String) -> Result<()> {
    use crate::domain::{Message, PartialUpdate, StageName};

    let (generator, ledger) = build_adapters(&config);
    let store: Arc<dyn RunStore> = Arc::new(MemoryRunStore::new());
    let pipeline = Pipeline::standard(
        store.clone(),
        generator,
        ledger,
        config.pipeline_settings(),
    );

    let run_id = uuid::Uuid::new_v4();
    store
        .create(crate::domain::RunRecord::new(run_id, date_label))
        .await?;

    let mut start = 0;
    loop {
        match pipeline.run_from(run_id, start).await? {
            PipelineState::Paused(checkpoint) => {
                info!(%checkpoint, "Auto-approving checkpoint");
                store
                    .merge(
                        run_id,
                        PartialUpdate {
                            checkpoint: Some(None),
                            messages: vec![Message::info(
                                StageName::System,
                                format!("Checkpoint {} auto-approved", checkpoint),
                            )],
                            ..Default::default()
                        },
                    )
                    .await?;
                start = checkpoint.resume_index();
            }
            state => {
                info!(?state, "Pipeline finished");
                let record = store.get(run_id).await?;
                println!("{}", serde_json::to_string_pretty(&record)?);
                return Ok(());
            }
        }
    }
}
