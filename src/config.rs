//! Configuration for the curio server.
//!
//! Everything is environment-driven with sensible demo defaults.
//! Collaborator base URLs are optional; when absent, the corresponding
//! simulated adapter is used so the whole pipeline runs standalone.

use std::time::Duration;

use crate::core::{FeedConfig, PipelineSettings, PollerConfig};
use crate::domain::VoteConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to (CURIO_BIND)
    pub bind_addr: String,

    /// Ledger gateway base URL (CURIO_LEDGER_URL); sim ledger if unset
    pub ledger_url: Option<String>,

    /// Generator service base URL (CURIO_GENERATOR_URL); sim if unset
    pub generator_url: Option<String>,

    /// Number of art candidates per run (CURIO_ART_CANDIDATES)
    pub art_candidates: usize,

    /// Vote duration in seconds (CURIO_VOTE_DURATION_S)
    pub vote_duration_s: u64,

    /// Grace buffer past the vote duration (CURIO_VOTE_GRACE_S)
    pub vote_grace_s: u64,

    /// Seconds between vote status polls (CURIO_POLL_INTERVAL_S)
    pub poll_interval_s: u64,

    /// Poll budget for vote resolution (CURIO_MAX_POLLS)
    pub max_polls: u32,

    /// Seconds between feed polls (CURIO_FEED_INTERVAL_S)
    pub feed_interval_s: u64,

    /// Feed wall-clock cap in seconds (CURIO_FEED_MAX_S)
    pub feed_max_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            ledger_url: None,
            generator_url: None,
            art_candidates: 4,
            vote_duration_s: 120,
            vote_grace_s: 30,
            poll_interval_s: 5,
            max_polls: 60,
            feed_interval_s: 1,
            feed_max_s: 600,
        }
    }
}

impl Config {
    /// Load from environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_string("CURIO_BIND").unwrap_or(defaults.bind_addr),
            ledger_url: env_string("CURIO_LEDGER_URL"),
            generator_url: env_string("CURIO_GENERATOR_URL"),
            art_candidates: env_parse("CURIO_ART_CANDIDATES").unwrap_or(defaults.art_candidates),
            vote_duration_s: env_parse("CURIO_VOTE_DURATION_S").unwrap_or(defaults.vote_duration_s),
            vote_grace_s: env_parse("CURIO_VOTE_GRACE_S").unwrap_or(defaults.vote_grace_s),
            poll_interval_s: env_parse("CURIO_POLL_INTERVAL_S").unwrap_or(defaults.poll_interval_s),
            max_polls: env_parse("CURIO_MAX_POLLS").unwrap_or(defaults.max_polls),
            feed_interval_s: env_parse("CURIO_FEED_INTERVAL_S").unwrap_or(defaults.feed_interval_s),
            feed_max_s: env_parse("CURIO_FEED_MAX_S").unwrap_or(defaults.feed_max_s),
        }
    }

    /// Pipeline tunables derived from this config
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            art_candidates: self.art_candidates,
            vote: VoteConfig {
                duration_s: self.vote_duration_s,
                ..VoteConfig::default()
            },
            poller: PollerConfig {
                poll_interval: Duration::from_secs(self.poll_interval_s),
                max_polls: self.max_polls,
            },
            vote_grace_s: self.vote_grace_s,
        }
    }

    /// Feed tunables derived from this config
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            poll_interval: Duration::from_secs(self.feed_interval_s),
            max_duration: Duration::from_secs(self.feed_max_s),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
