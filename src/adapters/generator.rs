//! Content generator adapters.
//!
//! `HttpGenerator` talks to a generation service over REST.
//! `SimGenerator` produces deterministic content for demos and tests,
//! matching the fallback artifacts the stages use when a real generator
//! is unreachable.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::Generator;
use crate::domain::{LorePack, PromptSeed};
use crate::error::{Error, Result};

/// One rendered candidate image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageCandidate {
    /// Raw image bytes (pinned by the artist stage)
    #[serde(default)]
    pub bytes: Vec<u8>,

    /// Small preview as a data URL
    pub thumbnail: String,

    /// Style note for this candidate
    pub style_note: String,
}

/// Generator backed by an HTTP generation service
pub struct HttpGenerator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn name(&self) -> &str {
        "http-generator"
    }

    async fn research(&self, date_label: &str) -> Result<LorePack> {
        let response = self
            .client
            .post(format!("{}/research", self.base_url))
            .json(&json!({ "date_label": date_label }))
            .send()
            .await?
            .error_for_status()?;

        let lore: LorePack = response.json().await?;
        Ok(lore)
    }

    async fn render(&self, seed: &PromptSeed, count: usize) -> Result<Vec<ImageCandidate>> {
        let response = self
            .client
            .post(format!("{}/render", self.base_url))
            .json(&json!({ "seed": seed, "count": count }))
            .send()
            .await?
            .error_for_status()?;

        let candidates: Vec<ImageCandidate> = response.json().await?;
        if candidates.is_empty() {
            return Err(Error::Collaborator(
                "generator returned no candidates".to_string(),
            ));
        }
        Ok(candidates)
    }
}

/// Deterministic generator for demos and tests
#[derive(Default)]
pub struct SimGenerator;

impl SimGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Tiny grayscale SVG placeholder, distinct per candidate index
    pub fn placeholder_thumbnail(index: usize) -> String {
        let shade = 0x66_u8.saturating_sub((index as u8) * 0x22);
        let svg = format!(
            "<svg width=\"200\" height=\"200\" xmlns=\"http://www.w3.org/2000/svg\">\
             <rect width=\"100%\" height=\"100%\" fill=\"#{shade:02x}{shade:02x}{shade:02x}\"/>\
             <text x=\"50%\" y=\"50%\" font-size=\"16\" fill=\"#fff\" \
             text-anchor=\"middle\" dy=\".3em\">Art #{n}</text></svg>",
            shade = shade,
            n = index + 1,
        );
        format!("data:image/svg+xml;utf8,{}", svg)
    }

    fn style_note(index: usize) -> String {
        const NOTES: [&str; 4] = [
            "Geometric blockchain visualization with crystalline structures",
            "Network topology with flowing data streams",
            "Abstract representation of decentralized nodes",
            "Futuristic digital architecture with electric accents",
        ];
        NOTES[index % NOTES.len()].to_string()
    }
}

#[async_trait]
impl Generator for SimGenerator {
    fn name(&self) -> &str {
        "sim-generator"
    }

    async fn research(&self, date_label: &str) -> Result<LorePack> {
        Ok(LorePack::fallback(date_label))
    }

    async fn render(&self, _seed: &PromptSeed, count: usize) -> Result<Vec<ImageCandidate>> {
        Ok((0..count)
            .map(|i| ImageCandidate {
                bytes: format!("candidate-{}", i).into_bytes(),
                thumbnail: Self::placeholder_thumbnail(i),
                style_note: Self::style_note(i),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sim_generator_is_deterministic() {
        let generator = SimGenerator::new();
        let a = generator.research("2015-07-30").await.unwrap();
        let b = generator.research("2015-07-30").await.unwrap();
        assert_eq!(a, b);
        assert!(a.summary_md.contains("2015-07-30"));
        assert!(!a.sources.is_empty());
    }

    #[tokio::test]
    async fn test_sim_render_count() {
        let generator = SimGenerator::new();
        let seed = generator.research("x").await.unwrap().prompt_seed;
        let candidates = generator.render(&seed, 4).await.unwrap();
        assert_eq!(candidates.len(), 4);
        assert_ne!(candidates[0].thumbnail, candidates[1].thumbnail);
    }
}
