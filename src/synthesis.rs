//! Answer synthesis from merged evidence.
//!
//! Two providers:
//!
//! - **[`ExtractiveSynthesizer`]** (default): deterministic prose that lists
//!   the strongest evidence with inline `[n]` citations. No network.
//! - **[`ChatSynthesizer`]** (`provider = "openai"`): calls an
//!   OpenAI-compatible `/chat/completions` endpoint with the numbered
//!   evidence as context.
//!
//! The chat provider retries HTTP 429 and 5xx with exponential backoff
//! (1s, 2s, 4s, ...). Any remaining failure (missing key, client error,
//! exhausted retries, unusable response) falls back to the extractive
//! answer with a warning, so synthesis never fails a resolution.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use evidence_harness_core::EvidenceItem;

use crate::config::SynthesisConfig;
use crate::orchestrator::Resolution;

/// Evidence items shown to the synthesizer.
const MAX_CITED: usize = 8;

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, resolution: &Resolution) -> Result<String>;
}

/// Create the synthesizer selected by `[synthesis] provider`.
pub fn build_synthesizer(config: &SynthesisConfig) -> Result<Box<dyn AnswerSynthesizer>> {
    match config.provider.as_str() {
        "extractive" => Ok(Box::new(ExtractiveSynthesizer)),
        "openai" => Ok(Box::new(ChatSynthesizer::new(config.clone())?)),
        other => bail!(
            "Unknown synthesis provider: '{}'. Must be extractive or openai.",
            other
        ),
    }
}

fn cite_line(n: usize, item: &EvidenceItem) -> String {
    let year = item.year.map(|y| format!(" ({})", y)).unwrap_or_default();
    let url = item
        .url
        .as_deref()
        .map(|u| format!(", {}", u))
        .unwrap_or_default();
    format!("[{}] {}{}, {}{}", n, item.title, year, item.source, url)
}

/// First sentence of a snippet, or the whole snippet if it has none.
fn lead_sentence(snippet: &str) -> &str {
    let s = snippet.trim();
    match s.find(". ") {
        Some(i) => &s[..=i],
        None => s,
    }
}

const UNAVAILABLE_NOTE: &str =
    "Note: external sources were unavailable, so this answer draws on the local corpus only.";

pub struct ExtractiveSynthesizer;

impl ExtractiveSynthesizer {
    pub fn render(resolution: &Resolution) -> String {
        let query = resolution.query.text();
        let items = resolution.merged.items();
        let mut out = String::new();

        if items.is_empty() {
            out.push_str(&format!("No evidence was found for \"{}\".", query));
        } else {
            out.push_str(&format!("Evidence for \"{}\":\n", query));
            for (i, item) in items.iter().take(MAX_CITED).enumerate() {
                let lead = lead_sentence(&item.snippet);
                if lead.is_empty() || lead == item.title {
                    out.push_str(&format!("\n- {} [{}]", item.title, i + 1));
                } else {
                    out.push_str(&format!("\n- {}: {} [{}]", item.title, lead, i + 1));
                }
            }
            out.push_str("\n\nSources:");
            for (i, item) in items.iter().take(MAX_CITED).enumerate() {
                out.push('\n');
                out.push_str(&cite_line(i + 1, item));
            }
        }

        if resolution.external_unavailable {
            out.push_str("\n\n");
            out.push_str(UNAVAILABLE_NOTE);
        }
        out
    }
}

#[async_trait]
impl AnswerSynthesizer for ExtractiveSynthesizer {
    async fn synthesize(&self, resolution: &Resolution) -> Result<String> {
        Ok(Self::render(resolution))
    }
}

/// LLM-backed synthesizer for OpenAI-compatible chat endpoints.
pub struct ChatSynthesizer {
    config: SynthesisConfig,
    model: String,
    client: reqwest::Client,
}

impl ChatSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("synthesis.model required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            model,
            client,
        })
    }

    fn prompt(resolution: &Resolution) -> String {
        let mut prompt = format!("Question: {}\n\nEvidence:\n", resolution.query.text());
        for (i, item) in resolution.merged.items().iter().take(MAX_CITED).enumerate() {
            prompt.push_str(&cite_line(i + 1, item));
            if !item.snippet.is_empty() {
                prompt.push_str(&format!("\n    {}", item.snippet));
            }
            prompt.push('\n');
        }
        if resolution.external_unavailable {
            prompt.push_str("\nExternal sources were unavailable; only local evidence is listed.\n");
        }
        prompt
    }

    /// Call the chat completions API with retry/backoff.
    async fn complete(&self, resolution: &Resolution) -> Result<String> {
        let api_key = std::env::var(&self.config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", self.config.api_key_env))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a research assistant. Answer the question using only the numbered evidence. Cite every claim inline as [n]. Say so if the evidence is insufficient."
                },
                { "role": "user", "content": Self::prompt(resolution) }
            ]
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("chat API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("chat API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("chat synthesis failed after retries")))
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))?;
    Ok(content.to_string())
}

#[async_trait]
impl AnswerSynthesizer for ChatSynthesizer {
    async fn synthesize(&self, resolution: &Resolution) -> Result<String> {
        if resolution.merged.is_empty() {
            return Ok(ExtractiveSynthesizer::render(resolution));
        }
        match self.complete(resolution).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!(error = %e, "chat synthesis failed, using extractive answer");
                Ok(ExtractiveSynthesizer::render(resolution))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidence_harness_core::{merge, LocalResultItem, LocalResultSet, Query, SufficiencyChecker};

    fn resolution(titles: &[&str], external_unavailable: bool) -> Resolution {
        let local = LocalResultSet::new(
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| LocalResultItem {
                    paper_id: format!("p{}", i),
                    title: t.to_string(),
                    year: Some(2020),
                    relevance: 1.0 - i as f64 * 0.1,
                    snippet: format!("{} is studied here. More detail follows.", t),
                })
                .collect(),
        );
        let query = Query::at_year("graph learning", 2026);
        Resolution {
            verdict: SufficiencyChecker::at_year(Default::default(), 2026).check(&query, &local),
            merged: merge(&local, &[], 30),
            query,
            used_external: external_unavailable,
            domain_label: None,
            route_outcome: None,
            external_unavailable,
        }
    }

    #[test]
    fn test_extractive_cites_every_listed_item() {
        let text = ExtractiveSynthesizer::render(&resolution(&["Graph Nets", "GNN Survey"], false));
        assert!(text.starts_with("Evidence for \"graph learning\":"));
        assert!(text.contains("- Graph Nets: Graph Nets is studied here. [1]"));
        assert!(text.contains("[2] GNN Survey (2020), local"));
        assert!(!text.contains("Note:"));
    }

    #[test]
    fn test_extractive_empty_and_unavailable() {
        let text = ExtractiveSynthesizer::render(&resolution(&[], true));
        assert!(text.starts_with("No evidence was found"));
        assert!(text.ends_with(UNAVAILABLE_NOTE));
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({"choices": [{"message": {"role": "assistant", "content": " Answer [1]. "}}]});
        assert_eq!(parse_chat_response(&json).unwrap(), "Answer [1].");
        assert!(parse_chat_response(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn test_build_synthesizer() {
        assert!(build_synthesizer(&SynthesisConfig::default()).is_ok());
        let bad = SynthesisConfig {
            provider: "openai".into(),
            ..Default::default()
        };
        assert!(build_synthesizer(&bad).is_err());
    }

    #[tokio::test]
    async fn test_chat_falls_back_without_key() {
        let config = SynthesisConfig {
            provider: "openai".into(),
            model: Some("test-model".into()),
            api_key_env: "EVH_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let synth = ChatSynthesizer::new(config).unwrap();
        let res = resolution(&["Graph Nets"], false);
        let answer = synth.synthesize(&res).await.unwrap();
        assert_eq!(answer, ExtractiveSynthesizer::render(&res));
    }
}
