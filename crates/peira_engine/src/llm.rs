//! Chat-completions client for the generation collaborator.
//!
//! Talks the OpenAI-compatible endpoint Groq exposes. Without an API key
//! the client serves deterministic mock completions, which keeps local
//! runs and tests off the network. Transient failures (408/429/5xx,
//! transport errors) are retried with exponential backoff; client errors
//! fail immediately.

use anyhow::{Context, Result};
use async_trait::async_trait;
use peira_core::config::LlmConfig;
use peira_core::{ChatTurn, LanguageModel};
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const MAX_ATTEMPTS: u32 = 3;

pub struct GroqClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

impl GroqClient {
    pub fn new(cfg: &LlmConfig) -> Self {
        let api_key = std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} not set, language model runs in mock mode",
                cfg.api_key_env
            );
        }
        Self {
            client: Client::new(),
            api_key,
            model: cfg.model.clone(),
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
    }

    async fn complete(&self, prompt: &str, api_key: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut delay = Duration::from_secs(1);
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let sent = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: serde_json::Value =
                            response.json().await.context("Failed to parse completion")?;
                        let content = parsed["choices"][0]["message"]["content"]
                            .as_str()
                            .context("Completion had no content")?
                            .trim()
                            .to_string();
                        return Ok(content);
                    }
                    if !Self::is_retryable(status) {
                        let text = response.text().await.unwrap_or_default();
                        anyhow::bail!("Completion API error ({}): {}", status, text);
                    }
                    tracing::warn!("Completion attempt {} got {}, retrying", attempt, status);
                    last_err = Some(anyhow::anyhow!("status {}", status));
                }
                Err(e) => {
                    tracing::warn!("Completion attempt {} failed: {}", attempt, e);
                    last_err = Some(e.into());
                }
            }

            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("completion retries exhausted")))
    }
}

#[async_trait]
impl LanguageModel for GroqClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match &self.api_key {
            Some(key) => self.complete(prompt, key).await,
            None => Ok(format!(
                "(mock) Considered your {}-character prompt and have no model to answer with.",
                prompt.chars().count()
            )),
        }
    }
}

/// Assemble the generation prompt: retrieved context, recent history for
/// continuity, then the question.
pub fn build_prompt(knowledge: &[String], history: &[ChatTurn], question: &str) -> String {
    let context = if knowledge.is_empty() {
        "No additional context available.".to_string()
    } else {
        knowledge.join("\n")
    };

    let mut prompt = format!("Context: {}\n\n", context);
    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for turn in history {
            prompt.push_str(&format!("User: {}\nAssistant: {}\n", turn.message, turn.response));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("Question: {}\n\nAnswer:", question));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mode_answers_without_network() {
        let cfg = LlmConfig {
            api_key_env: "PEIRA_TEST_ABSENT_KEY".to_string(),
            ..Default::default()
        };
        let client = GroqClient::new(&cfg);
        let out = client.generate("hello").await.unwrap();
        assert!(out.contains("5-character"));
    }

    #[test]
    fn prompt_includes_context_history_and_question() {
        let history = vec![ChatTurn {
            user_id: "u".into(),
            message: "hi".into(),
            response: "hello".into(),
            timestamp: 0,
        }];
        let prompt = build_prompt(
            &["rust is fast".to_string()],
            &history,
            "how fast is rust",
        );
        assert!(prompt.starts_with("Context: rust is fast"));
        assert!(prompt.contains("User: hi"));
        assert!(prompt.ends_with("Question: how fast is rust\n\nAnswer:"));
    }

    #[test]
    fn empty_knowledge_gets_placeholder_context() {
        let prompt = build_prompt(&[], &[], "q");
        assert!(prompt.contains("No additional context available."));
    }
}
