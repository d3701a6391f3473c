//! OpenAI-compatible chat completion client.
//!
//! Sends the assembled message list to `POST {base_url}/chat/completions`
//! and returns the first choice's content. Single attempt: a turn that
//! fails here is reported to the user, not retried.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rag_chat_core::completion::ChatCompletion;
use rag_chat_core::error::{ChatError, Result};
use rag_chat_core::ConversationEntry;
use serde::Serialize;

use crate::config::{api_key_from_env, CompletionConfig};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationEntry],
    stream: bool,
    n: u32,
}

pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &CompletionConfig) -> anyhow::Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env);
        if api_key.is_none() {
            tracing::warn!(var = %config.api_key_env, "completion API key not set");
        }
        Self::new(&config.base_url, api_key, config.model.clone(), config.timeout())
    }
}

fn completion_err(e: impl std::fmt::Display) -> ChatError {
    ChatError::CompletionBackend(e.to_string())
}

/// Extract `choices[0].message.content`.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| completion_err("response has no choices[0].message.content"))
}

#[async_trait]
impl ChatCompletion for OpenAiChat {
    async fn complete(&self, messages: &[ConversationEntry]) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            n: 1,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(model = %self.model, messages = messages.len(), "requesting completion");
        let response = request.send().await.map_err(completion_err)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(completion_err(format!("{}: {}", status, body_text)));
        }

        let json: serde_json::Value = response.json().await.map_err(completion_err)?;
        parse_completion(&json)
    }
}
