//! Chat completion providers.
//!
//! [`ChatProvider`] is the seam between the agent and the language model.
//! The only built-in backend, [`OpenAiChatProvider`], speaks the OpenAI
//! `chat/completions` protocol, which Gemini also serves through its
//! OpenAI-compatible base URL (the default configuration).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use context_agent_core::models::TurnView;

use crate::config::{env_secret, LlmConfig};
use crate::http::{client_with_timeout, join_url, post_json_with_retry};

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the system prompt, prior turns, and the new user message.
    ///
    /// `Ok(None)` means the model answered without any content.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[TurnView],
        user_message: &str,
    ) -> Result<Option<String>>;
}

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    reasoning_effort: Option<String>,
    max_retries: u32,
}

impl OpenAiChatProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = env_secret(&config.api_key_env)
            .ok_or_else(|| anyhow!("{} environment variable not set", config.api_key_env))?;

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            endpoint: join_url(&config.base_url, "chat/completions"),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            reasoning_effort: config
                .reasoning_effort
                .clone()
                .filter(|effort| !effort.trim().is_empty()),
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, system_prompt: &str, history: &[TurnView], user_message: &str) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(json!({ "role": "system", "content": system_prompt }));
        messages.extend(
            history
                .iter()
                .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content })),
        );
        messages.push(json!({ "role": "user", "content": user_message }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if let Some(effort) = &self.reasoning_effort {
            body["reasoning_effort"] = json!(effort);
        }
        body
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[TurnView],
        user_message: &str,
    ) -> Result<Option<String>> {
        let body = self.request_body(system_prompt, history, user_message);
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "Chat",
        )
        .await?;
        parse_completion(&json)
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn parse_completion(json: &Value) -> Result<Option<String>> {
    let choice = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices"))?;

    Ok(choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Create the configured [`ChatProvider`].
///
/// A missing API key is an error here, so the problem surfaces at startup
/// rather than on the first request.
pub fn create_chat_provider(config: &LlmConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChatProvider::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
