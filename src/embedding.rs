//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible `/embeddings` endpoint
//!   (OpenAI itself, or Gemini through its OpenAI-compatible base URL).
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust
//! # use context_agent::config::EmbeddingConfig;
//! # use context_agent::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{env_secret, EmbeddingConfig};
use crate::http::{client_with_timeout, join_url, post_json_with_retry};

/// A text embedding backend.
///
/// Implementations must be cheap to share: the index holds one behind an
/// `Arc` and calls it from concurrent request tasks.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Whether this provider can produce embeddings at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Embed a single text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI-compatible Provider ============

/// Embedding provider for OpenAI-compatible APIs.
///
/// Calls `POST {base_url}/embeddings`. The API key is read once, at
/// construction, from the env var named by `embedding.api_key_env`.
pub struct OpenAIProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIProvider {
    /// Create a new provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or the API key
    /// environment variable is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = env_secret(&config.api_key_env)
            .ok_or_else(|| anyhow!("{} environment variable not set", config.api_key_env))?;
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            endpoint: join_url(base_url, "embeddings"),
            api_key,
            model,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        first_vector(parse_openai_response(&json)?)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays and returns them in order.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            item.get("embedding")
                .and_then(|e| e.as_array())
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured base URL (default:
/// `http://localhost:11434`). No API key is needed.
pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or("http://localhost:11434");

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            endpoint: join_url(base_url, "api/embed"),
            model,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        first_vector(parse_ollama_response(&json)?)
    }
}

/// Parse the Ollama `/api/embed` response: `{ "embeddings": [[...], ...] }`.
fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            item.as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn to_f32_vec(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

fn first_vector(vectors: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    let vector = vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))?;
    if vector.is_empty() {
        bail!("Embedding response contained an empty vector");
    }
    Ok(vector)
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
