//! TOML configuration parsing and validation.
//!
//! Every section except `[corpus]` has defaults, so a minimal config only
//! names the corpus directory. Secrets are never stored in the file: each
//! provider section names the environment variable that holds its API key.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use context_agent_core::chunk::{DEFAULT_MIN_CHUNK_CHARS, DEFAULT_TARGET_CHARS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "*.md".to_string(),
        "*.txt".to_string(),
        "*.json".to_string(),
        "*.csv".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: DEFAULT_TARGET_CHARS,
            min_chunk_chars: DEFAULT_MIN_CHUNK_CHARS,
        }
    }
}

fn default_target_chars() -> usize {
    DEFAULT_TARGET_CHARS
}
fn default_min_chunk_chars() -> usize {
    DEFAULT_MIN_CHUNK_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between per-chunk embedding calls during ingestion.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: default_embedding_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_throttle_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: Option<String>,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_llm_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            reasoning_effort: default_reasoning_effort(),
            max_retries: default_llm_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}
fn default_llm_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_reasoning_effort() -> Option<String> {
    Some("low".to_string())
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_turns: default_history_turns(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_history_turns() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PluginsConfig {
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_city")]
    pub default_city: String,
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_weather_key_env(),
            default_city: default_city(),
            base_url: default_weather_base_url(),
            timeout_secs: default_weather_timeout_secs(),
        }
    }
}

fn default_weather_key_env() -> String {
    "OPENWEATHER_API_KEY".to_string()
}
fn default_city() -> String {
    "Bangalore".to_string()
}
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}
fn default_weather_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Read a secret from the environment, treating an empty value as unset.
pub fn env_secret(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.target_chars == 0 {
        bail!("chunking.target_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.memory.max_turns < 1 {
        bail!("memory.max_turns must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() && config.embedding.model.is_none() {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.llm.provider.as_str() {
        "openai" => {}
        other => bail!("Unknown llm provider: '{}'. Must be openai.", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[corpus]\nroot = \"./documents\"\n").unwrap();
        assert_eq!(cfg.corpus.root, PathBuf::from("./documents"));
        assert_eq!(cfg.corpus.include_globs.len(), 4);
        assert!(!cfg.corpus.recursive);
        assert_eq!(cfg.chunking.target_chars, 300);
        assert_eq!(cfg.chunking.min_chunk_chars, 50);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.retrieval.history_turns, 4);
        assert_eq!(cfg.memory.max_turns, 20);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.embedding.throttle_ms, 100);
        assert_eq!(cfg.llm.max_tokens, 1000);
        assert_eq!(cfg.llm.reasoning_effort.as_deref(), Some("low"));
        assert_eq!(cfg.plugins.weather.default_city, "Bangalore");
        assert_eq!(cfg.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_corpus_is_rejected() {
        assert!(parse("[server]\nbind = \"0.0.0.0:80\"\n").is_err());
    }

    #[test]
    fn test_enabled_embedding_requires_model() {
        let err = parse("[corpus]\nroot = \"d\"\n[embedding]\nprovider = \"openai\"\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("embedding.model"), "{}", err);
    }

    #[test]
    fn test_unknown_embedding_provider() {
        let err = parse("[corpus]\nroot = \"d\"\n[embedding]\nprovider = \"magic\"\nmodel = \"m\"\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unknown embedding provider"), "{}", err);
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(parse("[corpus]\nroot = \"d\"\n[retrieval]\ntop_k = 0\n").is_err());
        assert!(parse("[corpus]\nroot = \"d\"\n[memory]\nmax_turns = 0\n").is_err());
        assert!(parse("[corpus]\nroot = \"d\"\n[chunking]\ntarget_chars = 0\n").is_err());
    }

    #[test]
    fn test_example_config_is_valid() {
        let cfg = parse(include_str!("../config/agent.example.toml")).unwrap();
        assert!(cfg.embedding.is_enabled());
        assert_eq!(cfg.embedding.model.as_deref(), Some("gemini-embedding-001"));
        assert_eq!(cfg.plugins.weather.api_key_env, "OPENWEATHER_API_KEY");
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/agent.toml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Failed to read config file"));
    }
}
