//! Weather plugin with a live OpenWeatherMap lookup and a randomized mock.
//!
//! The lookup is chosen once, when the plugin is built from config: if the
//! API key env var is set the plugin queries OpenWeatherMap, otherwise it
//! returns mock readings tagged `source: "mock"` so callers can tell them
//! apart from real data.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use context_agent_core::models::{PluginOutput, WeatherReport, WeatherSource};

use super::Plugin;
use crate::config::{env_secret, WeatherConfig};
use crate::http::{client_with_timeout, join_url};

/// Words that end a city name captured after `in`.
const STOP_WORDS: &[&str] = &[
    "and", "or", "what", "how", "today", "tomorrow", "now", "right", "please", "but", "then",
    "this",
];

const MOCK_DESCRIPTIONS: [&str; 4] = ["sunny", "cloudy", "rainy", "partly cloudy"];

/// Source of current weather conditions.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherReport>;
}

/// OpenWeatherMap current-weather API, metric units.
pub struct OpenWeatherLookup {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenWeatherLookup {
    pub fn new(config: &WeatherConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            endpoint: join_url(&config.base_url, "weather"),
            api_key,
        })
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherLookup {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("OpenWeatherMap API error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        parse_openweather_response(&json, city)
    }
}

fn parse_openweather_response(json: &Value, requested_city: &str) -> Result<WeatherReport> {
    let number = |pointer: &str| {
        json.pointer(pointer)
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow!("Invalid OpenWeatherMap response: missing {}", pointer))
    };

    Ok(WeatherReport {
        city: json
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(requested_city)
            .to_string(),
        temperature: number("/main/temp")?,
        description: json
            .pointer("/weather/0/description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        humidity: number("/main/humidity")?,
        wind_speed: number("/wind/speed")?,
        source: WeatherSource::Live,
    })
}

/// Randomized readings for when no API key is configured.
pub struct MockWeatherLookup;

impl MockWeatherLookup {
    fn reading(city: &str) -> WeatherReport {
        let mut rng = rand::rng();
        WeatherReport {
            city: city.to_string(),
            temperature: rng.random_range(15.0..=35.0_f64).round(),
            description: MOCK_DESCRIPTIONS[rng.random_range(0..MOCK_DESCRIPTIONS.len())]
                .to_string(),
            humidity: rng.random_range(40.0..=80.0_f64).round(),
            wind_speed: rng.random_range(5.0..=15.0_f64).round(),
            source: WeatherSource::Mock,
        }
    }
}

#[async_trait]
impl WeatherLookup for MockWeatherLookup {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        Ok(Self::reading(city))
    }
}

pub struct WeatherPlugin {
    lookup: Arc<dyn WeatherLookup>,
    default_city: String,
    trigger: Regex,
    city_pattern: Regex,
}

impl WeatherPlugin {
    pub fn new(lookup: Arc<dyn WeatherLookup>, default_city: impl Into<String>) -> Result<Self> {
        Ok(Self {
            lookup,
            default_city: default_city.into(),
            trigger: Regex::new(r"(?i)weather.*in\s+\w+|what.*weather")?,
            city_pattern: Regex::new(r"(?i)weather.*?\bin\s+(\p{L}[\p{L}\s]*)")?,
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self> {
        let lookup: Arc<dyn WeatherLookup> = match env_secret(&config.api_key_env) {
            Some(key) => Arc::new(OpenWeatherLookup::new(config, key)?),
            None => {
                tracing::info!(
                    env = %config.api_key_env,
                    "weather API key not set, using mock weather data"
                );
                Arc::new(MockWeatherLookup)
            }
        };
        Self::new(lookup, config.default_city.clone())
    }

    /// City named after `weather … in`, cut at the first stop word.
    pub fn extract_city(&self, message: &str) -> String {
        let words: Vec<&str> = self
            .city_pattern
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .split_whitespace()
                    .take_while(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if words.is_empty() {
            self.default_city.clone()
        } else {
            words.join(" ")
        }
    }
}

#[async_trait]
impl Plugin for WeatherPlugin {
    fn name(&self) -> &str {
        "weather"
    }

    fn detects(&self, message: &str) -> bool {
        self.trigger.is_match(message)
    }

    async fn run(&self, message: &str) -> Result<PluginOutput> {
        let city = self.extract_city(message);
        let report = self
            .lookup
            .current(&city)
            .await
            .context("Failed to get weather data")?;
        Ok(PluginOutput::Weather(report))
    }
}
