//! Core data models shared by the index, session memory, and plugins.
//!
//! These types are deliberately plain: they carry no provider handles or
//! locks, so they can cross task boundaries and be serialized at the HTTP
//! boundary without adaptation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A segment of a corpus document paired with its embedding vector.
///
/// Created once during ingestion and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// `"{source}_chunk_{chunk_index}"`.
    pub id: String,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    /// Source label of the parent document (its path relative to the corpus root).
    pub source: String,
    /// Position of this chunk in the chunker output for its document.
    pub chunk_index: usize,
}

impl Chunk {
    /// Build the stable chunk identifier for a source and position.
    pub fn make_id(source: &str, chunk_index: usize) -> String {
        format!("{}_chunk_{}", source, chunk_index)
    }
}

/// A chunk returned from a similarity query, with its cosine score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Arc<Chunk>,
    pub similarity: f32,
}

/// Summary of what the similarity index holds.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IndexStats {
    pub total_chunks: usize,
    /// Distinct source labels, in first-ingested order.
    pub sources: Vec<String>,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored message of a session.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-only projection of a [`Turn`] without its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnView {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Whether a weather reading came from a live provider or was synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherSource {
    Live,
    Mock,
}

/// Current weather conditions for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Metres per second.
    pub wind_speed: f64,
    pub source: WeatherSource,
}

/// Structured payload produced by a plugin.
///
/// Serialized untagged, so each variant renders as its plain result object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PluginOutput {
    Math { expression: String, answer: f64 },
    Weather(WeatherReport),
    Other(serde_json::Value),
}

/// Outcome of one plugin invocation: either a result or an error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginResult {
    pub plugin_name: String,
    pub result: Option<PluginOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginResult {
    pub fn success(plugin_name: impl Into<String>, output: PluginOutput) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            result: Some(output),
            error: None,
        }
    }

    pub fn failure(plugin_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(Chunk::make_id("guide.md", 3), "guide.md_chunk_3");
    }

    #[test]
    fn test_plugin_result_serializes_plain_payload() {
        let ok = PluginResult::success(
            "math",
            PluginOutput::Math {
                expression: "2+2".to_string(),
                answer: 4.0,
            },
        );
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(
            value,
            json!({
                "plugin_name": "math",
                "result": { "expression": "2+2", "answer": 4.0 }
            })
        );
    }

    #[test]
    fn test_plugin_failure_has_null_result() {
        let err = PluginResult::failure("weather", "timed out");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["result"], serde_json::Value::Null);
        assert_eq!(value["error"], "timed out");
        assert!(err.is_error());
    }

    #[test]
    fn test_weather_source_is_visible() {
        let report = WeatherReport {
            city: "Paris".to_string(),
            temperature: 21.0,
            description: "sunny".to_string(),
            humidity: 50.0,
            wind_speed: 7.0,
            source: WeatherSource::Mock,
        };
        let value = serde_json::to_value(PluginOutput::Weather(report)).unwrap();
        assert_eq!(value["source"], "mock");
        assert_eq!(value["city"], "Paris");
    }
}
