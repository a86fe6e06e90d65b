//! Intent-triggered plugins and their dispatcher.
//!
//! Each [`Plugin`] decides from the raw message whether it applies. The
//! [`PluginDispatcher`] runs every matching plugin, in registration order,
//! and collects one [`PluginResult`] per match. A plugin failure never
//! aborts dispatch: it is captured in [`PluginResult::error`].
//!
//! Built-in plugins, in dispatch order:
//!
//! | Plugin | Triggers on |
//! |--------|-------------|
//! | [`weather::WeatherPlugin`] | `weather … in <word>` or `what … weather` |
//! | [`math::MathPlugin`] | `<digits> <op> <digits>` or `calculate`/`math`/`compute` |

pub mod math;
pub mod weather;

use anyhow::Result;
use async_trait::async_trait;

use context_agent_core::models::{PluginOutput, PluginResult};

use crate::config::PluginsConfig;

pub use math::MathPlugin;
pub use weather::{MockWeatherLookup, OpenWeatherLookup, WeatherLookup, WeatherPlugin};

/// A tool the agent runs when its trigger pattern matches a message.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name reported in `plugins_used` (e.g. `"math"`).
    fn name(&self) -> &str;

    /// Whether the message asks for this plugin.
    fn detects(&self, message: &str) -> bool;

    /// Produce the structured result for a message.
    async fn run(&self, message: &str) -> Result<PluginOutput>;

    /// Run the plugin and fold any error into the result.
    async fn execute(&self, message: &str) -> PluginResult {
        match self.run(message).await {
            Ok(output) => PluginResult::success(self.name(), output),
            Err(e) => PluginResult::failure(self.name(), format!("{:#}", e)),
        }
    }
}

/// Ordered registry of plugins.
pub struct PluginDispatcher {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Create a dispatcher with the weather and math plugins.
    ///
    /// The weather plugin uses the live lookup when its API key is set in
    /// the environment, otherwise the mock.
    pub fn with_builtins(config: &PluginsConfig) -> Result<Self> {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(WeatherPlugin::from_config(&config.weather)?));
        dispatcher.register(Box::new(MathPlugin::new()?));
        Ok(dispatcher)
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn plugins(&self) -> &[Box<dyn Plugin>] {
        &self.plugins
    }

    pub fn find(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Run every plugin whose detector matches, one after another.
    pub async fn dispatch(&self, message: &str) -> Vec<PluginResult> {
        let mut results = Vec::new();
        for plugin in &self.plugins {
            if !plugin.detects(message) {
                continue;
            }
            let result = plugin.execute(message).await;
            match &result.error {
                Some(error) => {
                    tracing::warn!(plugin = plugin.name(), error = %error, "plugin failed")
                }
                None => tracing::debug!(plugin = plugin.name(), "plugin succeeded"),
            }
            results.push(result);
        }
        results
    }
}

impl Default for PluginDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use context_agent_core::models::{WeatherReport, WeatherSource};
    use std::sync::Arc;

    struct FixedWeather;

    #[async_trait]
    impl WeatherLookup for FixedWeather {
        async fn current(&self, city: &str) -> Result<WeatherReport> {
            Ok(WeatherReport {
                city: city.to_string(),
                temperature: 20.0,
                description: "sunny".to_string(),
                humidity: 50.0,
                wind_speed: 5.0,
                source: WeatherSource::Mock,
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn detects(&self, _message: &str) -> bool {
            true
        }
        async fn run(&self, _message: &str) -> Result<PluginOutput> {
            bail!("always fails")
        }
    }

    fn dispatcher() -> PluginDispatcher {
        let mut d = PluginDispatcher::new();
        d.register(Box::new(
            WeatherPlugin::new(Arc::new(FixedWeather), "Bangalore").unwrap(),
        ));
        d.register(Box::new(MathPlugin::new().unwrap()));
        d
    }

    #[tokio::test]
    async fn test_weather_and_math_in_one_message() {
        let results = dispatcher()
            .dispatch("What's the weather in Paris and what is 5*6?")
            .await;
        let names: Vec<&str> = results.iter().map(|r| r.plugin_name.as_str()).collect();
        assert_eq!(names, vec!["weather", "math"]);

        match &results[0].result {
            Some(PluginOutput::Weather(report)) => assert_eq!(report.city, "Paris"),
            other => panic!("unexpected weather result: {:?}", other),
        }
        match &results[1].result {
            Some(PluginOutput::Math { expression, answer }) => {
                assert_eq!(expression, "5*6");
                assert_eq!(*answer, 30.0);
            }
            other => panic!("unexpected math result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_plugin_matches() {
        assert!(dispatcher().dispatch("Tell me about Rust").await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_captured() {
        let mut d = PluginDispatcher::new();
        d.register(Box::new(Broken));
        let results = d.dispatch("anything").await;
        assert_eq!(results.len(), 1);
        assert!(results[0].result.is_none());
        assert_eq!(results[0].error.as_deref(), Some("always fails"));
    }

    #[test]
    fn test_registry_lookup() {
        let d = dispatcher();
        assert_eq!(d.len(), 2);
        assert!(!d.is_empty());
        assert!(d.find("math").is_some());
        assert!(d.find("search").is_none());
        assert!(PluginDispatcher::default().is_empty());
    }

    #[test]
    fn test_builtins_order() {
        let d = PluginDispatcher::with_builtins(&PluginsConfig::default()).unwrap();
        let names: Vec<&str> = d.plugins().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["weather", "math"]);
    }
}
