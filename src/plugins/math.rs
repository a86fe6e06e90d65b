//! Arithmetic plugin.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;

use context_agent_core::expr::{evaluate, extract_expression};
use context_agent_core::models::PluginOutput;

use super::Plugin;

pub struct MathPlugin {
    trigger: Regex,
}

impl MathPlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            trigger: Regex::new(r"(?i)\d+\s*[+\-*/]\s*\d+|calculate|math|compute")?,
        })
    }
}

#[async_trait]
impl Plugin for MathPlugin {
    fn name(&self) -> &str {
        "math"
    }

    fn detects(&self, message: &str) -> bool {
        self.trigger.is_match(message)
    }

    async fn run(&self, message: &str) -> Result<PluginOutput> {
        let expression = extract_expression(message)
            .ok_or_else(|| anyhow!("no valid mathematical expression found"))
            .context("Math evaluation failed")?;
        let answer = evaluate(expression).context("Math evaluation failed")?;
        Ok(PluginOutput::Math {
            expression: expression.to_string(),
            answer,
        })
    }
}
