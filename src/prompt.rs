//! System prompt assembly.
//!
//! The prompt is the fixed preamble followed by an optional knowledge-base
//! section (retrieved chunks, best first) and an optional tool-results
//! section (plugin results in dispatch order).

use std::fmt::Write;

use context_agent_core::models::{PluginResult, RetrievedChunk};

const PREAMBLE: &str = "\
You are an intelligent AI assistant with access to a knowledge base and various tools. \
Your role is to provide helpful, accurate, and contextual responses to user queries.

INSTRUCTIONS:
1. Use the provided context from the knowledge base to inform your responses
2. If plugin results are available, incorporate them naturally into your response
3. Be conversational but informative
4. If you don't know something or if information isn't in the provided context, say so
5. Keep responses concise but thorough

";

pub fn build_system_prompt(chunks: &[RetrievedChunk], plugin_results: &[PluginResult]) -> String {
    let mut prompt = String::from(PREAMBLE);

    if !chunks.is_empty() {
        prompt.push_str("KNOWLEDGE BASE CONTEXT:\n");
        for (i, hit) in chunks.iter().enumerate() {
            let _ = write!(
                prompt,
                "Context {} (from {}):\n{}\n\n",
                i + 1,
                hit.chunk.source,
                hit.chunk.content
            );
        }
    }

    if !plugin_results.is_empty() {
        prompt.push_str("TOOL RESULTS:\n");
        for (i, result) in plugin_results.iter().enumerate() {
            let body = match (&result.error, &result.result) {
                (Some(error), _) => format!("Error - {}", error),
                (None, output) => serde_json::to_string_pretty(output)
                    .unwrap_or_else(|_| "null".to_string()),
            };
            let _ = writeln!(prompt, "Tool {} ({}): {}", i + 1, result.plugin_name, body);
        }
    }

    prompt
}
