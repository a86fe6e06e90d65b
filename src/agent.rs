//! Request orchestration.
//!
//! For each message the agent retrieves context, reads recent history, runs
//! plugins, builds the system prompt, asks the chat provider, and records
//! the exchange. Steps run strictly in that order. History is written only
//! after the chat provider succeeds, so a failed request leaves the session
//! untouched.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use context_agent_core::models::IndexStats;

use crate::config::{Config, RetrievalConfig};
use crate::corpus::{DocumentSource, FilesystemCorpus};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::index::SimilarityIndex;
use crate::llm::{create_chat_provider, ChatProvider};
use crate::memory::SessionMemory;
use crate::plugins::PluginDispatcher;
use crate::prompt::build_system_prompt;

/// Used when the model returns no content.
pub const FALLBACK_REPLY: &str = "I apologize, but I couldn't generate a response.";

#[derive(Debug, Error)]
pub enum AgentError {
    /// The message could not be answered. The cause is logged, not shown
    /// to callers.
    #[error("Failed to process message")]
    Processing(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub response: String,
    pub session_id: String,
    /// Names of the plugins that ran, in dispatch order.
    pub plugins_used: Vec<String>,
    /// Number of knowledge-base chunks placed in the prompt.
    pub retrieved_chunks: usize,
}

pub struct Agent {
    index: Arc<SimilarityIndex>,
    memory: Arc<SessionMemory>,
    plugins: Arc<PluginDispatcher>,
    llm: Arc<dyn ChatProvider>,
    top_k: usize,
    history_turns: usize,
}

impl Agent {
    pub fn new(
        index: Arc<SimilarityIndex>,
        memory: Arc<SessionMemory>,
        plugins: Arc<PluginDispatcher>,
        llm: Arc<dyn ChatProvider>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            memory,
            plugins,
            llm,
            top_k: retrieval.top_k,
            history_turns: retrieval.history_turns,
        }
    }

    /// Wire up every component from configuration: filesystem corpus,
    /// configured embedding and chat providers, built-in plugins.
    ///
    /// Fails if a required API key is missing.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = create_provider(&config.embedding)?;
        let corpus: Arc<dyn DocumentSource> = Arc::new(FilesystemCorpus::new(&config.corpus));
        let index = SimilarityIndex::from_config(config, embedder, corpus);
        let llm = create_chat_provider(&config.llm)?;

        Ok(Self::new(
            Arc::new(index),
            Arc::new(SessionMemory::new(config.memory.max_turns)),
            Arc::new(PluginDispatcher::with_builtins(&config.plugins)?),
            llm,
            &config.retrieval,
        ))
    }

    /// Ingest the corpus now rather than on the first query.
    pub async fn initialize(&self) -> anyhow::Result<IndexStats> {
        self.index.initialize().await
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub fn plugins(&self) -> &PluginDispatcher {
        &self.plugins
    }

    pub async fn process_message(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<AgentReply, AgentError> {
        let chunks = match self.index.query(message, self.top_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %format!("{:#}", e),
                    "retrieval failed, continuing without context"
                );
                Vec::new()
            }
        };

        let history = self.memory.recent(session_id, self.history_turns);
        let plugin_results = self.plugins.dispatch(message).await;
        let system_prompt = build_system_prompt(&chunks, &plugin_results);

        let completion = self
            .llm
            .complete(&system_prompt, &history, message)
            .await
            .map_err(|e| {
                tracing::error!(
                    session_id = %session_id,
                    model = self.llm.model_name(),
                    error = %format!("{:#}", e),
                    "chat completion failed"
                );
                AgentError::Processing(e)
            })?;

        let response = completion
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        self.memory.append_exchange(session_id, message, &response);

        let plugins_used: Vec<String> = plugin_results
            .into_iter()
            .map(|r| r.plugin_name)
            .collect();

        tracing::info!(
            session_id = %session_id,
            retrieved_chunks = chunks.len(),
            plugins = ?plugins_used,
            "message processed"
        );

        Ok(AgentReply {
            response,
            session_id: session_id.to_string(),
            plugins_used,
            retrieved_chunks: chunks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::corpus::StaticCorpus;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use context_agent_core::models::{Role, TurnView};
    use std::sync::Mutex;

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("embedding service unavailable")
        }
    }

    /// Replies with a canned answer and records what it was sent.
    struct ScriptedChat {
        reply: Option<String>,
        fail: bool,
        seen: Mutex<Vec<(String, Vec<TurnView>)>>,
    }

    impl ScriptedChat {
        fn replying(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                fail: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            system_prompt: &str,
            history: &[TurnView],
            _user_message: &str,
        ) -> Result<Option<String>> {
            self.seen
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), history.to_vec()));
            if self.fail {
                bail!("upstream 503");
            }
            Ok(self.reply.clone())
        }
    }

    fn build_agent(llm: Arc<ScriptedChat>) -> Agent {
        let index = SimilarityIndex::new(
            Arc::new(FailingEmbedder),
            Arc::new(StaticCorpus::new(vec![])),
            ChunkingConfig::default(),
        );
        Agent::new(
            Arc::new(index),
            Arc::new(SessionMemory::new(20)),
            Arc::new(PluginDispatcher::with_builtins(&Default::default()).unwrap()),
            llm,
            &RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_success_appends_exchange() {
        let llm = Arc::new(ScriptedChat::replying(Some("Four.")));
        let agent = build_agent(llm.clone());

        let reply = agent.process_message("what is 2+2", "s1").await.unwrap();
        assert_eq!(reply.response, "Four.");
        assert_eq!(reply.session_id, "s1");
        assert_eq!(reply.plugins_used, vec!["math".to_string()]);
        assert_eq!(reply.retrieved_chunks, 0);

        let turns = agent.memory().session("s1").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "what is 2+2");
        assert_eq!(turns[1].content, "Four.");

        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].0.contains("Tool 1 (math)"));
    }

    #[tokio::test]
    async fn test_history_is_passed_on_next_turn() {
        let llm = Arc::new(ScriptedChat::replying(Some("ok")));
        let agent = build_agent(llm.clone());

        agent.process_message("first", "s").await.unwrap();
        agent.process_message("second", "s").await.unwrap();

        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].1.is_empty());
        let contents: Vec<&str> = seen[1].1.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "ok"]);
    }

    #[tokio::test]
    async fn test_empty_completion_uses_fallback() {
        let agent = build_agent(Arc::new(ScriptedChat::replying(Some("   "))));
        let reply = agent.process_message("hello", "s").await.unwrap();
        assert_eq!(reply.response, FALLBACK_REPLY);

        let agent = build_agent(Arc::new(ScriptedChat::replying(None)));
        let reply = agent.process_message("hello", "s").await.unwrap();
        assert_eq!(reply.response, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_chat_failure_leaves_memory_untouched() {
        let llm = Arc::new(ScriptedChat {
            reply: None,
            fail: true,
            seen: Mutex::new(Vec::new()),
        });
        let agent = build_agent(llm);

        let err = agent.process_message("hello", "s").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to process message");
        assert!(agent.memory().session("s").is_none());
    }
}
