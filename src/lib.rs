//! # Context Agent
//!
//! A retrieval-augmented conversational agent. Each message is answered
//! with context pulled from a small document corpus, the recent history of
//! its session, and the output of any tool plugins the message triggers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │   Corpus    │──▶│ Chunk+Embed  │──▶│ Similarity     │
//! │ (documents) │   │  (ingest)    │   │ Index (memory) │
//! └─────────────┘   └──────────────┘   └───────┬────────┘
//!                                              │ top-k
//!  ┌──────────┐   ┌───────────┐   ┌────────────▼───────┐   ┌─────────┐
//!  │ HTTP/CLI │──▶│   Agent   │──▶│ Prompt (context +  │──▶│   LLM   │
//!  └──────────┘   └─────┬─────┘   │ tools + history)   │   └─────────┘
//!                       │         └────────────────────┘
//!               ┌───────┴────────┐
//!               ▼                ▼
//!        ┌────────────┐   ┌────────────┐
//!        │  Session   │   │  Plugins   │
//!        │  Memory    │   │ math/wthr  │
//!        └────────────┘   └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`corpus`] | Document loading from the corpus directory |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`index`] | In-memory similarity index and ingestion |
//! | [`memory`] | Bounded per-session conversation history |
//! | [`plugins`] | Intent-triggered math and weather plugins |
//! | [`llm`] | Chat completion providers |
//! | [`prompt`] | System prompt assembly |
//! | [`agent`] | Per-message orchestration |
//! | [`server`] | HTTP API |
//!
//! Pure algorithms (chunking, cosine ranking, arithmetic) and the shared
//! data types live in the `context-agent-core` crate.

pub mod agent;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod http;
pub mod index;
pub mod llm;
pub mod memory;
pub mod plugins;
pub mod prompt;
pub mod server;
