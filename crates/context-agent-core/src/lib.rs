//! # Context Agent Core
//!
//! Shared, I/O-free logic for Context Agent: data models, the chunking
//! policy, cosine similarity ranking, and the arithmetic evaluator used by
//! the math plugin.
//!
//! This crate contains no tokio, network, or filesystem dependencies. The
//! `context-agent` app crate wires these pieces to providers and storage.

pub mod chunk;
pub mod expr;
pub mod models;
pub mod similarity;
