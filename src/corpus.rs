//! Document corpus loading.
//!
//! The index reads its documents through the [`DocumentSource`] trait so the
//! filesystem walk can be swapped for a fixed in-memory set in tests.
//!
//! [`FilesystemCorpus`] walks `corpus.root`, keeps files whose path relative
//! to the root matches one of `corpus.include_globs`, and reads them as UTF-8.
//! Only the top level is scanned unless `corpus.recursive = true`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::CorpusConfig;

/// One document ready for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Label carried onto every chunk (the path relative to the corpus root).
    pub source: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Something that can produce the full set of documents to ingest.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load every document. Called once per index initialization.
    async fn load(&self) -> Result<Vec<SourceDocument>>;
}

/// Directory-backed corpus.
pub struct FilesystemCorpus {
    root: PathBuf,
    include_globs: Vec<String>,
    recursive: bool,
}

impl FilesystemCorpus {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            root: config.root.clone(),
            include_globs: config.include_globs.clone(),
            recursive: config.recursive,
        }
    }
}

#[async_trait]
impl DocumentSource for FilesystemCorpus {
    async fn load(&self) -> Result<Vec<SourceDocument>> {
        let root = self.root.clone();
        let include_globs = self.include_globs.clone();
        let recursive = self.recursive;
        tokio::task::spawn_blocking(move || scan_directory(&root, &include_globs, recursive))
            .await?
    }
}

fn scan_directory(
    root: &Path,
    include_globs: &[String],
    recursive: bool,
) -> Result<Vec<SourceDocument>> {
    if !root.is_dir() {
        bail!("Corpus directory does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;

    let mut walker = WalkDir::new(root);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut documents = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable corpus entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if !include_set.is_match(&rel_str) {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        if text.trim().is_empty() {
            tracing::warn!(path = %path.display(), "skipping empty file");
            continue;
        }

        documents.push(SourceDocument::new(rel_str, text));
    }

    if documents.is_empty() {
        tracing::warn!(root = %root.display(), "no documents found in corpus");
    }

    documents.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// A fixed set of documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    documents: Vec<SourceDocument>,
}

impl StaticCorpus {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for StaticCorpus {
    async fn load(&self) -> Result<Vec<SourceDocument>> {
        Ok(self.documents.clone())
    }
}
