//! # Context Agent CLI (`ctx-agent`)
//!
//! ## Usage
//!
//! ```bash
//! ctx-agent --config ./config/agent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctx-agent serve` | Ingest the corpus and start the HTTP server |
//! | `ctx-agent ingest` | Ingest the corpus and print index stats |
//! | `ctx-agent ask "<message>"` | Answer one message and print the reply |
//! | `ctx-agent dispatch "<message>"` | Run only the plugins and print their results |
//!
//! API keys are read from the environment; a `.env` file in the working
//! directory is loaded first if present.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use context_agent::agent::Agent;
use context_agent::config::{self, Config, PluginsConfig};
use context_agent::corpus::FilesystemCorpus;
use context_agent::embedding::{create_provider, DisabledProvider};
use context_agent::index::SimilarityIndex;
use context_agent::plugins::PluginDispatcher;
use context_agent::server;

/// Context Agent: a retrieval-augmented chat agent with tool plugins.
#[derive(Parser)]
#[command(name = "ctx-agent", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/agent.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the corpus and serve the HTTP API on `[server].bind`.
    Serve,

    /// Ingest the corpus and print what the index holds.
    Ingest {
        /// Only chunk the corpus and print per-source counts; no embedding calls.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single message.
    Ask {
        message: String,

        /// Session to read history from and record the exchange in.
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Run the plugin dispatcher on a message and print the results as JSON.
    Dispatch { message: String },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Plugins need no corpus or credentials, so fall back to defaults
    // when there is no config file. A config that exists must still load.
    if let Commands::Dispatch { message } = &cli.command {
        let plugins_config = if cli.config.exists() {
            config::load_config(&cli.config)?.plugins
        } else {
            tracing::debug!(path = %cli.config.display(), "no config file, using default plugin settings");
            PluginsConfig::default()
        };
        let dispatcher = PluginDispatcher::with_builtins(&plugins_config)?;
        let results = dispatcher.dispatch(message).await;
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { dry_run } => {
            run_ingest(&cfg, dry_run).await?;
        }
        Commands::Ask { message, session } => {
            let agent = Agent::from_config(&cfg)?;
            agent.initialize().await?;
            let reply = agent.process_message(&message, &session).await?;

            println!("{}", reply.response);
            println!();
            if !reply.plugins_used.is_empty() {
                println!("plugins used: {}", reply.plugins_used.join(", "));
            }
            println!("retrieved chunks: {}", reply.retrieved_chunks);
        }
        Commands::Dispatch { .. } => {}
    }

    Ok(())
}

async fn run_ingest(cfg: &Config, dry_run: bool) -> Result<()> {
    let corpus = Arc::new(FilesystemCorpus::new(&cfg.corpus));

    if dry_run {
        let index = SimilarityIndex::from_config(cfg, Arc::new(DisabledProvider), corpus);
        let preview = index.preview().await?;
        println!("Dry run: {} documents", preview.len());
        let mut total = 0;
        for doc in &preview {
            println!(
                "  {}: {} chunks ({} embeddable)",
                doc.source, doc.chunks, doc.kept
            );
            total += doc.kept;
        }
        println!("  total embeddable chunks: {}", total);
        return Ok(());
    }

    let embedder = create_provider(&cfg.embedding)?;
    let index = SimilarityIndex::from_config(cfg, embedder, corpus);
    let stats = index.initialize().await?;

    println!("Indexed {} chunks", stats.total_chunks);
    for source in &stats.sources {
        println!("  {}", source);
    }
    Ok(())
}
