use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coderag::config::Config;
use coderag::db::Db;
use coderag::embedder::{Embedder, HashEmbedder, HttpEmbedder};
use coderag::indexer::core::Indexer;
use coderag::mcp::server::{McpContext, McpServer};
use coderag::query::answer::{ChatSynthesizer, ExtractiveSynthesizer, Synthesizer};
use coderag::query::intent::IntentClassifier;
use coderag::query::retriever::{QueryOverrides, Retriever};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coderag", version, about = "Code-aware retrieval over source repositories")]
struct Cli {
    /// Config file (default: coderag.json, created on first run)
    #[arg(long, global = true, default_value = "")]
    config: String,

    /// Override the store location from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a repository directory
    Ingest {
        dir: PathBuf,
        /// Re-index files even when their modification time is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Answer a question with inline citations
    Ask {
        question: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show ranked chunks for a question
    Search {
        question: String,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// List indexed documents
    List,
    /// Serve the MCP tools over stdio
    Serve,
}

#[derive(Args)]
struct FilterArgs {
    /// Number of chunks to retrieve (tuned by intent when omitted)
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    language: Option<String>,
    /// function | class | top_level | window
    #[arg(long)]
    chunk_type: Option<String>,
    /// Only chunks under this directory
    #[arg(long)]
    path: Option<String>,
    /// Filename glob, e.g. '*_test.go'
    #[arg(long)]
    file: Option<String>,
}

impl FilterArgs {
    fn overrides(&self) -> Result<QueryOverrides> {
        Ok(QueryOverrides::parse(
            self.top_k,
            self.language.as_deref(),
            self.chunk_type.as_deref(),
            self.path.as_deref(),
            self.file.as_deref(),
        )?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(db) = &cli.db {
        config.db_path = db.to_string_lossy().into_owned();
    }
    config.validate().context("invalid configuration")?;

    let mut db = Db::open(&config.db_path, config.embedding.dimensions)
        .with_context(|| format!("failed to open store at {}", config.db_path))?;

    // Blocking HTTP clients must be created and dropped outside the runtime.
    let embedder = build_embedder(&config)?;
    let retriever = Retriever::new(IntentClassifier::default(), config.retrieval.clone());

    match cli.command {
        Command::Ingest { dir, force } => {
            let indexer_config = config.indexer_config();
            let report = Indexer::new(&mut db, embedder.as_ref(), &indexer_config)?
                .index_directory(&dir, force)
                .with_context(|| format!("failed to index {}", dir.display()))?;
            println!(
                "Scanned {} files: indexed {} ({} new, {} updated), skipped {} ({} unchanged, {} unreadable), failed {}, removed {}; {} chunks",
                report.scanned,
                report.indexed,
                report.added,
                report.updated,
                report.skipped(),
                report.unchanged,
                report.unreadable,
                report.failed,
                report.removed,
                report.chunks
            );
        }
        Command::Ask { question, filters } => {
            let synthesizer = build_synthesizer(&config)?;
            let (retrieval, answer) = retriever.ask(
                &db,
                embedder.as_ref(),
                synthesizer.as_ref(),
                &question,
                &filters.overrides()?,
            )?;
            println!("Intent: {} (k={})\n", retrieval.intent, retrieval.spec.k);
            println!("{}", answer.text.trim_end());
            if !answer.citations.is_empty() {
                println!("\nSources: {}", answer.citations.join(" "));
            }
        }
        Command::Search { question, filters } => {
            let retrieval =
                retriever.retrieve(&db, embedder.as_ref(), &question, &filters.overrides()?)?;
            println!("Intent: {} (k={})", retrieval.intent, retrieval.spec.k);
            if retrieval.hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in retrieval.hits.iter().enumerate() {
                let meta = &hit.record.metadata;
                println!(
                    "{:>2}. {:.3} {} {} {}",
                    i + 1,
                    hit.similarity,
                    hit.record.cite(),
                    meta.chunk_type,
                    meta.path
                );
            }
        }
        Command::List => {
            let docs = db.documents()?;
            if docs.is_empty() {
                println!("No documents indexed.");
            }
            for doc in docs {
                println!(
                    "{}  {:>4} chunks  modified {}",
                    doc.path,
                    doc.chunk_count,
                    doc.modified_at.to_rfc3339()
                );
            }
        }
        Command::Serve => {
            let synthesizer = build_synthesizer(&config)?;
            let ctx = McpContext {
                db: Arc::new(TokioMutex::new(db)),
                config: Arc::new(config),
                embedder: Arc::clone(&embedder),
                synthesizer: Arc::clone(&synthesizer),
                retriever: Arc::new(retriever),
            };

            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(McpServer::new(ctx).start())?;
            drop(runtime);
            drop(synthesizer);
        }
    }

    drop(embedder);
    Ok(())
}

fn api_key(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Some(key),
        _ => {
            warn!("{var} is not set, sending requests without credentials");
            None
        }
    }
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let cfg = &config.embedding;
    let embedder: Arc<dyn Embedder> = match cfg.provider.as_str() {
        "openai" => {
            info!("Using embedding model {} at {}", cfg.model, cfg.endpoint);
            Arc::new(HttpEmbedder::new(
                &cfg.endpoint,
                &cfg.model,
                api_key(&cfg.api_key_env),
                cfg.dimensions,
            )?)
        }
        _ => Arc::new(HashEmbedder::new(cfg.dimensions)),
    };
    Ok(embedder)
}

fn build_synthesizer(config: &Config) -> Result<Arc<dyn Synthesizer>> {
    let llm = &config.llm;
    let synthesizer: Arc<dyn Synthesizer> = match &llm.endpoint {
        Some(endpoint) => {
            info!("Using chat model {} at {endpoint}", llm.model);
            Arc::new(ChatSynthesizer::new(
                endpoint,
                &llm.model,
                api_key(&llm.api_key_env),
                llm.temperature,
            )?)
        }
        None => Arc::new(ExtractiveSynthesizer::default()),
    };
    Ok(synthesizer)
}
