//! CLI binary for asking questions of, and running analytics over, a document corpus.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use docsight_pipeline::{
    classify_query, AnalyticsOptions, ChatOptions, CorpusRetriever, EventEmitter,
    Orchestrator, OrchestratorConfig,
};
use docsight_types::AnalysisType;

#[derive(Parser)]
#[command(name = "docsight", version, about = "Document question answering and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the corpus, citing source pages
    Ask {
        query: String,

        /// JSON file of documents to search
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Don't call the model; echo what would be sent
        #[arg(long)]
        dry_run: bool,

        /// Never produce a chart
        #[arg(long)]
        no_charts: bool,
    },

    /// Run the analytics workflow over table data in the corpus
    Analyze {
        query: String,

        /// JSON file of documents to search
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Don't call the model; echo what would be sent
        #[arg(long)]
        dry_run: bool,

        /// Never produce a chart
        #[arg(long)]
        no_charts: bool,

        /// Skip the recommendations stage
        #[arg(long)]
        no_recommendations: bool,
    },

    /// Show how a query would be classified
    Classify { query: String },

    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[derive(Serialize)]
struct Classification<'a> {
    query: &'a str,
    analysis_type: AnalysisType,
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    config: &'a OrchestratorConfig,
    api_key_set: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ask {
            query,
            corpus,
            dry_run,
            no_charts,
        } => {
            let orchestrator = build_orchestrator(corpus.as_deref(), config, dry_run)?;
            let options = ChatOptions {
                include_charts: !no_charts,
            };
            let result = orchestrator.chat(&query, options).await;
            print_json(&result)?;
        }
        Commands::Analyze {
            query,
            corpus,
            dry_run,
            no_charts,
            no_recommendations,
        } => {
            let orchestrator = build_orchestrator(corpus.as_deref(), config, dry_run)?;
            let options = AnalyticsOptions {
                generate_chart: !no_charts,
                include_recommendations: !no_recommendations,
            };
            let report = orchestrator.analyze(&query, options).await;
            print_json(&report)?;
        }
        Commands::Classify { query } => {
            print_json(&Classification {
                analysis_type: classify_query(&query),
                query: &query,
            })?;
        }
        Commands::CheckConfig => {
            let api_key_set = ["DOCSIGHT_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .any(|k| std::env::var(k).is_ok_and(|v| !v.is_empty()));
            print_json(&ConfigReport {
                config: &config,
                api_key_set,
            })?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    match path {
        Some(p) => {
            let config = OrchestratorConfig::load(p)?;
            tracing::info!(path = %p.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(OrchestratorConfig::default()),
    }
}

fn load_corpus(path: Option<&Path>) -> anyhow::Result<CorpusRetriever> {
    match path {
        Some(p) => Ok(CorpusRetriever::load(p)?),
        None => {
            tracing::warn!("No --corpus given; every search will come back empty");
            Ok(CorpusRetriever::new(Vec::new()))
        }
    }
}

fn build_orchestrator(
    corpus: Option<&Path>,
    config: OrchestratorConfig,
    dry_run: bool,
) -> anyhow::Result<Orchestrator> {
    let retriever = Arc::new(load_corpus(corpus)?);
    if dry_run {
        tracing::info!("[dry-run] Model calls are simulated");
    }
    let emitter = EventEmitter::default();
    spawn_event_logger(&emitter);
    Ok(Orchestrator::with_retriever(retriever, config, dry_run)?.with_events(emitter))
}

/// Forward workflow events to the debug log.
fn spawn_event_logger(emitter: &EventEmitter) {
    let mut rx = emitter.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::debug!(event = ?event, "Workflow event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
