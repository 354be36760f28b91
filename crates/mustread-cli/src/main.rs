//! MustRead - research paper triage CLI
//!
//! The `mustread` command runs a batch of papers through the
//! summarizer, classifier, novelty and scoring roles and ranks the result.
//!
//! ## Commands
//!
//! - `run`: Analyse papers from a JSON file and write the results
//! - `demo`: Analyse the built-in sample papers with the rule-based backend
//! - `config`: Print the effective configuration as TOML

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use mustread_core::{
    cancel_channel, llm_roles, render_ranked_report, rule_based_roles, sample_papers,
    write_ranked_report, write_results_json, AnalysisConfig, Arbiter, BatchSummary, ChatBackend,
    ConflictResolver, ItemResult, LlmArbiter, OpenAiChat, Paper, ResultsArtifact,
    RuleBasedArbiter, WorkflowCoordinator,
};

#[derive(Parser)]
#[command(name = "mustread")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-role triage of research papers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a batch of papers
    Run {
        /// Papers to analyse (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Role backend
        #[arg(short, long, value_enum, default_value_t = Backend::Heuristic)]
        backend: Backend,

        /// Write the results artifact (JSON) here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the ranked report (markdown) here instead of stdout
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Analyse the built-in sample papers offline
    Demo {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Offline keyword rules
    Heuristic,
    /// OpenAI-compatible chat completions
    Llm,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mustread_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            input,
            config,
            backend,
            output,
            report,
        } => {
            cmd_run(
                &input,
                config.as_deref(),
                backend,
                output.as_deref(),
                report.as_deref(),
            )
            .await
        }
        Commands::Demo { config } => cmd_demo(config.as_deref()).await,
        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(AnalysisConfig::default()),
    }
}

fn load_papers(path: &Path) -> Result<Vec<Paper>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read papers: {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Papers file is not valid JSON: {:?}", path))
}

fn build_coordinator(config: &AnalysisConfig, backend: Backend) -> Result<WorkflowCoordinator> {
    let (roles, arbiter) = match backend {
        Backend::Heuristic => {
            let arbiter: Arc<dyn Arbiter> = Arc::new(RuleBasedArbiter);
            (rule_based_roles(config)?, arbiter)
        }
        Backend::Llm => {
            let api_key = config.llm.api_key()?;
            let chat: Arc<dyn ChatBackend> = Arc::new(
                OpenAiChat::new(config.llm.clone(), api_key)
                    .context("Failed to build chat client")?,
            );
            let arbiter: Arc<dyn Arbiter> = Arc::new(LlmArbiter::new(chat.clone()));
            (llm_roles(chat, config)?, arbiter)
        }
    };

    let resolver = ConflictResolver::new(config.conflict.clone(), config.categories.clone(), arbiter);
    WorkflowCoordinator::new(roles, resolver, &config.coordinator)
        .context("Failed to set up workflow coordinator")
}

/// Run the batch, cancelling in-flight papers on Ctrl+C.
async fn run_interruptible(coordinator: &WorkflowCoordinator, papers: &[Paper]) -> Vec<ItemResult> {
    let (cancel_tx, cancel_rx) = cancel_channel();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling remaining papers");
            let _ = cancel_tx.send(true);
        }
    });

    let results = coordinator.run_with_cancel(papers, cancel_rx).await;
    watcher.abort();
    results
}

fn print_summary(results: &[ItemResult]) {
    let summary = BatchSummary::from_results(results);
    println!(
        "Analysed {} papers: {} succeeded, {} failed, {} with conflicts",
        summary.total, summary.succeeded, summary.failed, summary.conflicted
    );
}

async fn cmd_run(
    input: &Path,
    config: Option<&Path>,
    backend: Backend,
    output: Option<&Path>,
    report: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let papers = load_papers(input)?;
    let coordinator = build_coordinator(&config, backend)?;

    info!(papers = papers.len(), backend = ?backend, "Starting analysis");
    let results = run_interruptible(&coordinator, &papers).await;
    let generated_at = Utc::now();

    if let Some(path) = output {
        write_results_json(path, &ResultsArtifact::new(results.clone(), generated_at))?;
        println!("Wrote results to {:?}", path);
    }

    match report {
        Some(path) => {
            write_ranked_report(path, &results, generated_at)?;
            println!("Wrote report to {:?}", path);
        }
        None => println!("{}", render_ranked_report(&results, generated_at)),
    }

    print_summary(&results);
    Ok(())
}

async fn cmd_demo(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let coordinator = build_coordinator(&config, Backend::Heuristic)?;

    let results = run_interruptible(&coordinator, &sample_papers()).await;
    println!("{}", render_ranked_report(&results, Utc::now()));
    print_summary(&results);
    Ok(())
}

fn cmd_config(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
