//! Donation Fraud Detector - Main Entry Point
//!
//! `train` fits the preprocessor and anomaly model from a labeled CSV.
//! `score` reads one JSON donation per stdin line and writes one JSON
//! response per line to stdout in input order, scoring donations in
//! parallel.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use donation_fraud_detector::{
    config::{AppConfig, LoggingConfig},
    metrics::ScoringMetrics,
    serving::{self, ResponseSequencer},
    training, ArtifactStore, Detector,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "donation-fraud", version, about = "Charity donation fraud detector")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit and persist the model from a labeled donation CSV
    Train {
        /// Labeled dataset
        #[arg(long)]
        data: PathBuf,
    },
    /// Score JSON donations read line by line from stdin
    Score,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config.logging)?;
    info!(config = %cli.config.display(), "Configuration loaded successfully");

    match cli.command {
        Command::Train { data } => run_training(&config, &data),
        Command::Score => run_scoring(config).await,
    }
}

/// Logs go to stderr so stdout carries only responses
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("donation_fraud_detector={}", logging.level).parse()?)
        .add_directive(format!("donation_fraud={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.pretty().init(),
    }
    Ok(())
}

fn run_training(config: &AppConfig, data: &Path) -> Result<()> {
    info!(
        strategy = config.model.algorithm.as_str(),
        contamination = config.model.contamination,
        "Starting training job"
    );

    let dataset = training::load_dataset(data)?;
    let trained = training::train(config, &dataset)?;
    training::persist(&trained, &ArtifactStore::from_config(&config.paths))?;

    println!("{}", serde_json::to_string_pretty(&trained.report)?);
    info!("Training complete");
    Ok(())
}

async fn run_scoring(config: AppConfig) -> Result<()> {
    let detector = Arc::new(Detector::new(ArtifactStore::from_config(&config.paths)));
    if let Err(e) = detector.load() {
        warn!(error = %e, "Model not loaded at startup, retrying on first donation");
    }

    let metrics = Arc::new(ScoringMetrics::new());
    let num_workers = config.pipeline.workers;
    info!(workers = num_workers, "Reading donations from stdin");

    // Semaphore to limit concurrent scoring
    let semaphore = Arc::new(Semaphore::new(num_workers));

    // Single writer emits responses in input order
    let (tx, mut rx) = mpsc::unbounded_channel::<(u64, String)>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut sequencer = ResponseSequencer::new();
        while let Some((seq, response)) = rx.recv().await {
            for line in sequencer.push(seq, response) {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
            stdout.flush().await?;
        }
        if sequencer.pending() > 0 {
            warn!(pending = sequencer.pending(), "Responses dropped at shutdown");
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seq: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let line_seq = seq;
        seq += 1;

        let permit = semaphore.clone().acquire_owned().await?;
        let detector = detector.clone();
        let metrics = metrics.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let response = serving::score_line(&detector, &metrics, &line).unwrap_or_else(|e| {
                error!(error = %e, "Failed to encode response");
                serde_json::json!({
                    "donation_id": null,
                    "status": 500,
                    "detail": "response encoding failed"
                })
                .to_string()
            });
            if tx.send((line_seq, response)).is_err() {
                error!("Response writer closed");
            }

            let count = line_seq + 1;
            if count % 100 == 0 {
                let latency = metrics.latency_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} don/s", metrics.throughput()),
                    avg_latency_us = latency.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    // Wait for in-flight donations before closing the writer
    let _drained = semaphore.acquire_many(num_workers as u32).await?;
    drop(tx);
    writer.await??;

    info!("Input closed, shutting down");
    metrics.print_summary();
    Ok(())
}
