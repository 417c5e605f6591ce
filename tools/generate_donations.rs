//! Synthetic Donation Generator
//!
//! Writes labeled donations to CSV for training and demos, or streams
//! unlabeled JSON payloads for the scoring loop.

use anyhow::Result;
use clap::Parser;
use donation_fraud_detector::synthetic::DonationGenerator;
use donation_fraud_detector::training;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "generate_donations", about = "Generate synthetic labeled donations")]
struct Args {
    /// Number of donations to generate
    #[arg(short = 'n', long, default_value_t = 25_000)]
    count: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV path
    #[arg(short, long, default_value = "data/donations.csv")]
    output: PathBuf,

    /// Print JSON payloads to stdout instead of writing CSV
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_donations=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut generator = DonationGenerator::new(args.seed)?;
    let donations = generator.generate_batch(args.count);
    let frauds = donations.iter().filter(|d| d.label.is_fraud()).count();

    if args.json {
        let mut out = BufWriter::new(io::stdout().lock());
        for donation in &donations {
            serde_json::to_writer(&mut out, &donation.record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    } else {
        if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        training::write_dataset(&args.output, &donations)?;
        info!(path = %args.output.display(), "Dataset written");
    }

    info!(
        generated = donations.len(),
        frauds,
        fraud_rate = format!("{:.2}%", frauds as f64 / donations.len().max(1) as f64 * 100.0),
        "Generation complete"
    );
    Ok(())
}
