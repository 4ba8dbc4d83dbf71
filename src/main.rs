//! SegmentForge: telecom customer segmentation CLI
//!
//! Entrypoint that dispatches data generation, training, single-customer
//! prediction and the segment overview.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use segmentforge::cli::{parse_field_assignments, Command, TrainArgs};
use segmentforge::{
    create_cluster_size_chart, generate_customers, load_csv, train_detailed, write_csv, Args,
    ArtifactBundle, ClusterProfile, RawRecord, SegmentationService,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.verbose {
        println!("SegmentForge - Telecom Customer Segmentation");
        println!("============================================\n");
    }

    match &args.command {
        Command::Generate { rows, output, seed } => run_generate(*rows, output, *seed),
        Command::Train(train_args) => run_training(train_args, args.verbose),
        Command::Predict {
            bundle,
            fields,
            record,
        } => run_prediction(bundle, fields, record.as_deref()),
        Command::Profiles { bundle } => run_overview(bundle),
    }
}

fn run_generate(rows: usize, output: &Path, seed: u64) -> Result<()> {
    let dataset = generate_customers(rows, seed);
    write_csv(&dataset, output)?;
    println!("✓ Generated {} customers into {}", dataset.len(), output.display());
    Ok(())
}

/// Run the full training pipeline
fn run_training(args: &TrainArgs, verbose: bool) -> Result<()> {
    println!("=== Training Pipeline ===\n");
    let start_time = Instant::now();
    let config = args.resolve_config()?;

    let dataset = load_csv(&args.input)
        .with_context(|| format!("loading training data from {}", args.input.display()))?;
    println!("✓ Data loaded: {} customers", dataset.len());

    let outcome = train_detailed(&dataset, &config)?;
    let bundle = &outcome.bundle;
    let summary = bundle.summary();
    println!("✓ Model fitted with {} clusters", bundle.n_clusters());
    if verbose {
        for (column, median) in &summary.imputed_medians {
            println!("  Missing {} filled with median {:.2}", column, median);
        }
        println!("  Encoded dimensions: {}", bundle.encoder().width());
        println!("  Inertia: {:.2}", summary.inertia);
    }

    println!("\n=== Cluster Sizes ===");
    for (i, &size) in summary.cluster_sizes.iter().enumerate() {
        let percentage = size as f64 / summary.n_records.max(1) as f64 * 100.0;
        println!("Cluster {}: {} customers ({:.1}%)", i, size, percentage);
    }

    bundle.save(&args.bundle)?;
    println!("\n✓ Bundle saved to {}", args.bundle.display());

    if let Some(chart) = &args.chart {
        create_cluster_size_chart(&summary.cluster_sizes, chart)?;
        println!("✓ Cluster size chart saved to {}", chart.display());
    }

    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Predict the segment of a single customer
fn run_prediction(bundle_path: &Path, fields: &[String], record: Option<&Path>) -> Result<()> {
    println!("=== Prediction Mode ===");
    let service = SegmentationService::load(bundle_path)?;

    let outcome = match record {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading record from {}", path.display()))?;
            let raw: RawRecord = serde_json::from_str(&text)?;
            service.segment(&raw)
        }
        None => service.segment_form(&parse_field_assignments(fields)?),
    };

    match outcome {
        Ok((label, profile)) => {
            println!("\n✓ Predicted segment: {}", label);
            print_profile(&service.bundle(), &profile);
            Ok(())
        }
        Err(message) => {
            println!("\n✗ {}", message);
            bail!("prediction rejected")
        }
    }
}

/// Print every segment profile
fn run_overview(bundle_path: &Path) -> Result<()> {
    let service = SegmentationService::load(bundle_path)?;
    let bundle = service.bundle();

    println!("=== Segment Overview ===");
    for (id, profile) in bundle.profiles().iter().enumerate() {
        let size = bundle.summary().cluster_sizes.get(id).copied().unwrap_or(0);
        println!("\nCluster {} ({} customers)", id, size);
        print_profile(&bundle, profile);
    }
    Ok(())
}

fn print_profile(bundle: &ArtifactBundle, profile: &ClusterProfile) {
    if profile.is_empty() {
        println!("  (no members)");
        return;
    }
    for name in bundle.expected_columns() {
        if let Some(value) = profile.get(&name) {
            println!("  {:<18} {}", name, value);
        }
    }
}
