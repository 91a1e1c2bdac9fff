//! TextAssay - side-by-side comparison of text-analysis providers
//!
//! A CLI tool that loads a `text@label` dataset, normalizes it, sends
//! every record to the two providers of each selected dimension and
//! writes a report with the raw comparison table and derived views.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing dataset, empty input, unknown dimension, etc.)
//!   2 - A provider call failed and --fail-on-provider-errors was set

mod analysis;
mod cli;
mod config;
mod dataset;
mod engine;
mod error;
mod models;
mod normalize;
mod provider;
mod registry;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use engine::ComparisonEngine;
use error::PipelineError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{DimensionReport, Report, ReportMetadata, RunStats};
use provider::HttpProviderClient;
use registry::{DimensionDescriptor, Registry};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration; CLI values win
    let config = match load_config(&args) {
        Ok(mut config) => {
            config.merge_with_args(&args);
            config
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("TextAssay v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run_comparison(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Comparison failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .textassay.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set provider URLs, timeouts and normalization defaults.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete comparison workflow. Returns exit code (0 or 2).
async fn run_comparison(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let registry = Registry::builtin(&config.providers);

    if args.list_dimensions {
        return handle_list_dimensions(&registry);
    }

    // Step 1: Load the dataset
    let input = args
        .input
        .as_deref()
        .context("A dataset file is required (--input)")?;
    println!("📥 Loading dataset: {}", input.display());
    let records = dataset::load_dataset(input)?;
    let labels = dataset::label_histogram(&records);

    // Step 2: Normalize
    let normalization = config.normalize.enabled();
    let cleaned = normalize::normalize(&records, &config.normalize);
    info!(
        "Normalized {} records ({})",
        cleaned.len(),
        if normalization.is_empty() {
            "no transforms".to_string()
        } else {
            normalization.join(" → ")
        }
    );

    if args.dry_run {
        return handle_dry_run(&cleaned, &normalization);
    }

    // Step 3: Resolve every dimension before touching the network
    if cleaned.is_empty() {
        return Err(PipelineError::EmptyInput.into());
    }
    let descriptors = resolve_dimensions(&registry, &args)?;

    println!("🔌 Providers:");
    println!("   Classifier: {}", config.providers.classifier_url);
    println!("   Llama: {}", config.providers.llama_url);
    println!("   Gemini: {}", config.providers.gemini_url);
    println!("   Timeout: {}s", config.providers.timeout_seconds);

    // Step 4: Run the comparisons
    println!(
        "\n🔬 Comparing {} records across {} dimension(s)...\n",
        cleaned.len(),
        descriptors.len()
    );

    let client = HttpProviderClient::new(config.providers.timeout_seconds)?;
    let progress = progress_bar((cleaned.len() * descriptors.len()) as u64, args.quiet)?;
    let engine = ComparisonEngine::new(&registry, client)
        .with_concurrency(config.general.concurrency)
        .with_progress(progress.clone());

    let mut dimensions = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        progress.set_message(descriptor.id.clone());
        let rows = engine.run(&descriptor.id, &cleaned).await?;
        let view = match config.report.preview_chars {
            analysis::DEFAULT_PREVIEW_CHARS => analysis::aggregate(descriptor, &rows),
            chars => analysis::aggregate_with_preview(descriptor, &rows, chars),
        };
        let [spec_a, spec_b] = &descriptor.providers;

        dimensions.push(DimensionReport {
            id: descriptor.id.clone(),
            title: descriptor.title.clone(),
            providers: [spec_a.provider.to_string(), spec_b.provider.to_string()],
            stats: RunStats::from_rows(&rows),
            rows,
            view,
        });
    }
    progress.finish_and_clear();

    // Step 5: Build the report
    println!("📝 Generating report...");

    let failed_calls: usize = dimensions.iter().map(|d| d.stats.failed_calls()).sum();
    let duration = start_time.elapsed().as_secs_f64();

    let report = Report {
        metadata: ReportMetadata {
            input: input.display().to_string(),
            analysis_date: Utc::now(),
            records: records.len(),
            dimensions: dimensions.iter().map(|d| d.id.clone()).collect(),
            failed_calls,
            duration_seconds: duration,
        },
        normalization: normalization.iter().map(|s| s.to_string()).collect(),
        labels,
        dimensions,
    };

    // Step 6: Generate and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&output, &output_path)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&report);
    println!(
        "\n✅ Comparison complete! Report saved to: {}",
        output_path.display()
    );

    if args.fail_on_provider_errors && failed_calls > 0 {
        eprintln!(
            "\n⛔ {} provider call(s) failed. Failing (exit code 2).",
            failed_calls
        );
        return Ok(2);
    }

    Ok(0)
}

/// Look up every requested dimension, failing on the first unknown id.
fn resolve_dimensions<'a>(
    registry: &'a Registry,
    args: &Args,
) -> Result<Vec<&'a DimensionDescriptor>, PipelineError> {
    if args.all {
        return Ok(registry.descriptors().iter().collect());
    }

    let mut descriptors: Vec<&DimensionDescriptor> = Vec::new();
    for id in &args.dimension {
        let descriptor = registry.lookup(id)?;
        if descriptors.iter().any(|d| d.id == descriptor.id) {
            warn!("Dimension {} requested more than once", descriptor.id);
            continue;
        }
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Build the record progress bar, hidden in quiet mode.
fn progress_bar(len: u64, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Print per-dimension results to the console.
fn print_summary(report: &Report) {
    println!("\n📊 Comparison Summary:");
    println!("   Records: {}", report.metadata.records);

    for dimension in &report.dimensions {
        println!("\n   {} ({})", dimension.title, dimension.id);
        for group in &dimension.view.distribution {
            let buckets: Vec<String> = group
                .entries
                .iter()
                .map(|e| format!("{}: {}", e.bucket, e.count))
                .collect();
            println!("   - {}: {}", group.source, buckets.join(" | "));
        }
        if let Some(rate) = dimension.view.agreement.as_ref().and_then(|a| a.rate()) {
            println!("   - agreement: {:.1}%", rate * 100.0);
        }
        if dimension.stats.failed_calls() > 0 {
            println!(
                "   - ⚠️  failed calls: {} / {}",
                dimension.stats.provider_a_failures, dimension.stats.provider_b_failures
            );
        }
    }

    println!("\n   Duration: {:.1}s", report.metadata.duration_seconds);
}

/// Handle --list-dimensions: print the registry and exit.
fn handle_list_dimensions(registry: &Registry) -> Result<i32> {
    println!("Available dimensions:\n");
    for descriptor in registry.descriptors() {
        let [spec_a, spec_b] = &descriptor.providers;
        println!(
            "  {:<24} {} ({} vs {})",
            descriptor.id, descriptor.title, spec_a.provider, spec_b.provider
        );
        println!("  {:<24} buckets: {}", "", descriptor.taxonomy.labels().join(", "));
    }
    Ok(0)
}

/// Handle --dry-run: print the cleaned records, make no provider calls.
fn handle_dry_run(cleaned: &[String], normalization: &[&str]) -> Result<i32> {
    println!("\n🔍 Dry run: normalizing only (no provider calls)...\n");

    if normalization.is_empty() {
        println!("   Normalization: none");
    } else {
        println!("   Normalization: {}", normalization.join(" → "));
    }

    if cleaned.is_empty() {
        println!("   No records found.");
    } else {
        println!("   {} cleaned records:\n", cleaned.len());
        for (i, text) in cleaned.iter().enumerate() {
            println!("     {:>4}. {}", i + 1, text);
        }
    }

    println!("\n✅ Dry run complete. No provider calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
