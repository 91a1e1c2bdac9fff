//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// TextAssay - compare text-analysis providers side by side
///
/// Load a `text@label` dataset, normalize it, send every record to the two
/// providers of each selected dimension and write a Markdown/JSON report
/// with the raw comparison table and the derived distributions.
///
/// Examples:
///   textassay --input reviews.txt --dimension sentiment
///   textassay -i reviews.txt -d bias,toxicity --lowercase --trim-whitespace
///   textassay -i reviews.txt --all --format json -o report.json
///   textassay -i reviews.txt --all --remove-stop-words --dry-run
///   textassay --list-dimensions
///   textassay --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dataset file with one `text@label` record per line
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "list_dimensions"]
    )]
    pub input: Option<PathBuf>,

    /// Dimensions to run (comma-separated or repeated)
    ///
    /// Values: sentiment, bias, toxicity, hallucination, factuality,
    /// quantitative-reasoning
    #[arg(short, long, value_name = "ID", value_delimiter = ',')]
    pub dimension: Vec<String>,

    /// Run every built-in dimension
    #[arg(long, conflicts_with = "dimension")]
    pub all: bool,

    /// Strip punctuation from every record
    #[arg(long)]
    pub remove_punctuation: bool,

    /// Lowercase every record
    #[arg(long)]
    pub lowercase: bool,

    /// Drop common English stop words
    #[arg(long)]
    pub remove_stop_words: bool,

    /// Strip digits from every record
    #[arg(long)]
    pub remove_numbers: bool,

    /// Collapse whitespace runs and trim the ends
    #[arg(long)]
    pub trim_whitespace: bool,

    /// Base URL of the classifier service
    #[arg(long, value_name = "URL", env = "TEXTASSAY_CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Base URL of the Llama service
    #[arg(long, value_name = "URL", env = "TEXTASSAY_LLAMA_URL")]
    pub llama_url: Option<String>,

    /// Base URL of the Gemini service
    #[arg(long, value_name = "URL", env = "TEXTASSAY_GEMINI_URL")]
    pub gemini_url: Option<String>,

    /// Per-request timeout in seconds
    ///
    /// Default: from config or 60s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum records in flight at once (0 = no limit)
    ///
    /// Default: from config or 16.
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Output file path for the report
    ///
    /// Default: from config or textassay_report.md.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .textassay.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load and normalize the dataset without calling providers
    ///
    /// Prints the cleaned records and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// List the available dimensions and exit
    #[arg(long)]
    pub list_dimensions: bool,

    /// Exit with code 2 if any provider call failed
    ///
    /// Useful for CI pipelines.
    #[arg(long)]
    pub fail_on_provider_errors: bool,

    /// Generate a default .textassay.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config || self.list_dimensions {
            return Ok(());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Dataset file does not exist: {}", input.display()));
            }
        }

        if !self.dry_run && !self.all && self.dimension.is_empty() {
            return Err("Select at least one dimension with --dimension or use --all".to_string());
        }

        for url in [&self.classifier_url, &self.llama_url, &self.gemini_url]
            .into_iter()
            .flatten()
        {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "Provider URL must start with 'http://' or 'https://': {}",
                    url
                ));
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }
}
