//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.textassay.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::normalize::NormalizationOptions;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".textassay.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Provider endpoints and timeouts.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default normalization toggles.
    #[serde(default)]
    pub normalize: NormalizationOptions,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Maximum records in flight at once (0 = no limit).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "textassay_report.md".to_string()
}

fn default_concurrency() -> usize {
    16
}

/// Base URLs of the scoring providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Local classifier service.
    #[serde(default = "default_provider_url")]
    pub classifier_url: String,

    /// First generative-model service.
    #[serde(default = "default_provider_url")]
    pub llama_url: String,

    /// Second generative-model service.
    #[serde(default = "default_provider_url")]
    pub gemini_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            classifier_url: default_provider_url(),
            llama_url: default_provider_url(),
            gemini_url: default_provider_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_provider_url() -> String {
    "http://localhost:5800".to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Characters of record text kept in series previews.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Include the full per-record results table.
    #[serde(default = "default_true")]
    pub include_raw_table: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            include_raw_table: true,
        }
    }
}

fn default_preview_chars() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given. Normalization flags can only turn a
    /// transform on.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.classifier_url {
            self.providers.classifier_url = url.clone();
        }
        if let Some(ref url) = args.llama_url {
            self.providers.llama_url = url.clone();
        }
        if let Some(ref url) = args.gemini_url {
            self.providers.gemini_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.providers.timeout_seconds = timeout;
        }

        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        let normalize = &mut self.normalize;
        normalize.remove_punctuation |= args.remove_punctuation;
        normalize.to_lower_case |= args.lowercase;
        normalize.remove_stop_words |= args.remove_stop_words;
        normalize.remove_numbers |= args.remove_numbers;
        normalize.trim_whitespace |= args.trim_whitespace;

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged settings before any provider is called.
    pub fn validate(&self) -> Result<()> {
        if self.providers.timeout_seconds == 0 {
            bail!("providers.timeout_seconds must be at least 1 second");
        }

        let urls = [
            ("classifier_url", &self.providers.classifier_url),
            ("llama_url", &self.providers.llama_url),
            ("gemini_url", &self.providers.gemini_url),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!(
                    "providers.{} must start with 'http://' or 'https://': {}",
                    name,
                    url
                );
            }
        }

        Ok(())
    }

    /// Log level from the merged verbosity; `quiet` wins over verbose.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
