//! Data models for the comparison pipeline.
//!
//! This module contains the records, provider results, comparison rows,
//! aggregate views and report structures passed between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ProviderFailure;

/// Marker shown wherever a provider produced no usable value.
pub const NOT_AVAILABLE: &str = "N/A";

/// One parsed line of an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// The text to analyze.
    pub text: String,
    /// The user-supplied label (empty when absent).
    pub label: String,
}

impl RawRecord {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// The remote services a dimension can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Local classifier service returning label/score pairs.
    Classifier,
    /// First generative-model service.
    Llama,
    /// Second generative-model service.
    Gemini,
}

impl ProviderId {
    /// Stable key used for series fields and distribution sources.
    pub fn key(&self) -> &'static str {
        match self {
            ProviderId::Classifier => "classifier",
            ProviderId::Llama => "llama",
            ProviderId::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Classifier => write!(f, "Classifier"),
            ProviderId::Llama => write!(f, "Llama"),
            ProviderId::Gemini => write!(f, "Gemini"),
        }
    }
}

/// Outcome of one provider call for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: ProviderId,
    pub payload: Option<Value>,
    pub failed: bool,
    /// Why the call failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResult {
    /// A call that returned a JSON payload.
    pub fn success(provider: ProviderId, payload: Value) -> Self {
        Self {
            provider,
            payload: Some(payload),
            failed: false,
            error: None,
        }
    }

    /// A call that failed; the payload is always dropped.
    pub fn failure(provider: ProviderId, failure: &ProviderFailure) -> Self {
        Self {
            provider,
            payload: None,
            failed: true,
            error: Some(failure.to_string()),
        }
    }
}

/// The value read out of a provider payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reading {
    /// A numeric score.
    Score(f64),
    /// A free-text answer.
    Text(String),
    /// The call failed or the payload could not be read.
    Unreadable,
}

impl Reading {
    pub fn score(&self) -> Option<f64> {
        match self {
            Reading::Score(score) => Some(*score),
            _ => None,
        }
    }
}

/// One provider's derived value within a comparison row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub reading: Reading,
    /// Taxonomy bucket, when the reading was recognized.
    pub bucket: Option<String>,
}

impl Cell {
    pub fn unreadable() -> Self {
        Self {
            reading: Reading::Unreadable,
            bucket: None,
        }
    }

    /// Text shown in the raw results table.
    pub fn display(&self) -> String {
        match &self.reading {
            Reading::Score(score) => format!("{}", score),
            Reading::Text(text) => text.clone(),
            Reading::Unreadable => NOT_AVAILABLE.to_string(),
        }
    }
}

/// The merged result of both providers for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Zero-based position of the record in the cleaned input.
    pub index: usize,
    /// The cleaned text sent to the providers.
    pub text: String,
    pub provider_a: ProviderResult,
    pub provider_b: ProviderResult,
    pub cell_a: Cell,
    pub cell_b: Cell,
    /// Numbers extracted from the record text, for dimensions that use them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numbers: Vec<f64>,
}

impl ComparisonRow {
    /// Both providers' results with their cells, in provider order.
    pub fn cells(&self) -> [(&ProviderResult, &Cell); 2] {
        [
            (&self.provider_a, &self.cell_a),
            (&self.provider_b, &self.cell_b),
        ]
    }

    /// Mean of the extracted numbers, if any were found.
    pub fn average_number(&self) -> Option<f64> {
        if self.numbers.is_empty() {
            None
        } else {
            Some(self.numbers.iter().sum::<f64>() / self.numbers.len() as f64)
        }
    }
}

/// Per-provider call failure counts for one dimension run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub records: usize,
    pub provider_a_failures: usize,
    pub provider_b_failures: usize,
}

impl RunStats {
    pub fn from_rows(rows: &[ComparisonRow]) -> Self {
        Self {
            records: rows.len(),
            provider_a_failures: rows.iter().filter(|r| r.provider_a.failed).count(),
            provider_b_failures: rows.iter().filter(|r| r.provider_b.failed).count(),
        }
    }

    pub fn failed_calls(&self) -> usize {
        self.provider_a_failures + self.provider_b_failures
    }
}

/// Count of rows that landed in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub bucket: String,
    pub count: usize,
}

/// Bucket counts for one source (a provider, or the extracted numbers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionGroup {
    pub source: String,
    pub entries: Vec<DistributionEntry>,
}

impl DistributionGroup {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    #[allow(dead_code)] // Lookup helper for tests and library use
    pub fn count(&self, bucket: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.bucket == bucket)
            .map(|e| e.count)
            .unwrap_or(0)
    }
}

/// A charting value: a score or a bucket label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValue {
    Number(f64),
    Label(String),
}

impl fmt::Display for SeriesValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesValue::Number(n) => write!(f, "{}", n),
            SeriesValue::Label(label) => write!(f, "{}", label),
        }
    }
}

/// One row of the per-record series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// One-based position.
    pub index: usize,
    /// Shortened text for axis labels.
    pub preview: String,
    /// Values keyed by provider key (plus any dimension-specific keys).
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<SeriesValue>>,
}

/// One point of a correlation series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPoint {
    pub index: usize,
    pub x: f64,
    pub y: f64,
}

/// How often two categorical providers agreed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    /// Rows where both providers produced a recognized bucket.
    pub compared: usize,
    /// Rows where those buckets were identical.
    pub matching: usize,
}

impl Agreement {
    pub fn rate(&self) -> Option<f64> {
        if self.compared == 0 {
            None
        } else {
            Some(self.matching as f64 / self.compared as f64)
        }
    }
}

/// Summary of the numeric scores a provider returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub source: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Derived views over the rows of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateView {
    pub dimension: String,
    pub distribution: Vec<DistributionGroup>,
    pub series: Vec<SeriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Vec<CorrelationPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<Agreement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub score_summaries: Vec<ScoreSummary>,
}

impl AggregateView {
    /// The distribution group for a source key, if present.
    #[allow(dead_code)] // Lookup helper for tests and library use
    pub fn group(&self, source: &str) -> Option<&DistributionGroup> {
        self.distribution.iter().find(|g| g.source == source)
    }
}

/// Results of one dimension within a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionReport {
    pub id: String,
    pub title: String,
    /// Display names of provider A and provider B.
    pub providers: [String; 2],
    pub stats: RunStats,
    pub rows: Vec<ComparisonRow>,
    pub view: AggregateView,
}

/// Metadata about the comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the dataset file.
    pub input: String,
    /// Date and time of the run.
    pub analysis_date: DateTime<Utc>,
    /// Number of records in the dataset.
    pub records: usize,
    /// Dimension ids that were run.
    pub dimensions: Vec<String>,
    /// Provider calls that failed across all dimensions.
    pub failed_calls: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete comparison report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Enabled normalization transforms, in application order.
    pub normalization: Vec<String>,
    /// Record count per dataset label.
    pub labels: BTreeMap<String, usize>,
    pub dimensions: Vec<DimensionReport>,
}
