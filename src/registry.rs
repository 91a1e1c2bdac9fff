//! Dimension registry.
//!
//! Each analysis dimension is described by a [`DimensionDescriptor`]: the
//! two providers it calls, how their payloads are read, and the taxonomy
//! used to bucket what they return. The comparison engine and aggregator
//! are generic over these descriptors.

use serde_json::Value;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;
use tracing::debug;

use crate::config::ProvidersConfig;
use crate::error::{PipelineError, ProviderFailure};
use crate::models::{Cell, ProviderId, ProviderResult, Reading};

/// Built-in analysis dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionId {
    Sentiment,
    Bias,
    Toxicity,
    Hallucination,
    Factuality,
    QuantitativeReasoning,
}

impl DimensionId {
    pub const ALL: [DimensionId; 6] = [
        DimensionId::Sentiment,
        DimensionId::Bias,
        DimensionId::Toxicity,
        DimensionId::Hallucination,
        DimensionId::Factuality,
        DimensionId::QuantitativeReasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionId::Sentiment => "sentiment",
            DimensionId::Bias => "bias",
            DimensionId::Toxicity => "toxicity",
            DimensionId::Hallucination => "hallucination",
            DimensionId::Factuality => "factuality",
            DimensionId::QuantitativeReasoning => "quantitative-reasoning",
        }
    }
}

impl fmt::Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentiment" => Ok(DimensionId::Sentiment),
            "bias" => Ok(DimensionId::Bias),
            "toxicity" => Ok(DimensionId::Toxicity),
            "hallucination" => Ok(DimensionId::Hallucination),
            "factuality" => Ok(DimensionId::Factuality),
            "quantitative-reasoning" | "quantitative_reasoning" | "quantitative" | "quant" => {
                Ok(DimensionId::QuantitativeReasoning)
            }
            _ => Err(PipelineError::UnknownDimension {
                id: s.to_string(),
                available: DimensionId::ALL
                    .iter()
                    .map(DimensionId::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// How a provider family lays out its JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `[[{"label": ..., "score": ...}, ...]]`; the first score is used.
    ClassifierScores,
    /// `{"candidates": [{"content": {"parts": [{"text": ...}]}}]}`.
    CandidateText,
}

impl ResponseShape {
    fn name(&self) -> &'static str {
        match self {
            ResponseShape::ClassifierScores => "classifier score",
            ResponseShape::CandidateText => "candidate text",
        }
    }

    /// Read the value this shape carries out of a payload.
    pub fn read(&self, payload: &Value) -> Result<Reading, ProviderFailure> {
        let reading = match self {
            ResponseShape::ClassifierScores => payload
                .get(0)
                .and_then(|inner| inner.get(0))
                .and_then(|best| best.get("score"))
                .and_then(parse_score)
                .map(Reading::Score),
            ResponseShape::CandidateText => payload
                .pointer("/candidates/0/content/parts/0/text")
                .and_then(Value::as_str)
                .map(|text| Reading::Text(text.to_string())),
        };

        reading.ok_or(ProviderFailure::UnparsableResponse(self.name()))
    }
}

/// Accepts JSON numbers and numeric strings.
fn parse_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite())
}

/// One provider call a dimension makes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSpec {
    pub provider: ProviderId,
    pub url: String,
    pub shape: ResponseShape,
}

impl ProviderSpec {
    pub fn new(provider: ProviderId, url: impl Into<String>, shape: ResponseShape) -> Self {
        Self {
            provider,
            url: url.into(),
            shape,
        }
    }

    fn at(provider: ProviderId, base: &str, path: &str, shape: ResponseShape) -> Self {
        Self::new(
            provider,
            format!("{}{}", base.trim_end_matches('/'), path),
            shape,
        )
    }
}

/// A labeled numeric interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
    pub label: &'static str,
}

impl NumericRange {
    /// `[lower, upper)`
    pub fn closed_open(lower: f64, upper: f64, label: &'static str) -> Self {
        Self {
            lower: Bound::Included(lower),
            upper: Bound::Excluded(upper),
            label,
        }
    }

    /// `[lower, upper]`
    pub fn closed(lower: f64, upper: f64, label: &'static str) -> Self {
        Self {
            lower: Bound::Included(lower),
            upper: Bound::Included(upper),
            label,
        }
    }

    /// `(lower, upper]`
    pub fn open_closed(lower: f64, upper: f64, label: &'static str) -> Self {
        Self {
            lower: Bound::Excluded(lower),
            upper: Bound::Included(upper),
            label,
        }
    }

    /// `(lower, ∞)`
    pub fn above(lower: f64, label: &'static str) -> Self {
        Self {
            lower: Bound::Excluded(lower),
            upper: Bound::Unbounded,
            label,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower, self.upper).contains(&value)
    }
}

/// The buckets a dimension sorts provider answers into.
#[derive(Debug, Clone, PartialEq)]
pub enum Taxonomy {
    /// Labels matched as case-insensitive substrings, first match wins.
    Categorical(Vec<&'static str>),
    /// Numeric ranges, first containing range wins.
    Numeric(Vec<NumericRange>),
}

impl Taxonomy {
    /// Bucket labels in display order.
    pub fn labels(&self) -> Vec<&'static str> {
        match self {
            Taxonomy::Categorical(labels) => labels.clone(),
            Taxonomy::Numeric(ranges) => ranges.iter().map(|r| r.label).collect(),
        }
    }

    /// Whether answers of this shape can be bucketed by this taxonomy.
    pub fn accepts(&self, shape: ResponseShape) -> bool {
        matches!(
            (self, shape),
            (Taxonomy::Categorical(_), ResponseShape::CandidateText)
                | (Taxonomy::Numeric(_), ResponseShape::ClassifierScores)
        )
    }

    /// Bucket a reading; `None` when it is unrecognized.
    pub fn classify(&self, reading: &Reading) -> Option<&'static str> {
        match (self, reading) {
            (Taxonomy::Categorical(labels), Reading::Text(text)) => classify_text(labels, text),
            (Taxonomy::Numeric(_), Reading::Score(score)) => self.bucket_value(*score),
            _ => None,
        }
    }

    /// Bucket a bare number against numeric ranges.
    pub fn bucket_value(&self, value: f64) -> Option<&'static str> {
        match self {
            Taxonomy::Numeric(ranges) => ranges
                .iter()
                .find(|range| range.contains(value))
                .map(|range| range.label),
            Taxonomy::Categorical(_) => None,
        }
    }
}

fn classify_text(labels: &[&'static str], text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    labels
        .iter()
        .find(|label| lowered.contains(&label.to_lowercase()))
        .copied()
}

/// What the distribution view counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSource {
    /// Each provider whose answers the taxonomy accepts.
    Providers,
    /// The mean of the numbers found in each record's text.
    ExtractedNumbers,
}

/// Two numeric axes plotted against each other, one point per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// x = count of numbers in the text, y = text length in characters.
    NumberCountVsTextLength,
}

/// Everything the engine and aggregator need to know about a dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionDescriptor {
    pub id: String,
    pub title: String,
    pub providers: [ProviderSpec; 2],
    pub taxonomy: Taxonomy,
    pub bucket_source: BucketSource,
    pub correlation: Option<Correlation>,
    /// Add `1 - score` of each score provider to the series as `confidence`.
    pub confidence_series: bool,
}

impl DimensionDescriptor {
    /// Whether this provider's answers are bucketed into the taxonomy.
    pub fn is_bucketed(&self, spec: &ProviderSpec) -> bool {
        self.bucket_source == BucketSource::Providers && self.taxonomy.accepts(spec.shape)
    }

    /// Free-text answers under a numeric taxonomy are shown but never bucketed.
    pub fn is_commentary(&self, spec: &ProviderSpec) -> bool {
        matches!(self.taxonomy, Taxonomy::Numeric(_))
            && spec.shape == ResponseShape::CandidateText
    }

    /// Whether rows need the numbers extracted from their text.
    pub fn uses_numbers(&self) -> bool {
        self.bucket_source == BucketSource::ExtractedNumbers || self.correlation.is_some()
    }

    /// Derive the display cell for one provider result.
    pub fn read_cell(&self, spec: &ProviderSpec, result: &ProviderResult) -> Cell {
        let Some(payload) = result.payload.as_ref().filter(|_| !result.failed) else {
            return Cell::unreadable();
        };

        let reading = match spec.shape.read(payload) {
            Ok(reading) => reading,
            Err(failure) => {
                debug!("{} response for {}: {}", spec.provider, self.id, failure);
                return Cell::unreadable();
            }
        };

        let bucket = if self.is_bucketed(spec) {
            self.taxonomy.classify(&reading).map(str::to_string)
        } else {
            None
        };

        Cell { reading, bucket }
    }
}

/// Lookup table of dimension descriptors.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: Vec<DimensionDescriptor>,
}

impl Registry {
    /// The six built-in dimensions, bound to the configured provider URLs.
    pub fn builtin(providers: &ProvidersConfig) -> Self {
        Self::with_descriptors(
            DimensionId::ALL
                .iter()
                .map(|id| builtin_descriptor(*id, providers))
                .collect(),
        )
    }

    pub fn with_descriptors(descriptors: Vec<DimensionDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Find a descriptor by id. Built-in aliases are accepted.
    pub fn lookup(&self, id: &str) -> Result<&DimensionDescriptor, PipelineError> {
        let canonical = match DimensionId::from_str(id) {
            Ok(builtin) => builtin.as_str().to_string(),
            Err(_) => id.trim().to_lowercase(),
        };

        self.descriptors
            .iter()
            .find(|d| d.id == canonical)
            .ok_or_else(|| PipelineError::UnknownDimension {
                id: id.to_string(),
                available: self.ids().join(", "),
            })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn descriptors(&self) -> &[DimensionDescriptor] {
        &self.descriptors
    }
}

fn builtin_descriptor(id: DimensionId, urls: &ProvidersConfig) -> DimensionDescriptor {
    use ProviderId::{Classifier, Gemini, Llama};
    use ResponseShape::{CandidateText, ClassifierScores};

    let classifier = || {
        ProviderSpec::at(
            Classifier,
            &urls.classifier_url,
            "/api/hf-sentiment",
            ClassifierScores,
        )
    };
    let gemini =
        || ProviderSpec::at(Gemini, &urls.gemini_url, "/api/gemini-generate", CandidateText);

    let (title, providers, taxonomy) = match id {
        DimensionId::Sentiment => (
            "Sentiment Analysis",
            [
                ProviderSpec::at(Llama, &urls.llama_url, "/api/llama-generate", CandidateText),
                gemini(),
            ],
            Taxonomy::Categorical(vec!["Positive", "Negative", "Neutral"]),
        ),
        DimensionId::Bias => (
            "Bias Assessment",
            [
                ProviderSpec::at(Llama, &urls.llama_url, "/api/llama-bias", CandidateText),
                ProviderSpec::at(Gemini, &urls.gemini_url, "/api/gemini-bias", CandidateText),
            ],
            // "Unbiased" must come before "Biased" for first-match to work.
            Taxonomy::Categorical(vec!["Unbiased", "Neutral", "Biased"]),
        ),
        DimensionId::Toxicity => (
            "Toxicity Detection",
            [classifier(), gemini()],
            Taxonomy::Numeric(vec![
                NumericRange::closed_open(0.0, 0.3, "Non-Toxic"),
                NumericRange::closed_open(0.3, 0.6, "Mildly Toxic"),
                NumericRange::closed_open(0.6, 0.8, "Moderately Toxic"),
                NumericRange::closed(0.8, 1.0, "Highly Toxic"),
            ]),
        ),
        DimensionId::Hallucination => (
            "Hallucination Detection",
            [classifier(), gemini()],
            Taxonomy::Numeric(vec![
                NumericRange::closed_open(0.0, 0.3, "Low Risk"),
                NumericRange::closed_open(0.3, 0.7, "Medium Risk"),
                NumericRange::closed(0.7, 1.0, "High Risk"),
            ]),
        ),
        DimensionId::Factuality => (
            "Factuality Evaluation",
            [classifier(), gemini()],
            Taxonomy::Numeric(vec![
                NumericRange::open_closed(0.8, 1.0, "Highly Factual"),
                NumericRange::open_closed(0.6, 0.8, "Mostly Factual"),
                NumericRange::open_closed(0.4, 0.6, "Partially Factual"),
                NumericRange::closed(0.0, 0.4, "Not Factual"),
            ]),
        ),
        DimensionId::QuantitativeReasoning => (
            "Quantitative Analysis",
            [classifier(), gemini()],
            Taxonomy::Numeric(vec![
                NumericRange::closed(0.0, 33.0, "Low Range (0-33)"),
                NumericRange::open_closed(33.0, 66.0, "Mid Range (34-66)"),
                NumericRange::above(66.0, "High Range (67-100)"),
            ]),
        ),
    };

    let (bucket_source, correlation) = match id {
        DimensionId::QuantitativeReasoning => (
            BucketSource::ExtractedNumbers,
            Some(Correlation::NumberCountVsTextLength),
        ),
        _ => (BucketSource::Providers, None),
    };
    let confidence_series = id == DimensionId::Hallucination;

    DimensionDescriptor {
        id: id.as_str().to_string(),
        title: title.to_string(),
        providers,
        taxonomy,
        bucket_source,
        correlation,
        confidence_series,
    }
}
