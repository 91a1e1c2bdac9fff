//! Aggregation of comparison rows into chartable views.
//!
//! Every view is recomputed from scratch from the rows; nothing here is
//! incremental. Unrecognized or unreadable values are left out of the
//! distributions but still show up as `None` in the series.

use std::collections::BTreeMap;

use crate::models::{
    AggregateView, Agreement, ComparisonRow, CorrelationPoint, DistributionEntry,
    DistributionGroup, Reading, ScoreSummary, SeriesPoint, SeriesValue,
};
use crate::registry::{BucketSource, Correlation, DimensionDescriptor, ResponseShape, Taxonomy};

/// Characters of text kept in series previews by default.
pub const DEFAULT_PREVIEW_CHARS: usize = 20;

/// Distribution source key for the extracted-number bucketing.
pub const EXTRACTED_NUMBERS: &str = "extracted_numbers";

/// Series key for the mean of the extracted numbers.
pub const AVERAGE_VALUE: &str = "average_value";

/// Series key for `1 - score`.
pub const CONFIDENCE: &str = "confidence";

/// Build every view for a dimension's rows.
pub fn aggregate(descriptor: &DimensionDescriptor, rows: &[ComparisonRow]) -> AggregateView {
    aggregate_with_preview(descriptor, rows, DEFAULT_PREVIEW_CHARS)
}

/// Like [`aggregate`], with a custom preview length for series labels.
pub fn aggregate_with_preview(
    descriptor: &DimensionDescriptor,
    rows: &[ComparisonRow],
    preview_chars: usize,
) -> AggregateView {
    AggregateView {
        dimension: descriptor.id.clone(),
        distribution: distribution(descriptor, rows),
        series: series(descriptor, rows, preview_chars),
        correlation: descriptor.correlation.map(|c| correlation(c, rows)),
        agreement: agreement(descriptor, rows),
        score_summaries: score_summaries(descriptor, rows),
    }
}

/// Bucket counts, one group per bucketed source, in taxonomy order.
pub fn distribution(descriptor: &DimensionDescriptor, rows: &[ComparisonRow]) -> Vec<DistributionGroup> {
    let labels = descriptor.taxonomy.labels();

    match descriptor.bucket_source {
        BucketSource::Providers => descriptor
            .providers
            .iter()
            .enumerate()
            .filter(|(_, spec)| descriptor.is_bucketed(spec))
            .map(|(slot, spec)| {
                let buckets = rows.iter().filter_map(|row| {
                    let cell = if slot == 0 { &row.cell_a } else { &row.cell_b };
                    cell.bucket.as_deref()
                });
                count_buckets(spec.provider.key(), &labels, buckets)
            })
            .collect(),
        BucketSource::ExtractedNumbers => {
            let buckets = rows.iter().filter_map(|row| {
                row.average_number()
                    .and_then(|mean| descriptor.taxonomy.bucket_value(mean))
            });
            vec![count_buckets(EXTRACTED_NUMBERS, &labels, buckets)]
        }
    }
}

fn count_buckets<'a>(
    source: &str,
    labels: &[&'static str],
    buckets: impl Iterator<Item = &'a str>,
) -> DistributionGroup {
    let mut entries: Vec<DistributionEntry> = labels
        .iter()
        .map(|label| DistributionEntry {
            bucket: label.to_string(),
            count: 0,
        })
        .collect();

    for bucket in buckets {
        if let Some(entry) = entries.iter_mut().find(|e| e.bucket == bucket) {
            entry.count += 1;
        }
    }

    DistributionGroup {
        source: source.to_string(),
        entries,
    }
}

/// One point per row, keyed by provider.
pub fn series(
    descriptor: &DimensionDescriptor,
    rows: &[ComparisonRow],
    preview_chars: usize,
) -> Vec<SeriesPoint> {
    rows.iter()
        .enumerate()
        .map(|(position, row)| {
            let mut values = BTreeMap::new();

            for (spec, (_, cell)) in descriptor.providers.iter().zip(row.cells()) {
                if descriptor.is_commentary(spec) {
                    continue;
                }
                let value = match (&descriptor.taxonomy, &cell.reading) {
                    (Taxonomy::Categorical(_), _) => cell.bucket.clone().map(SeriesValue::Label),
                    (_, Reading::Score(score)) => Some(SeriesValue::Number(*score)),
                    _ => None,
                };
                values.insert(spec.provider.key().to_string(), value);

                if descriptor.confidence_series && spec.shape == ResponseShape::ClassifierScores {
                    let confidence = cell.reading.score().map(|s| SeriesValue::Number(1.0 - s));
                    values.insert(CONFIDENCE.to_string(), confidence);
                }
            }

            if descriptor.uses_numbers() {
                let average = row.average_number().unwrap_or(0.0);
                values.insert(AVERAGE_VALUE.to_string(), Some(SeriesValue::Number(average)));
            }

            SeriesPoint {
                index: position + 1,
                preview: preview(&row.text, preview_chars),
                values,
            }
        })
        .collect()
}

/// One `{x, y}` point per row.
pub fn correlation(kind: Correlation, rows: &[ComparisonRow]) -> Vec<CorrelationPoint> {
    rows.iter()
        .enumerate()
        .map(|(position, row)| match kind {
            Correlation::NumberCountVsTextLength => CorrelationPoint {
                index: position + 1,
                x: row.numbers.len() as f64,
                y: row.text.chars().count() as f64,
            },
        })
        .collect()
}

/// Agreement between two categorical providers, when both are bucketed.
pub fn agreement(descriptor: &DimensionDescriptor, rows: &[ComparisonRow]) -> Option<Agreement> {
    let both_bucketed = descriptor.providers.iter().all(|s| descriptor.is_bucketed(s));
    if !both_bucketed || !matches!(descriptor.taxonomy, Taxonomy::Categorical(_)) {
        return None;
    }

    let pairs: Vec<_> = rows
        .iter()
        .filter_map(|row| row.cell_a.bucket.as_ref().zip(row.cell_b.bucket.as_ref()))
        .collect();

    Some(Agreement {
        compared: pairs.len(),
        matching: pairs.iter().filter(|(a, b)| a == b).count(),
    })
}

/// Mean, min and max of each score-returning provider.
pub fn score_summaries(descriptor: &DimensionDescriptor, rows: &[ComparisonRow]) -> Vec<ScoreSummary> {
    descriptor
        .providers
        .iter()
        .enumerate()
        .filter(|(_, spec)| spec.shape == ResponseShape::ClassifierScores)
        .map(|(slot, spec)| {
            let scores: Vec<f64> = rows
                .iter()
                .filter_map(|row| {
                    let cell = if slot == 0 { &row.cell_a } else { &row.cell_b };
                    cell.reading.score()
                })
                .collect();

            let count = scores.len();
            let mean = (count > 0).then(|| scores.iter().sum::<f64>() / count as f64);
            let min = scores.iter().copied().reduce(f64::min);
            let max = scores.iter().copied().reduce(f64::max);

            ScoreSummary {
                source: spec.provider.key().to_string(),
                count,
                mean,
                min,
                max,
            }
        })
        .collect()
}

/// Shorten text for axis labels, appending `...` when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;
    use crate::engine::build_row;
    use crate::error::ProviderFailure;
    use crate::models::{ProviderId, ProviderResult};
    use crate::registry::{NumericRange, ProviderSpec, Registry};
    use serde_json::{json, Value};

    fn registry() -> Registry {
        Registry::builtin(&ProvidersConfig::default())
    }

    fn text(answer: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": answer}]}}]})
    }

    fn score(value: f64) -> Value {
        json!([[{"label": "LABEL_1", "score": value}]])
    }

    fn ok(provider: ProviderId, payload: Value) -> ProviderResult {
        ProviderResult::success(provider, payload)
    }

    fn failed(provider: ProviderId) -> ProviderResult {
        ProviderResult::failure(provider, &ProviderFailure::Timeout(1))
    }

    fn bias_rows(descriptor: &DimensionDescriptor) -> Vec<ComparisonRow> {
        let answers = [
            ("a", Some("Unbiased."), Some("This is unbiased")),
            ("b", Some("Biased toward X"), Some("Neutral")),
            ("c", Some("no idea"), None),
            ("d", Some("neutral"), Some("NEUTRAL")),
        ];
        answers
            .iter()
            .enumerate()
            .map(|(i, (t, a, b))| {
                let result_a = a.map_or(failed(ProviderId::Llama), |a| ok(ProviderId::Llama, text(a)));
                let result_b =
                    b.map_or(failed(ProviderId::Gemini), |b| ok(ProviderId::Gemini, text(b)));
                build_row(descriptor, i, t, result_a, result_b)
            })
            .collect()
    }

    #[test]
    fn test_categorical_distribution_per_provider() {
        let registry = registry();
        let bias = registry.lookup("bias").unwrap();
        let view = aggregate(bias, &bias_rows(bias));

        assert_eq!(view.distribution.len(), 2);

        let llama = view.group("llama").unwrap();
        assert_eq!(llama.count("Unbiased"), 1);
        assert_eq!(llama.count("Neutral"), 1);
        assert_eq!(llama.count("Biased"), 1);
        // "no idea" is unrecognized.
        assert_eq!(llama.total(), 3);

        let gemini = view.group("gemini").unwrap();
        assert_eq!(gemini.count("Unbiased"), 1);
        assert_eq!(gemini.count("Neutral"), 2);
        assert_eq!(gemini.total(), 3);

        let labels: Vec<_> = llama.entries.iter().map(|e| e.bucket.as_str()).collect();
        assert_eq!(labels, vec!["Unbiased", "Neutral", "Biased"]);
    }

    #[test]
    fn test_distribution_never_exceeds_row_count() {
        let registry = registry();
        let bias = registry.lookup("bias").unwrap();
        let rows = bias_rows(bias);
        let view = aggregate(bias, &rows);

        for group in &view.distribution {
            assert!(group.total() <= rows.len());
        }
    }

    #[test]
    fn test_distribution_equals_row_count_when_all_recognized() {
        let registry = registry();
        let toxicity = registry.lookup("toxicity").unwrap();
        let rows: Vec<_> = [0.1, 0.35, 0.7, 0.95]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                build_row(
                    toxicity,
                    i,
                    "t",
                    ok(ProviderId::Classifier, score(*s)),
                    ok(ProviderId::Gemini, text("commentary")),
                )
            })
            .collect();

        let view = aggregate(toxicity, &rows);

        // The free-text provider is commentary only.
        assert_eq!(view.distribution.len(), 1);
        let group = view.group("classifier").unwrap();
        assert_eq!(group.total(), rows.len());
        assert_eq!(group.count("Non-Toxic"), 1);
        assert_eq!(group.count("Mildly Toxic"), 1);
        assert_eq!(group.count("Moderately Toxic"), 1);
        assert_eq!(group.count("Highly Toxic"), 1);
    }

    #[test]
    fn test_score_above_one_is_not_bucketed() {
        let registry = registry();
        let toxicity = registry.lookup("toxicity").unwrap();
        let rows: Vec<_> = [0.95, 1.5]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                build_row(
                    toxicity,
                    i,
                    "t",
                    ok(ProviderId::Classifier, score(*s)),
                    ok(ProviderId::Gemini, text("commentary")),
                )
            })
            .collect();

        let group = aggregate(toxicity, &rows).group("classifier").cloned().unwrap();
        assert_eq!(group.count("Highly Toxic"), 1);
        assert_eq!(group.total(), 1);
    }

    #[test]
    fn test_series_values() {
        let registry = registry();
        let bias = registry.lookup("bias").unwrap();
        let view = aggregate(bias, &bias_rows(bias));

        assert_eq!(view.series.len(), 4);
        assert_eq!(view.series[0].index, 1);
        assert_eq!(
            view.series[0].values["llama"],
            Some(SeriesValue::Label("Unbiased".to_string()))
        );
        assert_eq!(view.series[2].values["llama"], None);
        assert_eq!(view.series[2].values["gemini"], None);
        assert_eq!(view.series[3].index, 4);
    }

    #[test]
    fn test_numeric_series_skips_commentary() {
        let registry = registry();
        let hallucination = registry.lookup("hallucination").unwrap();
        let rows = vec![
            build_row(
                hallucination,
                0,
                "claim",
                ok(ProviderId::Classifier, score(0.2)),
                ok(ProviderId::Gemini, text("Plausible")),
            ),
            build_row(
                hallucination,
                1,
                "claim two",
                failed(ProviderId::Classifier),
                ok(ProviderId::Gemini, text("Suspicious")),
            ),
        ];

        let view = aggregate(hallucination, &rows);

        // Classifier score plus its confidence; the free-text provider is skipped.
        assert_eq!(view.series[0].values.len(), 2);
        assert!(!view.series[0].values.contains_key("gemini"));
        assert_eq!(view.series[0].values["classifier"], Some(SeriesValue::Number(0.2)));
        assert_eq!(view.series[1].values["classifier"], None);
        assert!(view.correlation.is_none());
        assert!(view.agreement.is_none());
    }

    #[test]
    fn test_hallucination_confidence_series() {
        let registry = registry();
        let hallucination = registry.lookup("hallucination").unwrap();
        let rows = vec![
            build_row(
                hallucination,
                0,
                "the moon is cheese",
                ok(ProviderId::Classifier, score(0.75)),
                failed(ProviderId::Gemini),
            ),
            build_row(
                hallucination,
                1,
                "water is wet",
                failed(ProviderId::Classifier),
                failed(ProviderId::Gemini),
            ),
        ];

        let series = aggregate(hallucination, &rows).series;

        assert_eq!(series[0].values[CONFIDENCE], Some(SeriesValue::Number(0.25)));
        assert_eq!(series[1].values[CONFIDENCE], None);
    }

    #[test]
    fn test_confidence_only_when_flagged() {
        let registry = registry();
        let toxicity = registry.lookup("toxicity").unwrap();
        let row = build_row(
            toxicity,
            0,
            "t",
            ok(ProviderId::Classifier, score(0.5)),
            failed(ProviderId::Gemini),
        );

        let mut flagged = toxicity.clone();
        flagged.confidence_series = true;

        let plain = aggregate(toxicity, &[row.clone()]);
        assert!(!plain.series[0].values.contains_key(CONFIDENCE));
        assert_eq!(
            aggregate(&flagged, &[row]).series[0].values[CONFIDENCE],
            Some(SeriesValue::Number(0.5))
        );
    }

    #[test]
    fn test_quantitative_views() {
        let registry = registry();
        let quant = registry.lookup("quantitative-reasoning").unwrap();
        let texts = ["10 and 20", "50", "no numbers here", "70 80 90"];
        let rows: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                build_row(
                    quant,
                    i,
                    t,
                    ok(ProviderId::Classifier, score(0.5)),
                    failed(ProviderId::Gemini),
                )
            })
            .collect();

        let view = aggregate(quant, &rows);

        let group = view.group(EXTRACTED_NUMBERS).unwrap();
        assert_eq!(group.count("Low Range (0-33)"), 1);
        assert_eq!(group.count("Mid Range (34-66)"), 1);
        assert_eq!(group.count("High Range (67-100)"), 1);
        assert_eq!(group.total(), 3);

        assert_eq!(
            view.series[0].values[AVERAGE_VALUE],
            Some(SeriesValue::Number(15.0))
        );
        assert_eq!(
            view.series[2].values[AVERAGE_VALUE],
            Some(SeriesValue::Number(0.0))
        );

        let correlation = view.correlation.unwrap();
        assert_eq!(correlation.len(), 4);
        assert_eq!(correlation[0].x, 2.0);
        assert_eq!(correlation[0].y, 9.0);
        assert_eq!(correlation[2].x, 0.0);
    }

    #[test]
    fn test_agreement() {
        let registry = registry();
        let bias = registry.lookup("bias").unwrap();
        let agreement = aggregate(bias, &bias_rows(bias)).agreement.unwrap();

        // Rows a, b and d have both buckets; a and d agree.
        assert_eq!(agreement.compared, 3);
        assert_eq!(agreement.matching, 2);
    }

    #[test]
    fn test_score_summaries() {
        let registry = registry();
        let factuality = registry.lookup("factuality").unwrap();
        let rows: Vec<_> = [Some(0.2), None, Some(0.8)]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let classifier = match s {
                    Some(s) => ok(ProviderId::Classifier, score(*s)),
                    None => failed(ProviderId::Classifier),
                };
                build_row(factuality, i, "fact", classifier, failed(ProviderId::Gemini))
            })
            .collect();

        let summaries = aggregate(factuality, &rows).score_summaries;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].source, "classifier");
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].min, Some(0.2));
        assert_eq!(summaries[0].max, Some(0.8));
        assert!((summaries[0].mean.unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_is_pure() {
        let registry = registry();
        let bias = registry.lookup("bias").unwrap();
        let rows = bias_rows(bias);

        assert_eq!(aggregate(bias, &rows), aggregate(bias, &rows));
    }

    #[test]
    fn test_empty_rows() {
        let registry = registry();
        let sentiment = registry.lookup("sentiment").unwrap();
        let view = aggregate(sentiment, &[]);

        assert!(view.series.is_empty());
        assert!(view.distribution.iter().all(|g| g.total() == 0));
        assert_eq!(view.agreement.unwrap().rate(), None);
    }

    fn low_high_descriptor() -> DimensionDescriptor {
        DimensionDescriptor {
            id: "certainty".to_string(),
            title: "Certainty".to_string(),
            providers: [
                ProviderSpec::new(ProviderId::Classifier, "http://stub/score", ResponseShape::ClassifierScores),
                ProviderSpec::new(ProviderId::Gemini, "http://stub/text", ResponseShape::CandidateText),
            ],
            taxonomy: Taxonomy::Numeric(vec![
                NumericRange::closed_open(0.0, 0.5, "Low"),
                NumericRange::closed(0.5, 1.0, "High"),
            ]),
            bucket_source: BucketSource::Providers,
            correlation: None,
            confidence_series: false,
        }
    }

    #[test]
    fn test_unparsable_score_is_excluded() {
        let descriptor = low_high_descriptor();
        let rows = vec![
            build_row(&descriptor, 0, "x", ok(ProviderId::Classifier, score(0.9)), failed(ProviderId::Gemini)),
            build_row(&descriptor, 1, "y", ok(ProviderId::Classifier, json!([[{"score": "oops"}]])), failed(ProviderId::Gemini)),
        ];

        let group = aggregate(&descriptor, &rows).distribution.remove(0);

        // The unparsable score is excluded, so the total is strictly below N.
        assert_eq!(group.count("High"), 1);
        assert_eq!(group.count("Low"), 0);
        assert!(group.total() < rows.len());
        assert_eq!(rows[1].cell_a.display(), "N/A");
    }

    #[tokio::test]
    async fn test_dataset_to_distribution() {
        use crate::dataset::parse_dataset;
        use crate::engine::tests::StubClient;
        use crate::engine::ComparisonEngine;
        use crate::normalize::{normalize, NormalizationOptions};

        let records = parse_dataset("I love this@positive\nI hate this@negative\n");
        let options = NormalizationOptions {
            to_lower_case: true,
            trim_whitespace: true,
            ..Default::default()
        };
        let cleaned = normalize(&records, &options);
        assert_eq!(cleaned, vec!["i love this", "i hate this"]);

        let descriptor = low_high_descriptor();
        let client = StubClient::default()
            .answer("http://stub/score", "i love this", score(0.9))
            .answer("http://stub/score", "i hate this", score(0.1));
        let registry = Registry::with_descriptors(vec![descriptor.clone()]);
        let engine = ComparisonEngine::new(&registry, client);

        let rows = engine.run("certainty", &cleaned).await.unwrap();
        let view = aggregate(&descriptor, &rows);

        assert_eq!(
            view.group("classifier").unwrap().entries,
            vec![
                DistributionEntry {
                    bucket: "Low".to_string(),
                    count: 1
                },
                DistributionEntry {
                    bucket: "High".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 20), "short");
        assert_eq!(preview("this sentence is rather long", 10), "this sente...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }
}
