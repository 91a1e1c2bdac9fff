//! Markdown and JSON report generation.
//!
//! This module renders the comparison rows and aggregate views of every
//! dimension that was run. Charts are not drawn; the tables hold the same
//! data a chart would plot.

use crate::config::ReportConfig;
use crate::models::{
    AggregateView, DimensionReport, Report, ReportMetadata, SeriesPoint, NOT_AVAILABLE,
};
use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# TextAssay Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_dataset_section(&report.normalization, &report.labels));
    output.push_str(&generate_table_of_contents(report));

    for dimension in &report.dimensions {
        output.push_str(&generate_dimension_section(dimension, options));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Records:** {}\n", metadata.records));
    section.push_str(&format!(
        "- **Dimensions:** {}\n",
        metadata.dimensions.join(", ")
    ));
    if metadata.failed_calls > 0 {
        section.push_str(&format!(
            "- **Failed Provider Calls:** {}\n",
            metadata.failed_calls
        ));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the dataset section: normalization steps and label counts.
fn generate_dataset_section(normalization: &[String], labels: &BTreeMap<String, usize>) -> String {
    let mut section = String::new();

    section.push_str("## Dataset\n\n");
    if normalization.is_empty() {
        section.push_str("**Normalization:** none\n\n");
    } else {
        section.push_str(&format!(
            "**Normalization:** {}\n\n",
            normalization
                .iter()
                .map(|step| format!("`{}`", step))
                .collect::<Vec<_>>()
                .join(" → ")
        ));
    }

    if !labels.is_empty() {
        section.push_str("| Label | Records |\n");
        section.push_str("|:---|:---:|\n");
        for (label, count) in labels {
            section.push_str(&format!("| {} | {} |\n", escape_cell(label), count));
        }
        section.push('\n');
    }

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Dataset](#dataset)\n");

    for dimension in &report.dimensions {
        toc.push_str(&format!("- [{}](#{})\n", dimension.title, dimension.id));
    }

    toc.push('\n');

    toc
}

/// Generate everything shown for one dimension.
fn generate_dimension_section(dimension: &DimensionReport, options: &ReportConfig) -> String {
    let mut section = String::new();
    let [provider_a, provider_b] = &dimension.providers;

    section.push_str(&format!("## {} {{#{}}}\n\n", dimension.title, dimension.id));
    section.push_str(&format!(
        "*Providers: {} vs {} | Records: {} | Failed calls: {} / {}*\n\n",
        provider_a,
        provider_b,
        dimension.stats.records,
        dimension.stats.provider_a_failures,
        dimension.stats.provider_b_failures
    ));

    if options.include_raw_table {
        section.push_str(&generate_results_table(dimension));
    }
    section.push_str(&generate_distribution_section(&dimension.view));
    section.push_str(&generate_comparison_section(&dimension.view));
    section.push_str(&generate_series_section(&dimension.view.series));
    section.push_str(&generate_correlation_section(&dimension.view));

    section.push_str("---\n\n");

    section
}

/// Generate the raw per-record table.
fn generate_results_table(dimension: &DimensionReport) -> String {
    let mut table = String::new();
    let [provider_a, provider_b] = &dimension.providers;

    table.push_str("### Results\n\n");
    if dimension.rows.is_empty() {
        table.push_str("No records were compared.\n\n");
        return table;
    }

    table.push_str(&format!(
        "| # | Text | {} | {} |\n",
        escape_cell(provider_a),
        escape_cell(provider_b)
    ));
    table.push_str("|---:|:---|:---|:---|\n");

    for row in &dimension.rows {
        let [a, b] = [&row.cell_a, &row.cell_b].map(|cell| match &cell.bucket {
            Some(bucket) if cell.display() != *bucket => {
                format!("{} ({})", escape_cell(&cell.display()), bucket)
            }
            _ => escape_cell(&cell.display()),
        });
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.index + 1,
            escape_cell(&row.text),
            a,
            b
        ));
    }
    table.push('\n');

    table
}

/// Generate one bucket table per distribution group.
fn generate_distribution_section(view: &AggregateView) -> String {
    let mut section = String::new();

    section.push_str("### Distribution\n\n");
    if view.distribution.is_empty() {
        section.push_str("No bucketed source for this dimension.\n\n");
        return section;
    }

    for group in &view.distribution {
        section.push_str(&format!("**{}** ({} bucketed)\n\n", group.source, group.total()));
        section.push_str("| Bucket | Count |\n");
        section.push_str("|:---|:---:|\n");
        for entry in &group.entries {
            section.push_str(&format!("| {} | {} |\n", entry.bucket, entry.count));
        }
        section.push('\n');
    }

    section
}

/// Generate the agreement and score summary blocks.
fn generate_comparison_section(view: &AggregateView) -> String {
    let mut section = String::new();

    if let Some(ref agreement) = view.agreement {
        section.push_str("### Agreement\n\n");
        match agreement.rate() {
            Some(rate) => section.push_str(&format!(
                "Providers agreed on {} of {} records where both answered ({:.1}%).\n\n",
                agreement.matching,
                agreement.compared,
                rate * 100.0
            )),
            None => section.push_str("No record was recognized by both providers.\n\n"),
        }
    }

    if !view.score_summaries.is_empty() {
        section.push_str("### Score Summary\n\n");
        section.push_str("| Source | Scores | Mean | Min | Max |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
        for summary in &view.score_summaries {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                summary.source,
                summary.count,
                format_optional(summary.mean),
                format_optional(summary.min),
                format_optional(summary.max)
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the per-record series table.
fn generate_series_section(series: &[SeriesPoint]) -> String {
    let Some(first) = series.first() else {
        return String::new();
    };

    let mut section = String::new();
    let keys: Vec<&String> = first.values.keys().collect();

    section.push_str("### Series\n\n");
    section.push_str("| # | Preview |");
    for key in &keys {
        section.push_str(&format!(" {} |", key));
    }
    section.push('\n');
    section.push_str("|---:|:---|");
    section.push_str(&":---:|".repeat(keys.len()));
    section.push('\n');

    for point in series {
        section.push_str(&format!("| {} | {} |", point.index, escape_cell(&point.preview)));
        for key in &keys {
            let value = point
                .values
                .get(*key)
                .and_then(|v| v.as_ref())
                .map(|v| v.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            section.push_str(&format!(" {} |", value));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Generate the correlation table, for dimensions that define one.
fn generate_correlation_section(view: &AggregateView) -> String {
    let Some(ref points) = view.correlation else {
        return String::new();
    };

    let mut section = String::new();

    section.push_str("### Correlation\n\n");
    section.push_str("| # | Numbers in text | Text length |\n");
    section.push_str("|---:|:---:|:---:|\n");
    for point in points {
        section.push_str(&format!("| {} | {} | {} |\n", point.index, point.x, point.y));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str(&format!(
        "*Report generated by TextAssay v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Keep free text from breaking a table row.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
