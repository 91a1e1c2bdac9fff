//! Dataset loading for `text@label` files.
//!
//! Each line holds one record: the text, optionally followed by `@` and a
//! label. Record order is preserved; it is the only key linking
//! raw records to cleaned records and comparison rows.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::models::RawRecord;

/// Separator between the text and the label on each line.
pub const LABEL_SEPARATOR: char = '@';

/// Histogram key for records without a label.
pub const UNLABELED: &str = "(unlabeled)";

/// Parse newline-delimited `text@label` content into records.
///
/// Leading and trailing blank lines are dropped. Every line in between is a
/// record, blank ones included, so row numbers follow the file's lines.
/// Anything after a second `@` is ignored.
pub fn parse_dataset(content: &str) -> Vec<RawRecord> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }

    content.split('\n').map(str::trim).map(parse_line).collect()
}

fn parse_line(line: &str) -> RawRecord {
    let mut parts = line.split(LABEL_SEPARATOR);
    let text = parts.next().unwrap_or_default().trim();
    let label = parts.next().map(str::trim).unwrap_or_default();
    RawRecord::new(text, label)
}

/// Read and parse a dataset file.
pub fn load_dataset(path: &Path) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;

    let records = parse_dataset(&content);
    info!("Loaded {} records from {}", records.len(), path.display());
    debug!(
        "{} records carry a label",
        records.iter().filter(|r| !r.label.is_empty()).count()
    );

    Ok(records)
}

/// Count records per label.
pub fn label_histogram(records: &[RawRecord]) -> BTreeMap<String, usize> {
    let mut histogram = BTreeMap::new();

    for record in records {
        let key = if record.label.is_empty() {
            UNLABELED.to_string()
        } else {
            record.label.clone()
        };
        *histogram.entry(key).or_insert(0) += 1;
    }

    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_text_and_label() {
        let records = parse_dataset("I love this@positive\nI hate this@negative\n");
        assert_eq!(
            records,
            vec![
                RawRecord::new("I love this", "positive"),
                RawRecord::new("I hate this", "negative"),
            ]
        );
    }

    #[test]
    fn test_label_defaults_to_empty() {
        let records = parse_dataset("no label here");
        assert_eq!(records[0].text, "no label here");
        assert_eq!(records[0].label, "");
    }

    #[test]
    fn test_trims_lines_and_segments() {
        let records = parse_dataset("   spaced out   @  neutral  \r\n");
        assert_eq!(records, vec![RawRecord::new("spaced out", "neutral")]);
    }

    #[test]
    fn test_interior_blank_lines_are_records() {
        let records = parse_dataset("first@a\n\nthird@c");
        assert_eq!(
            records,
            vec![
                RawRecord::new("first", "a"),
                RawRecord::new("", ""),
                RawRecord::new("third", "c"),
            ]
        );
    }

    #[test]
    fn test_outer_blank_lines_dropped() {
        let records = parse_dataset("\n first@a \n\n   \nsecond@b\n\n");
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].text, "first");
        assert_eq!(records[2], RawRecord::new("", ""));
        assert_eq!(records[3].text, "second");
    }

    #[test]
    fn test_extra_separators_ignored() {
        let records = parse_dataset("mail me@home@now");
        assert_eq!(records, vec![RawRecord::new("mail me", "home")]);
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_dataset("").is_empty());
        assert!(parse_dataset("\n\n").is_empty());
        assert!(parse_dataset("  \r\n ").is_empty());
    }

    #[test]
    fn test_load_dataset_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.txt");
        std::fs::write(&path, "one@x\ntwo@y\nthree\n").unwrap();

        let records = load_dataset(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2], RawRecord::new("three", ""));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_dataset(&temp_dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read dataset file"));
    }

    #[test]
    fn test_label_histogram() {
        let records = vec![
            RawRecord::new("a", "positive"),
            RawRecord::new("b", "positive"),
            RawRecord::new("c", ""),
        ];
        let histogram = label_histogram(&records);
        assert_eq!(histogram.get("positive"), Some(&2));
        assert_eq!(histogram.get(UNLABELED), Some(&1));
    }
}
