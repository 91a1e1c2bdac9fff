//! Text normalization.
//!
//! Enabled transforms always run in a fixed order: punctuation, case,
//! stop words, numbers, whitespace. Normalization never drops or reorders
//! records.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::RawRecord;

/// Tokens dropped by `remove_stop_words`.
pub const STOP_WORDS: [&str; 14] = [
    "the", "a", "is", "in", "on", "at", "and", "to", "of", "it", "for", "with", "this", "that",
];

static PUNCTUATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").ok());
static DIGIT_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+").ok());
static WHITESPACE_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());
static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").ok());

/// Which transforms to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationOptions {
    #[serde(default, alias = "removePunctuation")]
    pub remove_punctuation: bool,
    #[serde(default, alias = "toLowerCase")]
    pub to_lower_case: bool,
    #[serde(default, alias = "removeStopWords")]
    pub remove_stop_words: bool,
    #[serde(default, alias = "removeNumbers")]
    pub remove_numbers: bool,
    #[serde(default, alias = "trimWhitespace")]
    pub trim_whitespace: bool,
}

impl NormalizationOptions {
    /// Names of the enabled transforms in application order.
    pub fn enabled(&self) -> Vec<&'static str> {
        [
            (self.remove_punctuation, "removePunctuation"),
            (self.to_lower_case, "toLowerCase"),
            (self.remove_stop_words, "removeStopWords"),
            (self.remove_numbers, "removeNumbers"),
            (self.trim_whitespace, "trimWhitespace"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }

    /// Normalize a single text.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();

        if self.remove_punctuation {
            out = replace_all(&PUNCTUATION, &out, "");
        }
        if self.to_lower_case {
            out = out.to_lowercase();
        }
        if self.remove_stop_words {
            out = remove_stop_words(&out);
        }
        if self.remove_numbers {
            out = replace_all(&DIGIT_RUN, &out, "");
        }
        if self.trim_whitespace {
            out = replace_all(&WHITESPACE_RUN, &out, " ").trim().to_string();
        }

        out
    }
}

/// Normalize every record's text, preserving count and order.
pub fn normalize(records: &[RawRecord], options: &NormalizationOptions) -> Vec<String> {
    records.iter().map(|r| options.apply(&r.text)).collect()
}

/// Extract every decimal number appearing in a text.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    match NUMBER.as_ref() {
        Some(re) => re
            .find_iter(text)
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .collect(),
        None => Vec::new(),
    }
}

// Splits on single spaces only, so runs of spaces leave empty tokens behind.
fn remove_stop_words(text: &str) -> String {
    text.split(' ')
        .filter(|word| !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn replace_all(pattern: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    match pattern.as_ref() {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}
