//! Comparison engine.
//!
//! For one dimension, every cleaned record is sent to both of the
//! dimension's providers. The two calls for a record run concurrently and
//! are joined before the row is built; records are independent and run
//! concurrently up to a limit. Rows always come back in input order.

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::models::{ComparisonRow, ProviderResult, RunStats};
use crate::normalize::extract_numbers;
use crate::provider::ProviderClient;
use crate::registry::{DimensionDescriptor, Registry};

/// Runs dimension comparisons against a registry of descriptors.
pub struct ComparisonEngine<'a, C> {
    registry: &'a Registry,
    client: C,
    /// Maximum records in flight (0 = all of them).
    concurrency: usize,
    progress: Option<ProgressBar>,
}

impl<'a, C: ProviderClient> ComparisonEngine<'a, C> {
    pub fn new(registry: &'a Registry, client: C) -> Self {
        Self {
            registry,
            client,
            concurrency: 0,
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Tick this bar once per completed record.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Compare every record for the given dimension.
    ///
    /// Fails before any network activity when there are no records or the
    /// dimension is unknown. Individual provider failures never fail the run.
    pub async fn run(
        &self,
        dimension_id: &str,
        records: &[String],
    ) -> Result<Vec<ComparisonRow>, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let descriptor = self.registry.lookup(dimension_id)?;

        Ok(self.compare(descriptor, records).await)
    }

    /// Compare every record against an already resolved descriptor.
    pub async fn compare(
        &self,
        descriptor: &DimensionDescriptor,
        records: &[String],
    ) -> Vec<ComparisonRow> {
        let limit = match self.concurrency {
            0 => records.len().max(1),
            n => n,
        };
        info!(
            "Running {} on {} records ({} in flight)",
            descriptor.id,
            records.len(),
            limit.min(records.len())
        );

        // `buffered` keeps output in input order whatever the completion order.
        let rows: Vec<ComparisonRow> = stream::iter(records.iter().enumerate())
            .map(|(index, text)| self.compare_record(descriptor, index, text))
            .buffered(limit)
            .collect()
            .await;

        let stats = RunStats::from_rows(&rows);
        info!(
            "{} complete: {} rows, {} failed calls",
            descriptor.id,
            stats.records,
            stats.failed_calls()
        );

        rows
    }

    async fn compare_record(
        &self,
        descriptor: &DimensionDescriptor,
        index: usize,
        text: &str,
    ) -> ComparisonRow {
        let [spec_a, spec_b] = &descriptor.providers;
        let (result_a, result_b) =
            futures::join!(self.client.call(spec_a, text), self.client.call(spec_b, text));

        debug!(
            "Record {} done (failed: {}/{})",
            index + 1,
            result_a.failed,
            result_b.failed
        );
        if let Some(ref progress) = self.progress {
            progress.inc(1);
        }

        build_row(descriptor, index, text, result_a, result_b)
    }
}

/// Merge both provider results for one record, deriving cells eagerly.
pub fn build_row(
    descriptor: &DimensionDescriptor,
    index: usize,
    text: &str,
    provider_a: ProviderResult,
    provider_b: ProviderResult,
) -> ComparisonRow {
    let [spec_a, spec_b] = &descriptor.providers;
    let cell_a = descriptor.read_cell(spec_a, &provider_a);
    let cell_b = descriptor.read_cell(spec_b, &provider_b);
    let numbers = if descriptor.uses_numbers() {
        extract_numbers(text)
    } else {
        Vec::new()
    };

    ComparisonRow {
        index,
        text: text.to_string(),
        provider_a,
        provider_b,
        cell_a,
        cell_b,
        numbers,
    }
}
