//! Error types for the comparison pipeline.
//!
//! Only structural problems (no input, unknown dimension) stop a run.
//! Per-call provider problems are described by [`ProviderFailure`] and are
//! always downgraded to an `N/A` cell by the provider client.

use thiserror::Error;

/// Pipeline-level failures that halt a run before any provider is called.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// There are no records to send to the providers.
    #[error("No cleaned data to process.")]
    EmptyInput,

    /// The requested dimension is not registered.
    #[error("Unknown dimension '{id}' (available: {available})")]
    UnknownDimension { id: String, available: String },
}

/// Why a single provider call produced no usable value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    /// The request did not complete within the client timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The provider could not be reached.
    #[error("cannot connect to {0}")]
    Connect(String),

    /// The provider answered with a non-2xx status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("response was not valid JSON: {0}")]
    Decode(String),

    /// Any other transport error.
    #[error("request failed: {0}")]
    Request(String),

    /// The JSON payload did not have the shape the dimension expects.
    #[error("response did not match the expected {0} shape")]
    UnparsableResponse(&'static str),
}
