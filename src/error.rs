//! Error types for the detection-eval library.

use thiserror::Error;

use crate::types::{EntityId, ResultKind};

/// Result type for detection-eval operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types that can occur while evaluating detections.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error while parsing a TOML configuration document.
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),

    /// The data provider failed to deliver results for an entity.
    #[error("Fetch of {kind} for entity {entity} failed: {source}")]
    ProviderError {
        entity: EntityId,
        kind: ResultKind,
        #[source]
        source: ProviderError,
    },

    /// The data provider failed outside of any single entity.
    #[error("Workflow listing failed: {0}")]
    WorkflowError(#[source] ProviderError),

    /// No detection workflow is configured and none is available.
    #[error("No detection workflow available")]
    NoWorkflow,

    /// A cache dump is internally inconsistent.
    #[error("Invalid cache dump: {0}")]
    InvalidDump(String),

    /// Invalid sweep request.
    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),

    /// Tabular export failed.
    #[cfg(feature = "polars")]
    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
}

/// Failure reported by a [`DataProvider`](crate::provider::DataProvider).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The remote data source could not be reached.
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The payload could not be interpreted.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl EvalError {
    /// Attach entity and result kind to a provider failure.
    pub fn provider(entity: EntityId, kind: ResultKind, source: ProviderError) -> Self {
        Self::ProviderError {
            entity,
            kind,
            source,
        }
    }
}
