//! Evaluation configuration.
//!
//! Every field has a default, so an empty document is a valid
//! configuration.
//!
//! ```
//! use detection_eval::config::EvalConfig;
//! use std::time::Duration;
//!
//! let config = EvalConfig::from_toml_str(r#"
//!     workflow_id = 3
//!     tolerance_nm = 25.0
//!     cache_ttl_secs = 600
//!
//!     [ranges.sizePx]
//!     min = 10
//!     max = 5000
//! "#).unwrap();
//!
//! assert_eq!(config.workflow_id, Some(3));
//! assert_eq!(config.cache_ttl(), Duration::from_secs(600));
//! assert_eq!(config.working_ranges().size_px.max, 5000.0);
//! assert_eq!(config.working_ranges().slices.max, 20.0);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;
use crate::constraint::{Constraint, PartialConstraint};
use crate::error::Result;
use crate::types::WorkflowId;

/// Settings shared by every evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Workflow whose detections are evaluated; `None` picks the most
    /// recent one the provider lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,

    /// Spatial tolerance, in nm, for associating a detection with an
    /// annotation.
    pub tolerance_nm: f64,

    /// Seconds a cached result stays fresh.
    pub cache_ttl_secs: u64,

    /// Points per sweep when none is given.
    pub default_bins: usize,

    /// Overrides of the attribute working ranges that sweeps span.
    pub ranges: PartialConstraint,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            workflow_id: None,
            tolerance_nm: 0.0,
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            default_bins: 10,
            ranges: PartialConstraint::new(),
        }
    }
}

impl EvalConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be read or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Cache time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Attribute working ranges with overrides applied.
    pub fn working_ranges(&self) -> Constraint {
        self.ranges.over(&Constraint::working_ranges())
    }

    /// Sets the workflow to evaluate.
    pub fn with_workflow(mut self, workflow_id: WorkflowId) -> Self {
        self.workflow_id = Some(workflow_id);
        self
    }

    /// Sets the association tolerance.
    pub fn with_tolerance(mut self, tolerance_nm: f64) -> Self {
        self.tolerance_nm = tolerance_nm;
        self
    }

    /// Sets the cache time-to-live, in whole seconds.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EvalConfig::from_toml_str("").unwrap();
        assert_eq!(config, EvalConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(config.default_bins, 10);
    }

    #[test]
    fn test_partial_range_override() {
        let config = EvalConfig::from_toml_str(
            r#"
            [ranges.uncertainty]
            max = 0.5
            "#,
        )
        .unwrap();

        let ranges = config.working_ranges();
        assert_eq!(ranges.uncertainty.max, 0.5);
        assert_eq!(ranges.uncertainty.min, 0.0);
        assert_eq!(ranges.contact_px.max, 800.0);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(EvalConfig::from_toml_str("tolerance_nm = [").is_err());
    }

    #[test]
    fn test_builders() {
        let config = EvalConfig::new()
            .with_workflow(4)
            .with_tolerance(12.5)
            .with_cache_ttl(Duration::from_secs(60));
        assert_eq!(config.workflow_id, Some(4));
        assert_eq!(config.tolerance_nm, 12.5);
        assert_eq!(config.cache_ttl_secs, 60);
    }
}
