//! # detection-eval
//!
//! A Rust library for evaluating automatically generated synapse detections
//! against manually traced annotations.
//!
//! For a set of entities (traced structures) the library reports:
//! - **Precision**: accepted detections that hit at least one annotation
//! - **Recall**: annotations hit by at least one accepted detection
//! - **F1 / F2 / F0.5** scores
//! - **Stitching errors**: annotations hit by more than one detection
//! - **Multi-annotated** detections: detections hitting several annotations
//!
//! ## Features
//!
//! - Pluggable async [`DataProvider`] for annotations, detections and their
//!   intersections
//! - Per-entity result cache with a 30 minute TTL, refresh epochs and
//!   same-key fetch coalescing
//! - Constraints on detection attributes (contact size, size, slice count,
//!   uncertainty) with inclusive, optionally open bounds
//! - Constraint sweeps for tracing precision-recall curves
//! - JSON export of cache dumps and sweep results, and optional Polars
//!   DataFrames (`polars` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use detection_eval::{Attribute, Bound, EvalConfig, Evaluator, InMemoryProvider, SweepSpec};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // In actual use the provider talks to the tracing server
//! let provider = InMemoryProvider::new();
//! let evaluator = Evaluator::new(provider, EvalConfig::new().with_workflow(1));
//!
//! let spec = SweepSpec::new().with(Attribute::Uncertainty, Bound::Max, vec![0.25, 0.5, 1.0]);
//! let results = evaluator.sweep(&[], &spec).await?;
//!
//! for result in &results {
//!     println!(
//!         "max uncertainty {:.2}: precision {:.3}, recall {:.3}",
//!         result.constraint.uncertainty.max, result.precision, result.recall
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cache dump format
//!
//! ```json
//! {
//!   "17": {
//!     "detections": {"timestamp": 1500000000000, "results": [...]},
//!     "annotations": {"timestamp": 1500000000000, "results": [...]}
//!   }
//! }
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod constraint;
pub mod engine;
pub mod error;
pub mod export;
pub mod metrics;
pub mod provider;
pub mod stats;
pub mod sweep;
pub mod types;

#[cfg(feature = "polars")]
pub mod polars_utils;

// Re-export commonly used types and functions
pub use analysis::{analyse_records, quick_analyse_records, AnalysisResult, QuickAnalysisResult};
pub use cache::{CacheDump, EntityCache, DEFAULT_TTL};
pub use config::EvalConfig;
pub use constraint::{accepts, fill_defaults, Attribute, Bound, Constraint, PartialConstraint, Range};
pub use engine::Evaluator;
pub use error::{EvalError, ProviderError, Result};
pub use provider::{DataProvider, InMemoryProvider};
pub use stats::CacheStats;
pub use sweep::{enumerate_sweep, linspace, SweepSpec};
pub use types::{
    Annotation, Coords, Curve, Detection, EntityId, PrecisionRecallPoint, RelationType,
    WorkflowInfo,
};
