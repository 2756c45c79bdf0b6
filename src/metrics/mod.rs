//! Metric calculation for detection evaluation.

pub mod fbeta;
pub mod precision_recall;

pub use fbeta::{calculate_f05, calculate_f1, calculate_f2, calculate_fbeta};
pub use precision_recall::{calculate_precision, calculate_recall, curve_points};
