//! Precision and Recall calculation.
//!
//! Traced annotations are the ground truth. An empty denominator yields a
//! perfect score: no detections cannot be wrong, and nothing traced cannot
//! be missed.

use crate::analysis::AnalysisResult;
use crate::types::PrecisionRecallPoint;

/// Fraction of accepted detections that match at least one annotation.
///
/// # Example
///
/// ```
/// use detection_eval::metrics::calculate_precision;
///
/// assert_eq!(calculate_precision(8, 10), 0.8);
/// assert_eq!(calculate_precision(0, 0), 1.0);
/// ```
#[must_use]
pub fn calculate_precision(detected_and_annotated: usize, total_detected: usize) -> f64 {
    ratio_or_one(detected_and_annotated, total_detected)
}

/// Fraction of annotations matched by at least one accepted detection.
#[must_use]
pub fn calculate_recall(annotated_and_detected: usize, total_annotated: usize) -> f64 {
    ratio_or_one(annotated_and_detected, total_annotated)
}

#[allow(clippy::cast_precision_loss)]
fn ratio_or_one(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Project sweep results onto the precision-recall plane, keeping their
/// order.
pub fn curve_points(results: &[AnalysisResult]) -> Vec<PrecisionRecallPoint> {
    results
        .iter()
        .map(|result| PrecisionRecallPoint {
            precision: result.precision,
            recall: result.recall,
        })
        .collect()
}
