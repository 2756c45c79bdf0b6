//! F-beta score calculation
//!
//! Every function here returns `NaN` when precision and recall are both
//! zero. Callers display or compare such scores as undefined.

/// Calculate F-beta score from precision and recall
///
/// F-beta = (1 + beta²) * precision * recall / ((beta² * precision) + recall)
///
/// The beta parameter controls the trade-off between precision and recall:
/// - beta = 1.0: Equal weight (F1 score)
/// - beta > 1.0: More weight on recall
/// - beta < 1.0: More weight on precision
///
/// # Arguments
///
/// * `precision` - Precision value (0.0 to 1.0)
/// * `recall` - Recall value (0.0 to 1.0)
/// * `beta` - Beta parameter (must be positive)
///
/// # Returns
///
/// F-beta score between 0.0 and 1.0, or `NaN` when the denominator is zero
///
/// # Panics
///
/// Panics if beta is not positive
///
/// # Examples
///
/// ```
/// # use detection_eval::metrics::fbeta::calculate_fbeta;
/// let f2 = calculate_fbeta(0.8, 0.9, 2.0);
/// assert!((f2 - 0.878).abs() < 0.001);
///
/// assert!(calculate_fbeta(0.0, 0.0, 1.0).is_nan());
/// ```
#[must_use]
pub fn calculate_fbeta(precision: f64, recall: f64, beta: f64) -> f64 {
    assert!(beta > 0.0, "Beta must be positive, got {beta}");

    let beta_squared = beta * beta;
    let denominator = (beta_squared * precision) + recall;

    if denominator == 0.0 {
        return f64::NAN;
    }

    (1.0 + beta_squared) * precision * recall / denominator
}

/// Calculate F1 score from precision and recall
///
/// ```
/// # use detection_eval::metrics::fbeta::calculate_f1;
/// assert_eq!(calculate_f1(0.5, 0.5), 0.5);
/// assert_eq!(calculate_f1(1.0, 1.0), 1.0);
/// ```
#[must_use]
pub fn calculate_f1(precision: f64, recall: f64) -> f64 {
    calculate_fbeta(precision, recall, 1.0)
}

/// Calculate F2 score, rewarding recall
#[must_use]
pub fn calculate_f2(precision: f64, recall: f64) -> f64 {
    calculate_fbeta(precision, recall, 2.0)
}

/// Calculate F0.5 score, rewarding precision
#[must_use]
pub fn calculate_f05(precision: f64, recall: f64) -> f64 {
    calculate_fbeta(precision, recall, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_f1_equal_precision_recall() {
        let f1 = calculate_f1(0.8, 0.8);
        assert!((f1 - 0.8).abs() < 1e-10);
    }

    #[test]
    fn test_calculate_f1_different_values() {
        let f1 = calculate_f1(0.8, 0.9);
        assert!((f1 - 0.847058).abs() < 0.001);
    }

    #[test]
    fn test_calculate_f1_zero_precision() {
        assert_eq!(calculate_f1(0.0, 0.9), 0.0);
    }

    #[test]
    fn test_both_zero_is_undefined() {
        assert!(calculate_f1(0.0, 0.0).is_nan());
        assert!(calculate_f2(0.0, 0.0).is_nan());
        assert!(calculate_f05(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_calculate_fbeta_f2_favors_recall() {
        let precision = 0.7;
        let recall = 0.9;
        let f2 = calculate_f2(precision, recall);

        assert!(f2 > precision);
        assert!(f2 < recall);
        assert!((f2 - recall).abs() < (f2 - precision).abs());
    }

    #[test]
    fn test_calculate_fbeta_f_half_favors_precision() {
        let precision = 0.9;
        let recall = 0.7;
        let f_half = calculate_f05(precision, recall);

        assert!(f_half > recall);
        assert!(f_half < precision);
        assert!((f_half - precision).abs() < (f_half - recall).abs());
    }

    #[test]
    #[should_panic(expected = "Beta must be positive")]
    fn test_calculate_fbeta_zero_beta() {
        let _ = calculate_fbeta(0.8, 0.9, 0.0);
    }
}
