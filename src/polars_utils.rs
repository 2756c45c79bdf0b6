//! Tabular view of sweep results as Polars DataFrames
//!
//! One row per sweep point, in generation order. Constraint bounds are
//! flattened to `<attribute>_<bound>` columns; open bounds and undefined
//! F-scores are null.

use polars::prelude::*;

use crate::analysis::AnalysisResult;
use crate::constraint::{Attribute, Bound};
use crate::error::Result;

/// Column names of the constraint part of the table, in column order
pub fn bound_columns() -> Vec<String> {
    bound_pairs()
        .map(|(attribute, bound)| bound_column(attribute, bound))
        .collect()
}

fn bound_pairs() -> impl Iterator<Item = (Attribute, Bound)> {
    Attribute::ALL
        .into_iter()
        .flat_map(|attribute| [Bound::Min, Bound::Max].map(|bound| (attribute, bound)))
}

fn bound_column(attribute: Attribute, bound: Bound) -> String {
    format!("{}_{}", attribute.name(), bound)
}

/// Build a DataFrame from sweep results
///
/// # Arguments
///
/// * `results` - Sweep points, in the order they were generated
///
/// # Returns
///
/// DataFrame with the constraint bounds followed by the counts and scores
pub fn sweep_to_dataframe(results: &[AnalysisResult]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::new();

    for (attribute, bound) in bound_pairs() {
        let values: Vec<Option<f64>> = results
            .iter()
            .map(|r| finite(r.constraint.range(attribute).get(bound)))
            .collect();
        columns.push(Column::new(bound_column(attribute, bound).into(), values));
    }

    let counts: [(&str, fn(&AnalysisResult) -> usize); 6] = [
        ("total_annotated", |r| r.total_annotated),
        ("total_detected", |r| r.total_detected),
        ("detected_and_annotated", |r| r.detected_and_annotated),
        ("annotated_and_detected", |r| r.annotated_and_detected),
        ("multi_annotated", |r| r.multi_annotated),
        ("stitching_errors", |r| r.stitching_errors),
    ];
    for (name, count) in counts {
        let values: Vec<u64> = results.iter().map(|r| count(r) as u64).collect();
        columns.push(Column::new(name.into(), values));
    }

    let scores: [(&str, fn(&AnalysisResult) -> f64); 5] = [
        ("precision", |r| r.precision),
        ("recall", |r| r.recall),
        ("f1", |r| r.f1),
        ("f2", |r| r.f2),
        ("f05", |r| r.f05),
    ];
    for (name, score) in scores {
        let values: Vec<Option<f64>> = results.iter().map(|r| finite(score(r))).collect();
        columns.push(Column::new(name.into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
