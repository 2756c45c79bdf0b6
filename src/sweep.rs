//! Constraint sweeps for tracing precision-recall curves.
//!
//! A [`SweepSpec`] assigns an ordered list of candidate values to one or
//! more `(attribute, bound)` pairs. [`enumerate_sweep`] expands it into the
//! cartesian product of those lists, one complete [`Constraint`] per
//! combination.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::constraint::{Attribute, Bound, Constraint, PartialConstraint};
use crate::error::{EvalError, Result};
use crate::metrics::calculate_fbeta;

/// Candidate values for the two ends of one attribute's range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
}

impl SweepBounds {
    fn slot(&mut self, bound: Bound) -> &mut Option<Vec<f64>> {
        match bound {
            Bound::Max => &mut self.max,
            Bound::Min => &mut self.min,
        }
    }
}

/// One swept `(attribute, bound)` pair and its candidate values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepDimension<'a> {
    pub attribute: Attribute,
    pub bound: Bound,
    pub values: &'a [f64],
}

/// Sweep request, keyed by attribute.
///
/// Serializes as `{"sizePx": {"min": [..]}, "uncertainty": {"max": [..]}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SweepSpec {
    dimensions: BTreeMap<Attribute, SweepBounds>,
}

impl SweepSpec {
    /// Create an empty sweep.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep `bound` of `attribute` over `values`, replacing any previous
    /// list for that pair.
    pub fn with(mut self, attribute: Attribute, bound: Bound, values: Vec<f64>) -> Self {
        *self.dimensions.entry(attribute).or_default().slot(bound) = Some(values);
        self
    }

    /// Hold `bound` of `attribute` at a single value.
    pub fn fixed(self, attribute: Attribute, bound: Bound, value: f64) -> Self {
        self.with(attribute, bound, vec![value])
    }

    /// Turn every bound set in `constants` into a single-value dimension.
    pub fn from_constants(constants: &PartialConstraint) -> Self {
        Attribute::ALL.iter().fold(Self::new(), |spec, &attribute| {
            let range = constants.range(attribute);
            let spec = match range.max {
                Some(value) => spec.fixed(attribute, Bound::Max, value),
                None => spec,
            };
            match range.min {
                Some(value) => spec.fixed(attribute, Bound::Min, value),
                None => spec,
            }
        })
    }

    /// Drop every dimension of `attribute`.
    pub fn without(mut self, attribute: Attribute) -> Self {
        self.dimensions.remove(&attribute);
        self
    }

    /// Swept pairs, ordered by attribute name then bound name.
    pub fn dimensions(&self) -> Vec<SweepDimension<'_>> {
        self.dimensions
            .iter()
            .flat_map(|(&attribute, bounds)| {
                [(Bound::Max, &bounds.max), (Bound::Min, &bounds.min)]
                    .into_iter()
                    .filter_map(move |(bound, values)| {
                        values.as_deref().map(|values| SweepDimension {
                            attribute,
                            bound,
                            values,
                        })
                    })
            })
            .collect()
    }

    /// Number of constraints the sweep expands to.
    pub fn len(&self) -> usize {
        self.dimensions().iter().map(|dim| dim.values.len()).product()
    }

    /// Whether the sweep expands to no constraints at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expand a sweep into the cartesian product of its value lists.
///
/// Earlier dimensions vary slowest. Values keep their listed order and
/// coinciding values are not merged. A sweep with no dimensions yields the
/// single fully open constraint; a dimension with an empty list yields
/// nothing.
///
/// # Example
///
/// ```
/// use detection_eval::constraint::{Attribute, Bound};
/// use detection_eval::sweep::{enumerate_sweep, SweepSpec};
///
/// let spec = SweepSpec::new()
///     .with(Attribute::SizePx, Bound::Min, vec![1.0, 10.0, 100.0])
///     .with(Attribute::Uncertainty, Bound::Max, vec![0.5, 1.0]);
///
/// let constraints = enumerate_sweep(&spec);
/// assert_eq!(constraints.len(), 6);
/// assert_eq!(constraints[1].size_px.min, 1.0);
/// assert_eq!(constraints[1].uncertainty.max, 1.0);
/// ```
pub fn enumerate_sweep(spec: &SweepSpec) -> Vec<Constraint> {
    spec.dimensions()
        .into_iter()
        .fold(vec![Constraint::default()], |partials, dim| {
            partials
                .iter()
                .flat_map(|base| {
                    dim.values.iter().map(move |&value| {
                        let mut constraint = *base;
                        constraint.range_mut(dim.attribute).set(dim.bound, value);
                        constraint
                    })
                })
                .collect()
        })
}

/// Generate `count` values from `start` to `stop`, both inclusive.
///
/// With `round`, interior values are rounded to the nearest integer. An
/// interior value equal to its predecessor or to `stop` is dropped, so the
/// result may be shorter than `count`. `start` and `stop` are always kept
/// exactly.
///
/// # Errors
///
/// Returns an error if `count` is less than 2.
///
/// # Example
///
/// ```
/// use detection_eval::sweep::linspace;
///
/// assert_eq!(linspace(0.0, 1.0, 5, false).unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
/// assert_eq!(linspace(0.0, 2.0, 5, true).unwrap(), vec![0.0, 1.0, 2.0]);
/// ```
pub fn linspace(start: f64, stop: f64, count: usize, round: bool) -> Result<Vec<f64>> {
    if count < 2 {
        return Err(EvalError::InvalidSweep(format!(
            "linspace needs at least 2 points, got {count}"
        )));
    }

    #[allow(clippy::cast_precision_loss)]
    let step = (stop - start) / (count - 1) as f64;

    let mut values = Vec::with_capacity(count);
    values.push(start);
    let mut previous = start;
    for i in 1..count - 1 {
        #[allow(clippy::cast_precision_loss)]
        let raw = start + step * i as f64;
        let value = if round { raw.round() } else { raw };
        if value != previous && value != stop {
            values.push(value);
        }
        previous = value;
    }
    values.push(stop);

    Ok(values)
}

/// Sweep laid out for one attribute across its working range.
///
/// Uncertainty sweeps its `max` bound over unrounded values; the integer
/// attributes sweep `swept` over rounded values. Bounds in `constants` for
/// other attributes are held fixed; constants for `attribute` itself are
/// replaced by the sweep.
pub fn attribute_sweep(
    attribute: Attribute,
    swept: Bound,
    ranges: &Constraint,
    bins: usize,
    constants: &PartialConstraint,
) -> Result<SweepSpec> {
    let range = ranges.range(attribute);
    let values = linspace(range.min, range.max, bins, attribute.is_integral())?;
    Ok(SweepSpec::from_constants(constants)
        .without(attribute)
        .with(attribute, swept, values))
}

/// One sweep per attribute for side-by-side comparison.
///
/// Uncertainty tightens its `max` bound; the integer attributes raise
/// their `min` bound. Other attributes stay open.
///
/// # Errors
///
/// Returns an error if `bins` is less than 2.
pub fn comparison_sweeps(ranges: &Constraint, bins: usize) -> Result<Vec<(Attribute, SweepSpec)>> {
    Attribute::ALL
        .iter()
        .map(|&attribute| {
            let swept = if attribute.is_integral() {
                Bound::Min
            } else {
                Bound::Max
            };
            let spec = attribute_sweep(attribute, swept, ranges, bins, &PartialConstraint::new())?;
            Ok((attribute, spec))
        })
        .collect()
}

/// Find the sweep point with the highest F-beta score.
///
/// Points whose score is undefined are skipped.
///
/// # Returns
///
/// Reference to the best point, or `None` if no point has a defined score
pub fn find_best(results: &[AnalysisResult], beta: f64) -> Option<&AnalysisResult> {
    results
        .iter()
        .map(|result| (result, calculate_fbeta(result.precision, result.recall, beta)))
        .filter(|(_, score)| !score.is_nan())
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(result, _)| result)
}
