//! Acceptance ranges for detection attributes.
//!
//! A [`Constraint`] holds one inclusive range per [`Attribute`]. Bounds that
//! were never set are open (`-inf` / `+inf`), so a default constraint accepts
//! every detection. Inverted ranges are not rejected; they simply accept
//! nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Detection;

/// A numeric detection attribute that can be constrained.
///
/// Variants are declared in the lexical order of their names so that the
/// derived `Ord` sorts attributes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    ContactPx,
    SizePx,
    Slices,
    Uncertainty,
}

impl Attribute {
    /// All attributes, ordered by name.
    pub const ALL: [Attribute; 4] = [
        Attribute::ContactPx,
        Attribute::SizePx,
        Attribute::Slices,
        Attribute::Uncertainty,
    ];

    /// Name of the attribute as it appears in exported records.
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::ContactPx => "contactPx",
            Attribute::SizePx => "sizePx",
            Attribute::Slices => "slices",
            Attribute::Uncertainty => "uncertainty",
        }
    }

    /// Whether the attribute only takes integer values.
    pub fn is_integral(&self) -> bool {
        !matches!(self, Attribute::Uncertainty)
    }

    /// Read this attribute from a detection.
    #[allow(clippy::cast_precision_loss)]
    pub fn value_of(&self, detection: &Detection) -> f64 {
        match self {
            Attribute::ContactPx => detection.contact_px as f64,
            Attribute::SizePx => detection.size_px as f64,
            Attribute::Slices => detection.slices as f64,
            Attribute::Uncertainty => detection.uncertainty,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One end of a range. `Max` sorts before `Min`, matching name order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Max,
    Min,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Max => f.write_str("max"),
            Bound::Min => f.write_str("min"),
        }
    }
}

/// Inclusive range. Non-finite bounds are written as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(with = "lower_bound", default = "lower_bound::open")]
    pub min: f64,
    #[serde(with = "upper_bound", default = "upper_bound::open")]
    pub max: f64,
}

impl Range {
    /// Range that accepts every value.
    pub const OPEN: Range = Range {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    /// Create a new range.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the range, bounds included.
    ///
    /// A value is only rejected when it is strictly outside a bound, so a
    /// NaN attribute passes any range.
    pub fn contains(&self, value: f64) -> bool {
        !(value < self.min || value > self.max)
    }

    /// Value of one end of the range.
    pub fn get(&self, bound: Bound) -> f64 {
        match bound {
            Bound::Min => self.min,
            Bound::Max => self.max,
        }
    }

    /// Replace one end of the range.
    pub fn set(&mut self, bound: Bound, value: f64) {
        match bound {
            Bound::Min => self.min = value,
            Bound::Max => self.max = value,
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::OPEN
    }
}

/// Range with either end possibly unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PartialRange {
    /// Fill unset ends with open bounds.
    pub fn complete(&self) -> Range {
        Range {
            min: self.min.unwrap_or(f64::NEG_INFINITY),
            max: self.max.unwrap_or(f64::INFINITY),
        }
    }
}

/// Constraint as supplied by a caller, possibly missing bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialConstraint {
    pub uncertainty: PartialRange,
    pub size_px: PartialRange,
    pub slices: PartialRange,
    pub contact_px: PartialRange,
}

impl PartialConstraint {
    /// An empty constraint; every bound unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one bound, builder style.
    pub fn with(mut self, attribute: Attribute, bound: Bound, value: f64) -> Self {
        let range = self.range_mut(attribute);
        match bound {
            Bound::Min => range.min = Some(value),
            Bound::Max => range.max = Some(value),
        }
        self
    }

    /// Bounds set for one attribute.
    pub fn range(&self, attribute: Attribute) -> &PartialRange {
        match attribute {
            Attribute::ContactPx => &self.contact_px,
            Attribute::SizePx => &self.size_px,
            Attribute::Slices => &self.slices,
            Attribute::Uncertainty => &self.uncertainty,
        }
    }

    /// Complete this constraint from `base`: unset bounds take the value
    /// `base` has for them.
    pub fn over(&self, base: &Constraint) -> Constraint {
        let mut constraint = *base;
        for attribute in Attribute::ALL {
            let partial = self.range(attribute);
            let range = constraint.range_mut(attribute);
            if let Some(min) = partial.min {
                range.min = min;
            }
            if let Some(max) = partial.max {
                range.max = max;
            }
        }
        constraint
    }

    fn range_mut(&mut self, attribute: Attribute) -> &mut PartialRange {
        match attribute {
            Attribute::ContactPx => &mut self.contact_px,
            Attribute::SizePx => &mut self.size_px,
            Attribute::Slices => &mut self.slices,
            Attribute::Uncertainty => &mut self.uncertainty,
        }
    }
}

/// Fully specified acceptance ranges for all four attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraint {
    pub uncertainty: Range,
    pub size_px: Range,
    pub slices: Range,
    pub contact_px: Range,
}

impl Default for Constraint {
    fn default() -> Self {
        Self {
            uncertainty: Range::OPEN,
            size_px: Range::OPEN,
            slices: Range::OPEN,
            contact_px: Range::OPEN,
        }
    }
}

impl Constraint {
    /// Working range of each attribute, used to lay out sweeps.
    pub fn working_ranges() -> Self {
        Self {
            uncertainty: Range::new(0.0, 1.0),
            size_px: Range::new(1.0, 10_000.0),
            slices: Range::new(1.0, 20.0),
            contact_px: Range::new(1.0, 800.0),
        }
    }

    /// Range applied to one attribute.
    pub fn range(&self, attribute: Attribute) -> &Range {
        match attribute {
            Attribute::ContactPx => &self.contact_px,
            Attribute::SizePx => &self.size_px,
            Attribute::Slices => &self.slices,
            Attribute::Uncertainty => &self.uncertainty,
        }
    }

    /// Mutable range applied to one attribute.
    pub fn range_mut(&mut self, attribute: Attribute) -> &mut Range {
        match attribute {
            Attribute::ContactPx => &mut self.contact_px,
            Attribute::SizePx => &mut self.size_px,
            Attribute::Slices => &mut self.slices,
            Attribute::Uncertainty => &mut self.uncertainty,
        }
    }

    /// Whether the detection lies within every range.
    pub fn accepts(&self, detection: &Detection) -> bool {
        Attribute::ALL
            .iter()
            .all(|attribute| self.range(*attribute).contains(attribute.value_of(detection)))
    }
}

impl From<PartialConstraint> for Constraint {
    fn from(partial: PartialConstraint) -> Self {
        fill_defaults(&partial)
    }
}

impl From<&PartialConstraint> for Constraint {
    fn from(partial: &PartialConstraint) -> Self {
        fill_defaults(partial)
    }
}

/// Complete a partial constraint: unset minima become `-inf`, unset maxima
/// become `+inf`.
pub fn fill_defaults(partial: &PartialConstraint) -> Constraint {
    Constraint {
        uncertainty: partial.uncertainty.complete(),
        size_px: partial.size_px.complete(),
        slices: partial.slices.complete(),
        contact_px: partial.contact_px.complete(),
    }
}

/// Whether `detection` passes every range of `constraint`.
pub fn accepts(detection: &Detection, constraint: &Constraint) -> bool {
    constraint.accepts(detection)
}

mod lower_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn open() -> f64 {
        f64::NEG_INFINITY
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize_finite(*value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(open))
    }
}

mod upper_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn open() -> f64 {
        f64::INFINITY
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize_finite(*value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(open))
    }
}

fn serialize_finite<S: serde::Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(&value)
    } else {
        serializer.serialize_none()
    }
}
