//! Metric computation over pooled annotations and detections.
//!
//! [`analyse_records`] is the audited evaluation: it counts multiply
//! annotated detections and stitching errors, and derives precision, recall
//! and F-scores. [`quick_analyse_records`] is a cheaper set-based
//! approximation that skips both error counts.
//!
//! `total_annotated` counts annotation *records*, not distinct identifiers.
//! An annotation reported for two entities (or under both relation types)
//! is counted twice there, while matching uses the deduplicated identifier
//! set. Downstream recall depends on this exact definition.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::metrics::{calculate_f05, calculate_f1, calculate_f2, calculate_precision, calculate_recall};
use crate::types::{Annotation, AnnotationId, Detection, DetectionId, EntityId};

/// Results fetched for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityResults {
    pub entity_id: EntityId,
    pub annotations: Vec<Annotation>,
    pub detections: Vec<Detection>,
}

/// Annotations and detections of several entities, flattened in the order
/// the entities were supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PooledResults {
    pub annotations: Vec<Annotation>,
    pub detections: Vec<Detection>,
}

impl PooledResults {
    /// Concatenate per-entity results.
    pub fn from_entities<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = EntityResults>,
    {
        entities
            .into_iter()
            .fold(Self::default(), |mut pooled, entity| {
                pooled.annotations.extend(entity.annotations);
                pooled.detections.extend(entity.detections);
                pooled
            })
    }

    /// Full evaluation under `constraint`.
    pub fn analyse(&self, constraint: &Constraint) -> AnalysisResult {
        analyse_records(&self.annotations, &self.detections, constraint)
    }

    /// Approximate evaluation under `constraint`.
    pub fn quick_analyse(&self, constraint: &Constraint) -> QuickAnalysisResult {
        quick_analyse_records(&self.annotations, &self.detections, constraint)
    }
}

/// Outcome of evaluating detections against annotations under one
/// constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub constraint: Constraint,
    /// Annotation records pooled across entities.
    pub total_annotated: usize,
    /// Detections accepted by the constraint.
    pub total_detected: usize,
    /// Accepted detections matching at least one annotation.
    pub detected_and_annotated: usize,
    /// Annotation records matched by at least one accepted detection.
    pub annotated_and_detected: usize,
    /// Accepted detections associated with more than one annotation.
    pub multi_annotated: usize,
    /// Surplus matches of annotations hit by more than one accepted detection.
    pub stitching_errors: usize,
    pub precision: f64,
    pub recall: f64,
    #[serde(with = "undefined_score")]
    pub f1: f64,
    #[serde(with = "undefined_score")]
    pub f2: f64,
    #[serde(with = "undefined_score")]
    pub f05: f64,
}

impl AnalysisResult {
    /// Result for no annotations and no accepted detections.
    pub fn vacuous(constraint: Constraint) -> Self {
        Self::from_counts(constraint, Counts::default())
    }

    fn from_counts(constraint: Constraint, counts: Counts) -> Self {
        let precision = calculate_precision(counts.detected_and_annotated, counts.total_detected);
        let recall = calculate_recall(counts.annotated_and_detected, counts.total_annotated);
        Self {
            constraint,
            total_annotated: counts.total_annotated,
            total_detected: counts.total_detected,
            detected_and_annotated: counts.detected_and_annotated,
            annotated_and_detected: counts.annotated_and_detected,
            multi_annotated: counts.multi_annotated,
            stitching_errors: counts.stitching_errors,
            precision,
            recall,
            f1: calculate_f1(precision, recall),
            f2: calculate_f2(precision, recall),
            f05: calculate_f05(precision, recall),
        }
    }
}

#[derive(Debug, Default)]
struct Counts {
    total_annotated: usize,
    total_detected: usize,
    detected_and_annotated: usize,
    annotated_and_detected: usize,
    multi_annotated: usize,
    stitching_errors: usize,
}

/// Evaluate pooled detections against pooled annotations.
///
/// Detections rejected by `constraint` are ignored entirely. Every pooled
/// annotation record without a matching accepted detection lowers
/// `annotated_and_detected` by one; every record matched `n > 1` times adds
/// `n - 1` stitching errors.
pub fn analyse_records(
    annotations: &[Annotation],
    detections: &[Detection],
    constraint: &Constraint,
) -> AnalysisResult {
    let annotation_set: HashSet<AnnotationId> = annotations.iter().map(|ann| ann.id).collect();

    let mut counts = Counts {
        total_annotated: annotations.len(),
        ..Counts::default()
    };
    let mut match_counts: HashMap<AnnotationId, usize> = HashMap::new();

    for detection in detections.iter().filter(|d| constraint.accepts(d)) {
        counts.total_detected += 1;

        let mut matched = false;
        for id in detection
            .associated_annotation_ids
            .iter()
            .filter(|id| annotation_set.contains(id))
        {
            matched = true;
            *match_counts.entry(*id).or_insert(0) += 1;
        }
        if matched {
            counts.detected_and_annotated += 1;
        }

        if detection.is_multi_annotated() {
            counts.multi_annotated += 1;
        }
    }

    counts.annotated_and_detected = counts.total_annotated;
    for annotation in annotations {
        match match_counts.get(&annotation.id) {
            Some(&n) => counts.stitching_errors += n - 1,
            None => counts.annotated_and_detected -= 1,
        }
    }

    AnalysisResult::from_counts(*constraint, counts)
}

/// Set-based approximation of [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnalysisResult {
    pub constraint: Constraint,
    /// Distinct annotation identifiers.
    pub total_annotated: usize,
    /// Distinct accepted detection identifiers.
    pub total_detected: usize,
    /// Distinct annotations associated with any accepted detection.
    pub annotated_and_detected: usize,
}

impl QuickAnalysisResult {
    /// Recall estimated from distinct identifiers.
    pub fn recall(&self) -> f64 {
        calculate_recall(self.annotated_and_detected, self.total_annotated)
    }
}

/// Count distinct annotations, distinct accepted detections, and their
/// overlap. Does not detect multiple annotation or stitching errors.
pub fn quick_analyse_records(
    annotations: &[Annotation],
    detections: &[Detection],
    constraint: &Constraint,
) -> QuickAnalysisResult {
    let annotation_set: HashSet<AnnotationId> = annotations.iter().map(|ann| ann.id).collect();
    let mut detected: HashSet<DetectionId> = HashSet::new();
    let mut associated: HashSet<AnnotationId> = HashSet::new();

    for detection in detections.iter().filter(|d| constraint.accepts(d)) {
        detected.insert(detection.id);
        associated.extend(detection.associated_annotation_ids.iter().copied());
    }

    QuickAnalysisResult {
        constraint: *constraint,
        total_annotated: annotation_set.len(),
        total_detected: detected.len(),
        annotated_and_detected: annotation_set.intersection(&associated).count(),
    }
}

/// F-scores are `NaN` when undefined; JSON has no NaN, so they travel as
/// `null`.
mod undefined_score {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
