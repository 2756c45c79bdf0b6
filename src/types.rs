//! Core data types for traced annotations and automated detections.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an entity (a traced skeleton) that detections and
/// annotations are grouped by.
pub type EntityId = u64;

/// Identifier of a ground-truth annotation (a connector).
pub type AnnotationId = u64;

/// Identifier of an automatically detected object.
pub type DetectionId = u64;

/// Identifier of a detection workflow.
pub type WorkflowId = u64;

/// Position in stack space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coords {
    /// Create a new position.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Direction of the link between an annotation and its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "presynaptic_to")]
    Presynaptic,
    #[serde(rename = "postsynaptic_to")]
    Postsynaptic,
}

impl RelationType {
    /// Both relation kinds, in fetch order.
    pub const ALL: [RelationType; 2] = [RelationType::Presynaptic, RelationType::Postsynaptic];

    /// Wire name of the relation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Presynaptic => "presynaptic_to",
            RelationType::Postsynaptic => "postsynaptic_to",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manually traced ground-truth marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    #[serde(default)]
    pub coords: Coords,
    pub relation_type: RelationType,
}

impl Annotation {
    /// Create a new annotation.
    pub fn new(id: AnnotationId, coords: Coords, relation_type: RelationType) -> Self {
        Self {
            id,
            coords,
            relation_type,
        }
    }
}

/// An automatically detected object together with the annotations it
/// intersects.
///
/// `associated_annotation_ids` is empty when the row comes from the data
/// provider and is filled in from the intersection payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub id: DetectionId,
    #[serde(default)]
    pub coords: Coords,
    /// Total pixel count across all slices.
    pub size_px: u64,
    /// Pixel count of the contact area with the entity.
    pub contact_px: u64,
    /// Number of distinct depth slices touched.
    pub slices: u64,
    /// Mean detection uncertainty, in [0, 1].
    pub uncertainty: f64,
    #[serde(default)]
    pub associated_annotation_ids: BTreeSet<AnnotationId>,
    pub entity_id: EntityId,
    /// Nodes of the entity the detection touches.
    #[serde(default)]
    pub node_ids: BTreeSet<u64>,
}

impl Detection {
    /// Whether more than one annotation was matched to this detection.
    pub fn is_multi_annotated(&self) -> bool {
        self.associated_annotation_ids.len() > 1
    }
}

/// Which per-entity result set a cache slot or fetch refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Detections,
    Annotations,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Detections => f.write_str("detections"),
            ResultKind::Annotations => f.write_str("annotations"),
        }
    }
}

/// Description of a detection workflow offered by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub workflow_id: WorkflowId,
    pub detection_algo_hash: String,
    #[serde(default)]
    pub detection_algo_date: Option<String>,
    #[serde(default)]
    pub detection_algo_notes: Option<String>,
    pub association_algo_hash: String,
    #[serde(default)]
    pub association_algo_date: Option<String>,
    #[serde(default)]
    pub association_algo_notes: Option<String>,
}

impl WorkflowInfo {
    /// Short label combining both algorithm hashes.
    pub fn label(&self) -> String {
        let short = |hash: &str| hash.chars().take(7).collect::<String>();
        format!(
            "{} & {}",
            short(&self.detection_algo_hash),
            short(&self.association_algo_hash)
        )
    }
}

/// Precision-Recall curve point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallPoint {
    pub precision: f64,
    pub recall: f64,
}

/// A named precision-recall curve, points in sweep order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub name: String,
    pub points: Vec<PrecisionRecallPoint>,
}
