//! Data-provider seam.
//!
//! The engine never talks to a data source directly. Everything it needs,
//! traced annotations, raw detections and the detection/annotation
//! intersections computed within a spatial tolerance, comes through a
//! [`DataProvider`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{
    Annotation, AnnotationId, Detection, DetectionId, EntityId, RelationType, WorkflowId,
    WorkflowInfo,
};

/// Source of annotations and detections.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// List detection workflows, most recent first.
    async fn fetch_workflows(&self) -> Result<Vec<WorkflowInfo>, ProviderError>;

    /// Annotations linked to `entity` through one relation type.
    async fn fetch_annotation_links(
        &self,
        entity: EntityId,
        relation: RelationType,
    ) -> Result<Vec<Annotation>, ProviderError>;

    /// Detections touching `entity` in `workflow`, with empty association
    /// sets.
    async fn fetch_detections(
        &self,
        entity: EntityId,
        workflow: WorkflowId,
    ) -> Result<Vec<Detection>, ProviderError>;

    /// `(detection, annotation)` pairs lying within `tolerance_nm` of each
    /// other.
    async fn fetch_intersections(
        &self,
        detections: &[DetectionId],
        workflow: WorkflowId,
        tolerance_nm: f64,
    ) -> Result<Vec<(DetectionId, AnnotationId)>, ProviderError>;

    /// All annotations of `entity`.
    ///
    /// Both relation types are fetched concurrently. Within one relation an
    /// annotation appears once, ordered by id; the presynaptic list comes
    /// first.
    async fn fetch_annotations(&self, entity: EntityId) -> Result<Vec<Annotation>, ProviderError> {
        let [pre, post] = RelationType::ALL;
        let (pre, post) = futures::try_join!(
            self.fetch_annotation_links(entity, pre),
            self.fetch_annotation_links(entity, post),
        )?;

        Ok([pre, post]
            .into_iter()
            .flat_map(|links| {
                links
                    .into_iter()
                    .map(|ann| (ann.id, ann))
                    .collect::<BTreeMap<_, _>>()
                    .into_values()
            })
            .collect())
    }
}

/// Number of calls a provider has served, per method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCalls {
    pub workflows: usize,
    pub annotation_links: usize,
    pub detections: usize,
    pub intersections: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    workflows: AtomicUsize,
    annotation_links: AtomicUsize,
    detections: AtomicUsize,
    intersections: AtomicUsize,
}

/// Provider backed by in-process tables.
///
/// Intersections are stored with their distance so that the tolerance
/// passed by the engine is honoured. Calls can be delayed to simulate
/// network latency, and the provider can be switched into a failing state.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    workflows: Vec<WorkflowInfo>,
    annotations: HashMap<(EntityId, RelationType), Vec<Annotation>>,
    detections: HashMap<(EntityId, WorkflowId), Vec<Detection>>,
    intersections: HashMap<WorkflowId, Vec<(DetectionId, AnnotationId, f64)>>,
    latency: Option<Duration>,
    failure: Mutex<Option<ProviderError>>,
    counters: CallCounters,
}

impl InMemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow. Workflows are listed in registration order.
    pub fn with_workflow(mut self, workflow: WorkflowInfo) -> Self {
        self.workflows.push(workflow);
        self
    }

    /// Register annotations linked to `entity`; each carries its relation.
    pub fn with_annotations(mut self, entity: EntityId, annotations: Vec<Annotation>) -> Self {
        for annotation in annotations {
            self.annotations
                .entry((entity, annotation.relation_type))
                .or_default()
                .push(annotation);
        }
        self
    }

    /// Register detections of `workflow`; each is filed under its entity.
    pub fn with_detections(mut self, workflow: WorkflowId, detections: Vec<Detection>) -> Self {
        for detection in detections {
            self.detections
                .entry((detection.entity_id, workflow))
                .or_default()
                .push(detection);
        }
        self
    }

    /// Register a detection/annotation pair `distance_nm` apart.
    pub fn with_intersection(
        mut self,
        workflow: WorkflowId,
        detection: DetectionId,
        annotation: AnnotationId,
        distance_nm: f64,
    ) -> Self {
        self.intersections
            .entry(workflow)
            .or_default()
            .push((detection, annotation, distance_nm));
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent call fail with `error`, or succeed again with
    /// `None`.
    pub fn set_failure(&self, error: Option<ProviderError>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = error;
        }
    }

    /// Calls served so far.
    pub fn calls(&self) -> ProviderCalls {
        ProviderCalls {
            workflows: self.counters.workflows.load(Ordering::SeqCst),
            annotation_links: self.counters.annotation_links.load(Ordering::SeqCst),
            detections: self.counters.detections.load(Ordering::SeqCst),
            intersections: self.counters.intersections.load(Ordering::SeqCst),
        }
    }

    async fn serve(&self, counter: &AtomicUsize) -> Result<(), ProviderError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failure = self
            .failure
            .lock()
            .map_err(|_| ProviderError::Unavailable("provider state poisoned".to_string()))?
            .clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataProvider for InMemoryProvider {
    async fn fetch_workflows(&self) -> Result<Vec<WorkflowInfo>, ProviderError> {
        self.serve(&self.counters.workflows).await?;
        Ok(self.workflows.clone())
    }

    async fn fetch_annotation_links(
        &self,
        entity: EntityId,
        relation: RelationType,
    ) -> Result<Vec<Annotation>, ProviderError> {
        self.serve(&self.counters.annotation_links).await?;
        Ok(self
            .annotations
            .get(&(entity, relation))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_detections(
        &self,
        entity: EntityId,
        workflow: WorkflowId,
    ) -> Result<Vec<Detection>, ProviderError> {
        self.serve(&self.counters.detections).await?;
        Ok(self
            .detections
            .get(&(entity, workflow))
            .map(|rows| {
                rows.iter()
                    .cloned()
                    .map(|mut row| {
                        row.associated_annotation_ids.clear();
                        row
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_intersections(
        &self,
        detections: &[DetectionId],
        workflow: WorkflowId,
        tolerance_nm: f64,
    ) -> Result<Vec<(DetectionId, AnnotationId)>, ProviderError> {
        self.serve(&self.counters.intersections).await?;
        Ok(self
            .intersections
            .get(&workflow)
            .map(|pairs| {
                pairs
                    .iter()
                    .filter(|(det, _, distance)| detections.contains(det) && *distance <= tolerance_nm)
                    .map(|&(det, ann, _)| (det, ann))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coords;

    fn annotation(id: AnnotationId, relation_type: RelationType) -> Annotation {
        Annotation::new(id, Coords::default(), relation_type)
    }

    #[tokio::test]
    async fn test_fetch_annotations_dedups_within_relation() {
        let provider = InMemoryProvider::new().with_annotations(
            1,
            vec![
                annotation(9, RelationType::Postsynaptic),
                annotation(4, RelationType::Presynaptic),
                annotation(2, RelationType::Presynaptic),
                annotation(4, RelationType::Presynaptic),
                annotation(4, RelationType::Postsynaptic),
            ],
        );

        let annotations = provider.fetch_annotations(1).await.unwrap();
        let ids: Vec<AnnotationId> = annotations.iter().map(|a| a.id).collect();

        assert_eq!(ids, vec![2, 4, 4, 9]);
        assert_eq!(provider.calls().annotation_links, 2);
    }

    #[tokio::test]
    async fn test_intersections_respect_tolerance() {
        let provider = InMemoryProvider::new()
            .with_intersection(3, 10, 1, 0.0)
            .with_intersection(3, 10, 2, 50.0)
            .with_intersection(3, 11, 1, 0.0);

        let pairs = provider.fetch_intersections(&[10], 3, 10.0).await.unwrap();
        assert_eq!(pairs, vec![(10, 1)]);

        let pairs = provider.fetch_intersections(&[10, 11], 3, 100.0).await.unwrap();
        assert_eq!(pairs.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_switch() {
        let provider = InMemoryProvider::new();
        provider.set_failure(Some(ProviderError::Timeout("slow".to_string())));
        assert!(provider.fetch_workflows().await.is_err());

        provider.set_failure(None);
        assert!(provider.fetch_workflows().await.is_ok());
        assert_eq!(provider.calls().workflows, 2);
    }
}
