//! Evaluation orchestrator.
//!
//! [`Evaluator`] ties a [`DataProvider`] to an [`EntityCache`]: it resolves
//! the detection workflow, fetches per-entity results through the cache,
//! pools them and runs the metric evaluator once per constraint.
//!
//! Entity fetches are issued concurrently and joined in the order the
//! identifiers were supplied before any metric is computed.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use tokio::sync::OnceCell;

use crate::analysis::{AnalysisResult, EntityResults, PooledResults, QuickAnalysisResult};
use crate::cache::{CacheDump, EntityCache};
use crate::config::EvalConfig;
use crate::constraint::{fill_defaults, Attribute, Bound, PartialConstraint};
use crate::error::{EvalError, Result};
use crate::metrics::curve_points;
use crate::provider::DataProvider;
use crate::stats::CacheStats;
use crate::sweep::{attribute_sweep, comparison_sweeps, enumerate_sweep, SweepSpec};
use crate::types::{
    Annotation, Curve, Detection, DetectionId, EntityId, ResultKind, WorkflowId, WorkflowInfo,
};

/// Evaluates detections of one workflow against traced annotations.
///
/// # Example
///
/// ```
/// use detection_eval::{EvalConfig, Evaluator, InMemoryProvider, PartialConstraint};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let evaluator = Evaluator::new(InMemoryProvider::new(), EvalConfig::new().with_workflow(1));
/// let result = evaluator.analyse(&[], &PartialConstraint::new()).await.unwrap();
///
/// assert_eq!(result.precision, 1.0);
/// assert_eq!(result.recall, 1.0);
/// # }
/// ```
#[derive(Debug)]
pub struct Evaluator<P> {
    provider: P,
    config: EvalConfig,
    cache: EntityCache,
    workflow: OnceCell<WorkflowId>,
}

impl<P: DataProvider> Evaluator<P> {
    /// Create an evaluator with an empty cache.
    pub fn new(provider: P, config: EvalConfig) -> Self {
        let cache = EntityCache::with_ttl(config.cache_ttl());
        Self {
            provider,
            config,
            cache,
            workflow: OnceCell::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Detection workflows known to the provider, most recent first.
    pub async fn workflows(&self) -> Result<Vec<WorkflowInfo>> {
        self.provider
            .fetch_workflows()
            .await
            .map_err(EvalError::WorkflowError)
    }

    /// Workflow whose detections are evaluated.
    ///
    /// The configured workflow wins; otherwise the most recent one the
    /// provider lists is used. The choice is made once and remembered.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::NoWorkflow`] if nothing is configured and the
    /// provider lists no workflow.
    pub async fn workflow(&self) -> Result<WorkflowId> {
        self.workflow
            .get_or_try_init(|| self.resolve_workflow())
            .await
            .copied()
    }

    async fn resolve_workflow(&self) -> Result<WorkflowId> {
        if let Some(id) = self.config.workflow_id {
            return Ok(id);
        }
        let workflow = self
            .workflows()
            .await?
            .into_iter()
            .next()
            .ok_or(EvalError::NoWorkflow)?;
        tracing::info!(
            workflow = workflow.workflow_id,
            label = %workflow.label(),
            "using most recent workflow"
        );
        Ok(workflow.workflow_id)
    }

    /// Annotations of one entity, from cache when fresh.
    pub async fn entity_annotations(&self, entity: EntityId) -> Result<Vec<Annotation>> {
        self.cache
            .annotations(entity, || async move {
                self.provider
                    .fetch_annotations(entity)
                    .await
                    .map_err(|e| EvalError::provider(entity, ResultKind::Annotations, e))
            })
            .await
    }

    /// Detections of one entity with their associations, from cache when
    /// fresh.
    pub async fn entity_detections(&self, entity: EntityId) -> Result<Vec<Detection>> {
        self.cache
            .detections(entity, || async move {
                let workflow = self.workflow().await?;
                self.assemble_detections(entity, workflow).await
            })
            .await
    }

    /// Annotations and detections of one entity, fetched concurrently.
    pub async fn entity_results(&self, entity: EntityId) -> Result<EntityResults> {
        let (annotations, detections) = futures::try_join!(
            self.entity_annotations(entity),
            self.entity_detections(entity),
        )?;
        Ok(EntityResults {
            entity_id: entity,
            annotations,
            detections,
        })
    }

    /// Results of every entity, pooled in the order given.
    pub async fn gather(&self, entity_ids: &[EntityId]) -> Result<PooledResults> {
        let entities = try_join_all(entity_ids.iter().map(|&id| self.entity_results(id))).await?;
        Ok(PooledResults::from_entities(entities))
    }

    /// Full evaluation of `entity_ids` under `constraint`.
    ///
    /// Unset bounds are open. No entities yields the vacuous result.
    pub async fn analyse(
        &self,
        entity_ids: &[EntityId],
        constraint: &PartialConstraint,
    ) -> Result<AnalysisResult> {
        let constraint = fill_defaults(constraint);
        if entity_ids.is_empty() {
            return Ok(AnalysisResult::vacuous(constraint));
        }
        Ok(self.gather(entity_ids).await?.analyse(&constraint))
    }

    /// Approximate evaluation of `entity_ids` under `constraint`.
    pub async fn quick_analyse(
        &self,
        entity_ids: &[EntityId],
        constraint: &PartialConstraint,
    ) -> Result<QuickAnalysisResult> {
        let constraint = fill_defaults(constraint);
        Ok(self.gather(entity_ids).await?.quick_analyse(&constraint))
    }

    /// Evaluate every constraint of `spec`, in enumeration order.
    ///
    /// Entity results are gathered once and shared by all points.
    pub async fn sweep(
        &self,
        entity_ids: &[EntityId],
        spec: &SweepSpec,
    ) -> Result<Vec<AnalysisResult>> {
        let constraints = enumerate_sweep(spec);
        tracing::info!(
            entities = entity_ids.len(),
            points = constraints.len(),
            "starting sweep"
        );

        let pooled = self.gather(entity_ids).await?;
        let results: Vec<AnalysisResult> =
            constraints.iter().map(|c| pooled.analyse(c)).collect();

        tracing::info!(points = results.len(), "sweep finished");
        Ok(results)
    }

    /// Sweep the `max` bound of one attribute across its working range.
    ///
    /// Bounds set in `constants` for other attributes are held fixed.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidSweep`] if `bins` is less than 2.
    pub async fn sweep_attribute(
        &self,
        entity_ids: &[EntityId],
        attribute: Attribute,
        bins: usize,
        constants: &PartialConstraint,
    ) -> Result<Vec<AnalysisResult>> {
        let spec = attribute_sweep(
            attribute,
            Bound::Max,
            &self.config.working_ranges(),
            bins,
            constants,
        )?;
        self.sweep(entity_ids, &spec).await
    }

    /// One precision-recall curve per attribute, in attribute-name order.
    ///
    /// Each attribute is swept on its own while the others stay open.
    pub async fn compare(&self, entity_ids: &[EntityId], bins: usize) -> Result<Vec<Curve>> {
        let sweeps = comparison_sweeps(&self.config.working_ranges(), bins)?;
        let pooled = self.gather(entity_ids).await?;

        let curves = sweeps
            .iter()
            .map(|(attribute, spec)| {
                let results: Vec<AnalysisResult> = enumerate_sweep(spec)
                    .iter()
                    .map(|c| pooled.analyse(c))
                    .collect();
                tracing::debug!(attribute = %attribute, points = results.len(), "curve traced");
                Curve {
                    name: attribute.name().to_string(),
                    points: curve_points(&results),
                }
            })
            .collect();
        Ok(curves)
    }

    /// [`compare`](Self::compare) with the configured number of bins.
    pub async fn compare_default(&self, entity_ids: &[EntityId]) -> Result<Vec<Curve>> {
        self.compare(entity_ids, self.config.default_bins).await
    }

    /// Every detection of `entity_ids`, optionally refetching all of them.
    pub async fn detections_table(
        &self,
        entity_ids: &[EntityId],
        force_refresh: bool,
    ) -> Result<Vec<Detection>> {
        if force_refresh {
            self.refresh().await;
        }
        let per_entity =
            try_join_all(entity_ids.iter().map(|&id| self.entity_detections(id))).await?;
        Ok(per_entity.into_iter().flatten().collect())
    }

    /// Drop every cached result.
    ///
    /// Fetches already in flight answer their callers but are not stored.
    pub async fn refresh(&self) {
        self.cache.clear().await;
    }

    pub async fn dump_cache(&self) -> CacheDump {
        self.cache.dump().await
    }

    pub async fn restore_cache(&self, dump: CacheDump) {
        self.cache.restore(dump).await;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn assemble_detections(
        &self,
        entity: EntityId,
        workflow: WorkflowId,
    ) -> Result<Vec<Detection>> {
        let to_error = |e| EvalError::provider(entity, ResultKind::Detections, e);

        let rows = self
            .provider
            .fetch_detections(entity, workflow)
            .await
            .map_err(to_error)?;

        // later rows replace earlier ones with the same id
        let mut by_id: BTreeMap<DetectionId, Detection> =
            rows.into_iter().map(|row| (row.id, row)).collect();
        if by_id.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DetectionId> = by_id.keys().copied().collect();
        let pairs = self
            .provider
            .fetch_intersections(&ids, workflow, self.config.tolerance_nm)
            .await
            .map_err(to_error)?;

        for (detection, annotation) in pairs {
            match by_id.get_mut(&detection) {
                Some(row) => {
                    row.associated_annotation_ids.insert(annotation);
                }
                None => tracing::warn!(
                    entity,
                    detection,
                    annotation,
                    "intersection names an unknown detection"
                ),
            }
        }

        Ok(by_id.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::InMemoryProvider;
    use crate::types::{Coords, RelationType};
    use std::collections::BTreeSet;

    fn detection(id: DetectionId, entity_id: EntityId, uncertainty: f64) -> Detection {
        Detection {
            id,
            coords: Coords::default(),
            size_px: 100,
            contact_px: 10,
            slices: 3,
            uncertainty,
            associated_annotation_ids: BTreeSet::new(),
            entity_id,
            node_ids: BTreeSet::new(),
        }
    }

    fn workflow(id: WorkflowId) -> WorkflowInfo {
        WorkflowInfo {
            workflow_id: id,
            detection_algo_hash: "abcdef0123".to_string(),
            detection_algo_date: None,
            detection_algo_notes: None,
            association_algo_hash: "9876543210".to_string(),
            association_algo_date: None,
            association_algo_notes: None,
        }
    }

    fn provider() -> InMemoryProvider {
        InMemoryProvider::new()
            .with_workflow(workflow(2))
            .with_workflow(workflow(1))
            .with_annotations(
                1,
                vec![
                    Annotation::new(100, Coords::default(), RelationType::Presynaptic),
                    Annotation::new(101, Coords::default(), RelationType::Postsynaptic),
                ],
            )
            .with_detections(
                2,
                vec![
                    detection(12, 1, 0.2),
                    detection(10, 1, 0.9),
                    detection(12, 1, 0.4),
                ],
            )
            .with_intersection(2, 10, 100, 0.0)
            .with_intersection(2, 12, 100, 0.0)
            .with_intersection(2, 99, 101, 0.0)
    }

    #[tokio::test]
    async fn test_most_recent_workflow_is_default() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new());
        assert_eq!(evaluator.workflow().await.unwrap(), 2);
        assert_eq!(evaluator.workflow().await.unwrap(), 2);
        assert_eq!(evaluator.provider().calls().workflows, 1);
    }

    #[tokio::test]
    async fn test_configured_workflow_skips_listing() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new().with_workflow(1));
        assert_eq!(evaluator.workflow().await.unwrap(), 1);
        assert_eq!(evaluator.provider().calls().workflows, 0);
    }

    #[tokio::test]
    async fn test_no_workflow() {
        let evaluator = Evaluator::new(InMemoryProvider::new(), EvalConfig::new());
        assert!(matches!(
            evaluator.workflow().await,
            Err(EvalError::NoWorkflow)
        ));
    }

    #[tokio::test]
    async fn test_detections_are_deduplicated_and_associated() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new());
        let detections = evaluator.entity_detections(1).await.unwrap();

        let ids: Vec<DetectionId> = detections.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![10, 12]);
        assert_eq!(detections[1].uncertainty, 0.4);
        assert!(detections
            .iter()
            .all(|d| d.associated_annotation_ids.contains(&100)));
    }

    #[tokio::test]
    async fn test_empty_entity_skips_intersections() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new());
        let detections = evaluator.entity_detections(5).await.unwrap();

        assert!(detections.is_empty());
        assert_eq!(evaluator.provider().calls().intersections, 0);
    }

    #[tokio::test]
    async fn test_analyse_uses_cache() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new());
        let first = evaluator.analyse(&[1], &PartialConstraint::new()).await.unwrap();
        let second = evaluator.analyse(&[1], &PartialConstraint::new()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.total_annotated, 2);
        assert_eq!(first.total_detected, 2);
        assert_eq!(first.stitching_errors, 1);
        assert_eq!(evaluator.provider().calls().detections, 1);
        assert_eq!(evaluator.provider().calls().annotation_links, 2);
    }

    #[tokio::test]
    async fn test_provider_failure_carries_entity() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new().with_workflow(2));
        evaluator
            .provider()
            .set_failure(Some(ProviderError::Unavailable("down".to_string())));

        let err = evaluator.entity_detections(1).await.unwrap_err();
        assert!(matches!(
            err,
            EvalError::ProviderError {
                entity: 1,
                kind: ResultKind::Detections,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fresh_entries_need_no_workflow() {
        let online = Evaluator::new(provider(), EvalConfig::new());
        online.analyse(&[1], &PartialConstraint::new()).await.unwrap();
        let dump = online.dump_cache().await;

        let offline = Evaluator::new(provider(), EvalConfig::new());
        offline
            .provider()
            .set_failure(Some(ProviderError::Unavailable("offline".to_string())));
        offline.restore_cache(dump).await;

        let result = offline.analyse(&[1], &PartialConstraint::new()).await.unwrap();
        assert_eq!(result.total_detected, 2);
        assert_eq!(offline.provider().calls().workflows, 0);
        assert_eq!(offline.provider().calls().detections, 0);
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let evaluator = Evaluator::new(provider(), EvalConfig::new());
        evaluator.detections_table(&[1], false).await.unwrap();
        evaluator.detections_table(&[1], false).await.unwrap();
        assert_eq!(evaluator.provider().calls().detections, 1);

        let table = evaluator.detections_table(&[1], true).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(evaluator.provider().calls().detections, 2);
    }
}
