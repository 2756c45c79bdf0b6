//! Stress tests with large datasets and many concurrent lookups.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::join_all;

use detection_eval::{
    analyse_records, Annotation, Attribute, Bound, Constraint, Coords, Detection, EvalConfig,
    Evaluator, InMemoryProvider, PartialConstraint, RelationType, SweepSpec,
};

const WORKFLOW: u64 = 2;

fn create_annotation(id: u64) -> Annotation {
    let relation_type = if id % 2 == 0 {
        RelationType::Presynaptic
    } else {
        RelationType::Postsynaptic
    };
    Annotation::new(id, Coords::new(id as f64, 0.0, 0.0), relation_type)
}

fn create_detection(id: u64, entity_id: u64, associated: &[u64]) -> Detection {
    Detection {
        id,
        coords: Coords::default(),
        size_px: 50 + id % 1000,
        contact_px: 1 + id % 300,
        slices: 1 + id % 15,
        uncertainty: (id % 100) as f64 / 100.0,
        associated_annotation_ids: associated.iter().copied().collect(),
        entity_id,
        node_ids: BTreeSet::new(),
    }
}

/// `entities` entities with `per_entity` annotations each, every annotation
/// hit by exactly one detection.
fn create_provider(entities: u64, per_entity: u64) -> InMemoryProvider {
    (0..entities).fold(InMemoryProvider::new(), |provider, entity| {
        let ids: Vec<u64> = (0..per_entity).map(|i| entity * per_entity + i).collect();
        let detections = ids.iter().map(|&id| create_detection(id, entity, &[])).collect();
        let provider = provider
            .with_annotations(entity, ids.iter().map(|&id| create_annotation(id)).collect())
            .with_detections(WORKFLOW, detections);
        ids.iter()
            .fold(provider, |p, &id| p.with_intersection(WORKFLOW, id, id, 0.0))
    })
}

#[test]
fn test_1000_annotations_single_entity() {
    let annotations: Vec<Annotation> = (0..1000).map(create_annotation).collect();
    let detections: Vec<Detection> = (0..1000).map(|i| create_detection(i, 1, &[i])).collect();

    let result = analyse_records(&annotations, &detections, &Constraint::default());

    assert_eq!(result.total_annotated, 1000);
    assert_eq!(result.total_detected, 1000);
    assert_eq!(result.precision, 1.0);
    assert_eq!(result.recall, 1.0);
    assert_eq!(result.stitching_errors, 0);
}

#[test]
fn test_heavily_stitched_annotation() {
    let annotations = vec![create_annotation(1)];
    let detections: Vec<Detection> = (0..500).map(|i| create_detection(i, 1, &[1])).collect();

    let result = analyse_records(&annotations, &detections, &Constraint::default());
    assert_eq!(result.stitching_errors, 499);
    assert_eq!(result.annotated_and_detected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_100_entities_fetched_concurrently() {
    let provider = create_provider(100, 10).with_latency(Duration::from_millis(20));
    let evaluator = Evaluator::new(provider, EvalConfig::new().with_workflow(WORKFLOW));
    let entities: Vec<u64> = (0..100).collect();

    let start = tokio::time::Instant::now();
    let result = evaluator.analyse(&entities, &PartialConstraint::new()).await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(result.total_annotated, 1000);
    assert_eq!(result.recall, 1.0);
    assert_eq!(evaluator.provider().calls().detections, 100);

    evaluator.analyse(&entities, &PartialConstraint::new()).await.unwrap();
    assert_eq!(evaluator.provider().calls().detections, 100);
    assert_eq!(evaluator.cache().len().await, 100);
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_lookups_one_fetch() {
    let provider = create_provider(1, 50).with_latency(Duration::from_millis(20));
    let evaluator = Evaluator::new(provider, EvalConfig::new().with_workflow(WORKFLOW));

    let results = join_all((0..50).map(|_| evaluator.entity_detections(0))).await;

    assert!(results.iter().all(|r| r.as_ref().map(Vec::len).ok() == Some(50)));
    assert_eq!(evaluator.provider().calls().detections, 1);
    assert_eq!(evaluator.provider().calls().intersections, 1);
    assert_eq!(evaluator.cache_stats().hits, 49);
}

#[tokio::test]
async fn test_10000_point_sweep() {
    let evaluator = Evaluator::new(create_provider(5, 100), EvalConfig::new().with_workflow(WORKFLOW));
    let values = |from: f64, step: f64| (0..10).map(|i| from + step * i as f64).collect::<Vec<_>>();
    let spec = SweepSpec::new()
        .with(Attribute::ContactPx, Bound::Min, values(1.0, 30.0))
        .with(Attribute::SizePx, Bound::Min, values(50.0, 100.0))
        .with(Attribute::Slices, Bound::Min, values(1.0, 1.5))
        .with(Attribute::Uncertainty, Bound::Max, values(0.1, 0.1));

    let entities: Vec<u64> = (0..5).collect();
    let results = evaluator.sweep(&entities, &spec).await.unwrap();

    assert_eq!(results.len(), 10_000);
    assert!(results.iter().all(|r| r.precision == 1.0));
    assert_eq!(evaluator.provider().calls().detections, 5);
}

#[tokio::test]
async fn test_recall_grows_as_uncertainty_relaxes() {
    let evaluator = Evaluator::new(create_provider(3, 200), EvalConfig::new().with_workflow(WORKFLOW));
    let results = evaluator
        .sweep_attribute(&[0, 1, 2], Attribute::Uncertainty, 20, &PartialConstraint::new())
        .await
        .unwrap();

    assert_eq!(results.len(), 20);
    assert!(results.windows(2).all(|w| w[0].recall <= w[1].recall));
    assert_eq!(results.last().map(|r| r.recall), Some(1.0));
}
