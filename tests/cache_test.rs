//! Cache behaviour observed through the evaluator: expiry, coalescing of
//! concurrent lookups, refresh epochs and failed fetches.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use detection_eval::cache::{CacheEntry, Timestamped};
use detection_eval::{
    Annotation, CacheDump, Coords, Detection, EvalConfig, Evaluator, InMemoryProvider,
    PartialConstraint, ProviderError, RelationType,
};

const WORKFLOW: u64 = 1;
const LATENCY: Duration = Duration::from_millis(50);

fn create_detection(id: u64, entity_id: u64) -> Detection {
    Detection {
        id,
        coords: Coords::default(),
        size_px: 120,
        contact_px: 15,
        slices: 2,
        uncertainty: 0.2,
        associated_annotation_ids: BTreeSet::new(),
        entity_id,
        node_ids: BTreeSet::new(),
    }
}

fn create_provider() -> InMemoryProvider {
    InMemoryProvider::new()
        .with_annotations(
            1,
            vec![Annotation::new(5, Coords::default(), RelationType::Presynaptic)],
        )
        .with_annotations(
            2,
            vec![Annotation::new(6, Coords::default(), RelationType::Postsynaptic)],
        )
        .with_detections(WORKFLOW, vec![create_detection(50, 1), create_detection(60, 2)])
        .with_intersection(WORKFLOW, 50, 5, 0.0)
        .with_intersection(WORKFLOW, 60, 6, 0.0)
}

fn create_evaluator(provider: InMemoryProvider) -> Evaluator<InMemoryProvider> {
    Evaluator::new(provider, EvalConfig::new().with_workflow(WORKFLOW))
}

fn aged_dump(age: chrono::Duration) -> CacheDump {
    let timestamp = Utc::now() - age;
    let mut detection = create_detection(50, 1);
    detection.associated_annotation_ids.insert(5);

    let mut dump = CacheDump::new();
    dump.insert(
        1,
        CacheEntry {
            detections: Some(Timestamped {
                timestamp,
                results: vec![detection],
            }),
            annotations: Some(Timestamped {
                timestamp,
                results: vec![Annotation::new(5, Coords::default(), RelationType::Presynaptic)],
            }),
        },
    );
    dump
}

#[tokio::test]
async fn test_entry_younger_than_ttl_is_reused() {
    let evaluator = create_evaluator(create_provider());
    evaluator.restore_cache(aged_dump(chrono::Duration::minutes(29))).await;

    let result = evaluator.analyse(&[1], &PartialConstraint::new()).await.unwrap();

    assert_eq!(result.recall, 1.0);
    assert_eq!(evaluator.provider().calls().detections, 0);
    assert_eq!(evaluator.provider().calls().annotation_links, 0);
    assert_eq!(evaluator.cache_stats().hits, 2);
}

#[tokio::test]
async fn test_entry_older_than_ttl_is_refetched() {
    let evaluator = create_evaluator(create_provider());
    evaluator.restore_cache(aged_dump(chrono::Duration::minutes(31))).await;

    evaluator.analyse(&[1], &PartialConstraint::new()).await.unwrap();

    assert_eq!(evaluator.provider().calls().detections, 1);
    assert_eq!(evaluator.provider().calls().annotation_links, 2);
    assert_eq!(evaluator.cache_stats().expired, 2);

    let dump = evaluator.dump_cache().await;
    let refreshed = dump[&1].detections.as_ref().unwrap().timestamp;
    assert!(Utc::now() - refreshed < chrono::Duration::minutes(1));
}

#[tokio::test]
async fn test_configured_ttl_applies() {
    let evaluator = Evaluator::new(
        create_provider(),
        EvalConfig::new()
            .with_workflow(WORKFLOW)
            .with_cache_ttl(Duration::from_secs(60)),
    );
    evaluator.restore_cache(aged_dump(chrono::Duration::minutes(2))).await;

    evaluator.entity_detections(1).await.unwrap();
    assert_eq!(evaluator.provider().calls().detections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_lookups_of_one_key_coalesce() {
    let evaluator = create_evaluator(create_provider().with_latency(LATENCY));

    let (first, second) = tokio::join!(
        evaluator.entity_annotations(1),
        evaluator.entity_annotations(1),
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(evaluator.provider().calls().annotation_links, 2);
    assert_eq!(evaluator.cache_stats().misses, 1);
    assert_eq!(evaluator.cache_stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_entities_fetch_concurrently() {
    let evaluator = create_evaluator(create_provider().with_latency(LATENCY));
    let start = tokio::time::Instant::now();

    let (one, two) = tokio::join!(evaluator.entity_results(1), evaluator.entity_results(2));
    one.unwrap();
    two.unwrap();

    // detections then intersections is the longest chain per entity
    assert!(start.elapsed() < LATENCY * 3);
    assert_eq!(evaluator.provider().calls().detections, 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_discards_in_flight_results() {
    let evaluator = create_evaluator(create_provider().with_latency(LATENCY));

    let (annotations, ()) = tokio::join!(evaluator.entity_annotations(1), async {
        tokio::time::sleep(LATENCY / 5).await;
        evaluator.refresh().await;
    });

    assert_eq!(annotations.unwrap().len(), 1);
    assert!(evaluator.cache().is_empty().await);
    assert_eq!(evaluator.cache_stats().discarded, 1);

    evaluator.entity_annotations(1).await.unwrap();
    assert_eq!(evaluator.provider().calls().annotation_links, 4);
    assert_eq!(evaluator.cache().len().await, 1);
}

#[tokio::test]
async fn test_failed_fetch_leaves_cache_untouched() {
    let evaluator = create_evaluator(create_provider());
    evaluator.restore_cache(aged_dump(chrono::Duration::minutes(40))).await;
    let before = evaluator.dump_cache().await;

    evaluator
        .provider()
        .set_failure(Some(ProviderError::Timeout("upstream".to_string())));
    assert!(evaluator.analyse(&[1], &PartialConstraint::new()).await.is_err());
    assert_eq!(evaluator.dump_cache().await, before);
    assert!(evaluator.cache_stats().failed_fetches >= 1);

    evaluator.provider().set_failure(None);
    let result = evaluator.analyse(&[1], &PartialConstraint::new()).await.unwrap();
    assert_eq!(result.detected_and_annotated, 1);
    assert_ne!(evaluator.dump_cache().await, before);
}
