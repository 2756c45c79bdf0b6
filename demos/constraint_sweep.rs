//! Example sweeping detection constraints to trace precision-recall curves
//! and pick the best operating point.

use std::collections::BTreeSet;

use detection_eval::export::sweep_to_json;
use detection_eval::sweep::find_best;
use detection_eval::{
    Annotation, Attribute, Bound, Coords, Detection, EvalConfig, Evaluator, InMemoryProvider,
    PartialConstraint, RelationType, SweepSpec,
};
use tracing_subscriber::EnvFilter;

const WORKFLOW: u64 = 1;

/// Synthetic entity: every fourth detection is a false positive, and false
/// positives tend to be small and uncertain.
fn synthetic_provider(entities: u64, per_entity: u64) -> InMemoryProvider {
    (0..entities).fold(InMemoryProvider::new(), |provider, entity| {
        let base = entity * per_entity;
        let annotations = (base..base + per_entity)
            .map(|id| Annotation::new(id, Coords::default(), RelationType::Presynaptic))
            .collect();
        let detections = (base..base + per_entity)
            .map(|id| {
                let false_positive = id % 4 == 0;
                Detection {
                    id,
                    coords: Coords::default(),
                    size_px: if false_positive { 40 + id % 200 } else { 300 + id % 4000 },
                    contact_px: 5 + id % 200,
                    slices: 1 + id % 12,
                    uncertainty: if false_positive {
                        0.5 + (id % 50) as f64 / 100.0
                    } else {
                        (id % 60) as f64 / 100.0
                    },
                    associated_annotation_ids: BTreeSet::new(),
                    entity_id: entity,
                    node_ids: BTreeSet::new(),
                }
            })
            .collect();

        let provider = provider
            .with_annotations(entity, annotations)
            .with_detections(WORKFLOW, detections);
        (base..base + per_entity)
            .filter(|id| id % 4 != 0)
            .fold(provider, |p, id| p.with_intersection(WORKFLOW, id, id, 0.0))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Constraint Sweep Example ===\n");

    let evaluator = Evaluator::new(
        synthetic_provider(4, 100),
        EvalConfig::new().with_workflow(WORKFLOW),
    );
    let entities: Vec<u64> = (0..4).collect();

    // Example 1: Two-dimensional sweep
    println!("1. Sweeping Uncertainty and Size");
    let spec = SweepSpec::new()
        .with(Attribute::Uncertainty, Bound::Max, vec![0.3, 0.5, 0.7, 1.0])
        .with(Attribute::SizePx, Bound::Min, vec![1.0, 100.0, 250.0]);
    let results = evaluator.sweep(&entities, &spec).await?;

    println!("   Size >= | Unc <= | Precision | Recall | F1");
    println!("   --------|--------|-----------|--------|--------");
    for result in &results {
        println!(
            "   {:>7} | {:>6.2} | {:>9.4} | {:>6.4} | {:>6.4}",
            result.constraint.size_px.min,
            result.constraint.uncertainty.max,
            result.precision,
            result.recall,
            result.f1
        );
    }
    println!();

    // Example 2: Best operating point
    println!("2. Best Operating Point");
    for (label, beta) in [("F1", 1.0), ("F2", 2.0), ("F0.5", 0.5)] {
        if let Some(best) = find_best(&results, beta) {
            println!(
                "   Best {label}: size >= {}, uncertainty <= {:.2} (precision {:.4}, recall {:.4})",
                best.constraint.size_px.min,
                best.constraint.uncertainty.max,
                best.precision,
                best.recall
            );
        }
    }
    println!();

    // Example 3: One curve per attribute
    println!("3. Attribute Comparison");
    for curve in evaluator.compare(&entities, 6).await? {
        let points: Vec<String> = curve
            .points
            .iter()
            .map(|p| format!("({:.2}, {:.2})", p.precision, p.recall))
            .collect();
        println!("   {:<12} {}", curve.name, points.join(" "));
    }
    println!();

    // Example 4: Single attribute with constants
    println!("4. Uncertainty Sweep at Size >= 100");
    let constants = PartialConstraint::new().with(Attribute::SizePx, Bound::Min, 100.0);
    let results = evaluator
        .sweep_attribute(&entities, Attribute::Uncertainty, 5, &constants)
        .await?;
    println!("{}", sweep_to_json(&results[..1])?);
    println!("   ... {} points", results.len());
    println!();

    println!("   {}", evaluator.cache_stats().summary_string());
    println!("\n=== Example Complete ===");
    Ok(())
}
