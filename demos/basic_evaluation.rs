//! Basic evaluation example demonstrating core functionality.
//!
//! Run with `RUST_LOG=debug` to see cache activity.

use std::collections::BTreeSet;

use detection_eval::{
    Annotation, Attribute, Bound, Coords, Detection, EvalConfig, Evaluator, InMemoryProvider,
    PartialConstraint, RelationType, WorkflowInfo,
};
use tracing_subscriber::EnvFilter;

fn detection(id: u64, entity_id: u64, size_px: u64, uncertainty: f64) -> Detection {
    Detection {
        id,
        coords: Coords::new(id as f64 * 40.0, 0.0, 0.0),
        size_px,
        contact_px: size_px / 4,
        slices: 1 + size_px / 300,
        uncertainty,
        associated_annotation_ids: BTreeSet::new(),
        entity_id,
        node_ids: BTreeSet::new(),
    }
}

fn demo_provider() -> InMemoryProvider {
    let workflow = WorkflowInfo {
        workflow_id: 7,
        detection_algo_hash: "3f9a2c1d8e7b".to_string(),
        detection_algo_date: Some("2024-05-02".to_string()),
        detection_algo_notes: Some("synapse detector".to_string()),
        association_algo_hash: "a71be04c55d2".to_string(),
        association_algo_date: Some("2024-05-03".to_string()),
        association_algo_notes: None,
    };

    InMemoryProvider::new()
        .with_workflow(workflow)
        .with_annotations(
            11,
            vec![
                Annotation::new(1, Coords::new(0.0, 0.0, 0.0), RelationType::Presynaptic),
                Annotation::new(2, Coords::new(40.0, 0.0, 0.0), RelationType::Presynaptic),
                Annotation::new(3, Coords::new(80.0, 0.0, 0.0), RelationType::Postsynaptic),
            ],
        )
        .with_annotations(
            12,
            vec![Annotation::new(4, Coords::new(500.0, 0.0, 0.0), RelationType::Postsynaptic)],
        )
        .with_detections(
            7,
            vec![
                detection(100, 11, 850, 0.12),
                detection(101, 11, 420, 0.35),
                detection(102, 11, 60, 0.81),
                detection(103, 12, 1200, 0.05),
                detection(104, 12, 30, 0.95),
            ],
        )
        .with_intersection(7, 100, 1, 0.0)
        .with_intersection(7, 101, 1, 12.0)
        .with_intersection(7, 101, 2, 4.0)
        .with_intersection(7, 103, 4, 0.0)
        .with_intersection(7, 104, 3, 80.0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Detection Evaluation Example ===\n");

    let config = EvalConfig::from_toml_str(
        r#"
        tolerance_nm = 20.0
        "#,
    )?;
    let evaluator = Evaluator::new(demo_provider(), config);
    let entities = [11, 12];

    // Example 1: Workflows
    println!("1. Available Workflows");
    for workflow in evaluator.workflows().await? {
        println!("   #{}: {}", workflow.workflow_id, workflow.label());
    }
    println!("   Using workflow {}", evaluator.workflow().await?);
    println!();

    // Example 2: Unconstrained analysis
    println!("2. Unconstrained Analysis");
    let result = evaluator.analyse(&entities, &PartialConstraint::new()).await?;
    println!("   Annotated:              {}", result.total_annotated);
    println!("   Detected:               {}", result.total_detected);
    println!("   Detected & annotated:   {}", result.detected_and_annotated);
    println!("   Annotated & detected:   {}", result.annotated_and_detected);
    println!("   Multi-annotated:        {}", result.multi_annotated);
    println!("   Stitching errors:       {}", result.stitching_errors);
    println!("   Precision:              {:.4}", result.precision);
    println!("   Recall:                 {:.4}", result.recall);
    println!("   F1:                     {:.4}", result.f1);
    println!();

    // Example 3: Constrained analysis, served from cache
    println!("3. Constrained Analysis");
    let constraint = PartialConstraint::new()
        .with(Attribute::Uncertainty, Bound::Max, 0.5)
        .with(Attribute::SizePx, Bound::Min, 100.0);
    let result = evaluator.analyse(&entities, &constraint).await?;
    println!("   Uncertainty <= 0.5, size >= 100px");
    println!(
        "   Precision: {:.4}, Recall: {:.4}, F1: {:.4}",
        result.precision, result.recall, result.f1
    );
    println!();

    // Example 4: Quick analysis
    println!("4. Quick Analysis");
    let quick = evaluator.quick_analyse(&entities, &constraint).await?;
    println!(
        "   {} of {} distinct annotations detected (recall {:.4})",
        quick.annotated_and_detected,
        quick.total_annotated,
        quick.recall()
    );
    println!();

    // Example 5: Cache
    println!("5. Cache");
    println!("   {}", evaluator.cache_stats().summary_string());
    let dump = evaluator.dump_cache().await;
    println!("   Cached entities: {:?}", dump.keys().collect::<Vec<_>>());
    println!();

    println!("=== Example Complete ===");
    Ok(())
}
