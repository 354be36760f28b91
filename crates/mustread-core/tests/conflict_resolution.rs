//! Conflict detection and arbitration as seen through a full batch run.

use std::sync::Arc;

use mustread_core::fakes::{self, ScriptedArbiter, ScriptedPipeline, ScriptedRole};
use mustread_core::{
    ConflictPolicy, ConflictResolver, CoordinatorSettings, ItemResult, NoveltyLevel, RoleKind,
    WorkflowCoordinator, DEFAULT_CATEGORIES,
};

fn run_coordinator(
    pipeline: &ScriptedPipeline,
    arbiter: Arc<ScriptedArbiter>,
) -> WorkflowCoordinator {
    let resolver = ConflictResolver::new(
        ConflictPolicy::default(),
        DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        arbiter,
    );
    WorkflowCoordinator::new(
        pipeline.role_set().unwrap(),
        resolver,
        &CoordinatorSettings::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_high_score_with_low_novelty_is_arbitrated() {
    let mut pipeline = ScriptedPipeline::clean();
    pipeline.novelty_assessor = Arc::new(ScriptedRole::new(
        RoleKind::NoveltyAssessor,
        fakes::novelty_output(NoveltyLevel::Low, 2.0),
    ));
    pipeline.scorer = Arc::new(ScriptedRole::new(
        RoleKind::Scorer,
        fakes::score_output(9.5),
    ));
    let arbiter = Arc::new(ScriptedArbiter::replying(
        "Novelty is low; cap the ranking score.",
    ));

    let results = run_coordinator(&pipeline, arbiter.clone())
        .run(&[fakes::paper("p1")])
        .await;

    let success = results[0].as_success().expect("conflicts never fail a paper");
    assert_eq!(success.conflicts.aspects(), vec!["score_exceeds_novelty"]);
    assert_eq!(
        success.conflicts.resolution.as_deref(),
        Some("Novelty is low; cap the ranking score.")
    );
    assert_eq!(
        success.conflicts.conflicts[0].roles,
        vec![RoleKind::Scorer, RoleKind::NoveltyAssessor]
    );

    let contexts = arbiter.contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].contains("Paper: Paper p1 (p1)"));
    assert!(contexts[0].contains("- score_exceeds_novelty:"));
    assert!(contexts[0].contains("\"score\": 9.5"));
}

#[tokio::test]
async fn test_out_of_range_score_is_reported_not_failed() {
    let mut pipeline = ScriptedPipeline::clean();
    pipeline.scorer = Arc::new(ScriptedRole::clean(RoleKind::Scorer).with_output_for(
        "p2",
        fakes::score_output(42.0),
    ));
    let arbiter = Arc::new(ScriptedArbiter::replying("Discard the score."));

    let results = run_coordinator(&pipeline, arbiter.clone())
        .run(&[fakes::paper("p1"), fakes::paper("p2")])
        .await;

    assert!(results.iter().all(ItemResult::is_success));
    assert!(results[0].as_success().unwrap().conflicts.is_empty());
    let flagged = results[1].as_success().unwrap();
    assert_eq!(flagged.conflicts.aspects(), vec!["score_out_of_range"]);
    assert_eq!(arbiter.call_count(), 1);
}

#[tokio::test]
async fn test_category_mismatch_and_unknown_category() {
    let mut pipeline = ScriptedPipeline::clean();
    pipeline.summarizer = Arc::new(ScriptedRole::new(
        RoleKind::Summarizer,
        fakes::summary_output(Some("Multimodal AI Systems")),
    ));
    pipeline.classifier = Arc::new(ScriptedRole::new(
        RoleKind::Classifier,
        fakes::classification_output("Quantum Basket Weaving", 0.7),
    ));
    let arbiter = Arc::new(ScriptedArbiter::replying("Use the summary's area."));

    let results = run_coordinator(&pipeline, arbiter)
        .run(&[fakes::paper("p1")])
        .await;

    let aspects = results[0].as_success().unwrap().conflicts.aspects();
    assert!(aspects.contains(&"unknown_category"));
    assert!(aspects.contains(&"category_mismatch"));
}

#[tokio::test]
async fn test_blank_arbitration_reply_yields_empty_report() {
    let mut pipeline = ScriptedPipeline::clean();
    pipeline.scorer = Arc::new(ScriptedRole::new(
        RoleKind::Scorer,
        fakes::score_output(-1.0),
    ));

    let results = run_coordinator(&pipeline, Arc::new(ScriptedArbiter::replying("   ")))
        .run(&[fakes::paper("p1")])
        .await;

    assert!(results[0].as_success().unwrap().conflicts.is_empty());
}

#[tokio::test]
async fn test_clean_bundle_skips_arbiter() {
    let pipeline = ScriptedPipeline::clean();
    let arbiter = Arc::new(ScriptedArbiter::replying("unused"));

    run_coordinator(&pipeline, arbiter.clone())
        .run(&[fakes::paper("p1"), fakes::paper("p2")])
        .await;

    assert_eq!(arbiter.call_count(), 0);
}
