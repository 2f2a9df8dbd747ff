//! Integration tests for the full pipeline lifecycle:
//! capture → learn → execute → provenance, plus the concurrency and
//! failure-isolation contracts.

use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use pagemill::testing::MockBackend;
use pagemill::{
    DuplicatePolicy, ExtractionDefinition, FetchMeta, HtmlSnapshot, MemoryStore, OwnerId, Page,
    Pagination, Pipeline, PipelineConfig, PipelineError, TrainingState,
};

fn pipeline() -> (Pipeline<MemoryStore, MockBackend>, MockBackend, OwnerId) {
    let backend = MockBackend::new();
    let pipeline = Pipeline::new(MemoryStore::new(), backend.clone());
    (pipeline, backend, OwnerId::new())
}

fn pipeline_with_config(
    backend: MockBackend,
    config: PipelineConfig,
) -> (Pipeline<MemoryStore, MockBackend>, OwnerId) {
    (
        Pipeline::with_config(MemoryStore::new(), backend, config),
        OwnerId::new(),
    )
}

async fn seeded_page(
    pipeline: &Pipeline<MemoryStore, MockBackend>,
    owner: OwnerId,
) -> (Page, HtmlSnapshot) {
    let page = pipeline
        .create_page(owner, "https://example.com/products")
        .await
        .unwrap();
    let snapshot = pipeline
        .create_snapshot(owner, page.id, "<html>A</html>", FetchMeta::default())
        .await
        .unwrap();
    (page, snapshot)
}

// ============================================================================
// Snapshot Store
// ============================================================================

#[tokio::test]
async fn snapshot_round_trips_byte_identical() {
    let (pipeline, _, owner) = pipeline();
    let page = pipeline.create_page(owner, "https://example.com").await.unwrap();

    let html = "<html><body>caf\u{e9} \u{2603}</body></html>";
    let created = pipeline
        .create_snapshot(owner, page.id, html, FetchMeta::for_body(html))
        .await
        .unwrap();

    let fetched = pipeline
        .get_snapshot(owner, page.id, created.id)
        .await
        .unwrap();
    assert_eq!(fetched.html, html);
    assert_eq!(fetched.content_hash, created.content_hash);
}

#[tokio::test]
async fn empty_html_is_rejected() {
    let (pipeline, _, owner) = pipeline();
    let page = pipeline.create_page(owner, "https://example.com").await.unwrap();

    let err = pipeline
        .create_snapshot(owner, page.id, "", FetchMeta::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput { .. }));
}

#[tokio::test]
async fn deleting_a_page_cascades() {
    let (pipeline, _, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();
    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();

    pipeline.delete_page(owner, page.id).await.unwrap();

    assert!(matches!(
        pipeline.get_snapshot(owner, page.id, snapshot.id).await,
        Err(PipelineError::NotFound { .. })
    ));
    assert!(matches!(
        pipeline.is_ready(owner, definition.id).await,
        Err(PipelineError::NotFound { .. })
    ));
    assert!(matches!(
        pipeline.lineage_of(owner, run.id).await,
        Err(PipelineError::NotFound { .. })
    ));
}

// ============================================================================
// Definition Registry
// ============================================================================

#[tokio::test]
async fn learn_resolves_to_ready_or_nothing() {
    let (pipeline, backend, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    backend.fail_generation("model unavailable");
    let err = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap_err();
    match err {
        PipelineError::GenerationFailed { diagnostic } => {
            assert!(diagnostic.contains("model unavailable"));
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
    // No zombie row: the definition list is unchanged.
    let definitions = pipeline
        .list_definitions(owner, page.id, &Pagination::first_page())
        .await
        .unwrap();
    assert!(definitions.is_empty());

    backend.clear_failures();
    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();
    assert_eq!(definition.state, TrainingState::Ready);
    assert!(pipeline.is_ready(owner, definition.id).await.unwrap());
}

#[tokio::test]
async fn retrain_forks_without_touching_the_parent() {
    let (pipeline, _, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let parent = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();
    let fork = pipeline
        .retrain(owner, parent.id, "also extract price")
        .await
        .unwrap();

    assert_ne!(fork.id, parent.id);
    assert_eq!(fork.page_id, parent.page_id);
    assert_eq!(fork.snapshot_id, parent.snapshot_id);
    assert_eq!(fork.retrained_from, Some(parent.id));
    assert!(fork.goal.contains("extract title"));
    assert!(fork.goal.contains("also extract price"));

    // Parent untouched.
    let lineage_parent = pipeline
        .definitions_for_snapshot(owner, snapshot.id)
        .await
        .unwrap()
        .into_iter()
        .find(|d| d.id == parent.id)
        .unwrap();
    assert_eq!(lineage_parent.code, parent.code);
    assert_eq!(lineage_parent.goal, parent.goal);
    assert_eq!(lineage_parent.output_schema, parent.output_schema);
}

#[tokio::test]
async fn retrain_of_unfinished_definition_is_not_found() {
    let (pipeline, _, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let pending = ExtractionDefinition {
        state: TrainingState::PendingTraining,
        ..ExtractionDefinition::ready(page.id, snapshot.id, "goal", "code", None)
    };
    pagemill::DefinitionStore::insert_definition(pipeline.store(), &pending)
        .await
        .unwrap();

    assert!(matches!(
        pipeline.retrain(owner, pending.id, "refine").await,
        Err(PipelineError::NotFound { .. })
    ));
}

// ============================================================================
// Execution Engine
// ============================================================================

#[tokio::test]
async fn concurrent_executions_share_one_collaborator_call() {
    let backend = MockBackend::new().with_execute_delay(Duration::from_millis(100));
    let (pipeline, owner) = pipeline_with_config(backend.clone(), PipelineConfig::default());
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        pipeline.execute(owner, definition.id, snapshot.id),
        pipeline.execute(owner, definition.id, snapshot.id),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.id, b.id, "both callers observe the same run");
    assert_eq!(backend.execute_calls(), 1, "no duplicate collaborator call");
    assert_eq!(pipeline.store().run_count(), 1);

    // Sequential re-runs are independent new records.
    let c = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();
    assert_ne!(c.id, a.id);
    assert_eq!(pipeline.store().run_count(), 2);
}

#[tokio::test]
async fn reject_policy_surfaces_already_running() {
    let backend = MockBackend::new().with_execute_delay(Duration::from_millis(100));
    let config = PipelineConfig::default().with_duplicate_policy(DuplicatePolicy::Reject);
    let (pipeline, owner) = pipeline_with_config(backend, config);
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        pipeline.execute(owner, definition.id, snapshot.id),
        pipeline.execute(owner, definition.id, snapshot.id),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(PipelineError::AlreadyRunning { .. }))));
}

#[tokio::test]
async fn execute_of_pending_definition_never_calls_the_collaborator() {
    let (pipeline, backend, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let pending = ExtractionDefinition {
        state: TrainingState::PendingTraining,
        ..ExtractionDefinition::ready(page.id, snapshot.id, "goal", "code", None)
    };
    pagemill::DefinitionStore::insert_definition(pipeline.store(), &pending)
        .await
        .unwrap();

    assert!(matches!(
        pipeline.execute(owner, pending.id, snapshot.id).await,
        Err(PipelineError::NotReady { .. })
    ));
    assert_eq!(backend.execute_calls(), 0);
}

#[tokio::test]
async fn cross_page_execute_fails_before_any_collaborator_call() {
    let (pipeline, backend, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let other_page = pipeline
        .create_page(owner, "https://example.com/other")
        .await
        .unwrap();
    let other_snapshot = pipeline
        .create_snapshot(owner, other_page.id, "<html>B</html>", FetchMeta::default())
        .await
        .unwrap();

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();

    assert!(matches!(
        pipeline.execute(owner, definition.id, other_snapshot.id).await,
        Err(PipelineError::CrossPageMismatch { .. })
    ));
    assert_eq!(backend.execute_calls(), 0);
}

#[tokio::test]
async fn failed_execution_leaves_run_history_unchanged() {
    let (pipeline, backend, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();

    backend.fail_execution("sandbox crashed");
    let err = pipeline
        .execute(owner, definition.id, snapshot.id)
        .await
        .unwrap_err();
    match err {
        PipelineError::ExecutionFailed { diagnostic } => {
            assert!(diagnostic.contains("sandbox crashed"));
        }
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }

    let runs = pipeline
        .list_runs(owner, definition.id, &Pagination::first_page())
        .await
        .unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn execution_deadline_surfaces_timeout_and_persists_nothing() {
    let backend = MockBackend::new().with_execute_delay(Duration::from_millis(200));
    let config = PipelineConfig::default().with_execution_timeout(Duration::from_millis(20));
    let (pipeline, owner) = pipeline_with_config(backend, config);
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();

    assert!(matches!(
        pipeline.execute(owner, definition.id, snapshot.id).await,
        Err(PipelineError::Timeout { .. })
    ));
    assert_eq!(pipeline.store().run_count(), 0);
}

#[tokio::test]
async fn cancellation_releases_the_lease() {
    let backend = MockBackend::new().with_execute_delay(Duration::from_millis(200));
    let (pipeline, owner) = pipeline_with_config(backend, PipelineConfig::default());
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    let (result, _) = tokio::join!(
        pipeline.execute_with_cancellation(owner, definition.id, snapshot.id, token),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        }
    );
    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(pipeline.store().run_count(), 0);

    // The pair is executable again: the lease was released on cancellation.
    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();
    assert_eq!(run.definition_id, definition.id);
}

// ============================================================================
// Drift
// ============================================================================

#[tokio::test]
async fn drift_is_flagged_when_declared_fields_go_missing() {
    let backend = MockBackend::new()
        .with_schema("extract listing", json!({"title": {}, "price": {}}))
        .with_output("extract listing", json!({"title": "x"}));
    let (pipeline, owner) = pipeline_with_config(backend, PipelineConfig::default());
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract listing")
        .await
        .unwrap();
    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();
    assert_eq!(run.drifted, Some(true));

    let report = pipeline
        .drift_report(owner, page.id, &Pagination::first_page())
        .await
        .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].id, run.id);
}

#[tokio::test]
async fn identical_shape_is_not_drift() {
    let backend = MockBackend::new()
        .with_schema("extract listing", json!({"title": {}, "price": {}}))
        .with_output("extract listing", json!({"title": "x", "price": 9.99}));
    let (pipeline, owner) = pipeline_with_config(backend, PipelineConfig::default());
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract listing")
        .await
        .unwrap();
    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();
    assert_eq!(run.drifted, Some(false));

    let report = pipeline
        .drift_report(owner, page.id, &Pagination::first_page())
        .await
        .unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn schemaless_definitions_never_report_drift() {
    let (pipeline, _, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;

    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();
    assert!(definition.output_schema.is_none());

    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();
    assert_eq!(run.drifted, None);
}

// ============================================================================
// Ownership boundary
// ============================================================================

#[tokio::test]
async fn cross_owner_access_is_not_found() {
    let (pipeline, _, owner) = pipeline();
    let (page, snapshot) = seeded_page(&pipeline, owner).await;
    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();
    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();

    let stranger = OwnerId::new();
    assert!(matches!(
        pipeline.get_snapshot(stranger, page.id, snapshot.id).await,
        Err(PipelineError::NotFound { .. })
    ));
    assert!(matches!(
        pipeline.learn(stranger, page.id, snapshot.id, "goal").await,
        Err(PipelineError::NotFound { .. })
    ));
    assert!(matches!(
        pipeline.execute(stranger, definition.id, snapshot.id).await,
        Err(PipelineError::NotFound { .. })
    ));
    assert!(matches!(
        pipeline.lineage_of(stranger, run.id).await,
        Err(PipelineError::NotFound { .. })
    ));
    assert!(matches!(
        pipeline.delete_page(stranger, page.id).await,
        Err(PipelineError::NotFound { .. })
    ));
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn lifecycle_publishes_domain_events() {
    use pagemill::{BroadcastSink, DomainEvent};

    let sink = BroadcastSink::new();
    let mut events = sink.subscribe();
    let pipeline =
        Pipeline::new(MemoryStore::new(), MockBackend::new()).with_events(sink.clone());
    let owner = OwnerId::new();

    let (page, snapshot) = seeded_page(&pipeline, owner).await;
    let definition = pipeline
        .learn(owner, page.id, snapshot.id, "extract title")
        .await
        .unwrap();
    let run = pipeline.execute(owner, definition.id, snapshot.id).await.unwrap();

    match events.recv().await.unwrap() {
        DomainEvent::SnapshotCreated { snapshot_id, .. } => assert_eq!(snapshot_id, snapshot.id),
        other => panic!("expected SnapshotCreated, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        DomainEvent::DefinitionReady { definition_id, .. } => {
            assert_eq!(definition_id, definition.id)
        }
        other => panic!("expected DefinitionReady, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        DomainEvent::RunCompleted { run_id, .. } => assert_eq!(run_id, run.id),
        other => panic!("expected RunCompleted, got {other:?}"),
    }
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[tokio::test]
async fn full_lifecycle_scenario() {
    let (pipeline, _, owner) = pipeline();

    let page = pipeline.create_page(owner, "https://example.com").await.unwrap();
    let s1 = pipeline
        .create_snapshot(owner, page.id, "<html>A</html>", FetchMeta::default())
        .await
        .unwrap();

    let d1 = pipeline
        .learn(owner, page.id, s1.id, "extract title")
        .await
        .unwrap();
    assert_eq!(d1.state, TrainingState::Ready);

    let r1 = pipeline.execute(owner, d1.id, s1.id).await.unwrap();
    assert_eq!(r1.definition_id, d1.id);
    assert_eq!(r1.snapshot_id, s1.id);

    let d2 = pipeline
        .retrain(owner, d1.id, "also extract price")
        .await
        .unwrap();
    assert_ne!(d2.id, d1.id);
    assert_eq!(d2.snapshot_id, s1.id);

    let r2 = pipeline.execute(owner, d2.id, s1.id).await.unwrap();
    assert_eq!(r2.definition_id, d2.id);

    // D1 and R1 remain unchanged.
    let lineage = pipeline.lineage_of(owner, r1.id).await.unwrap();
    assert_eq!(lineage.definition.id, d1.id);
    assert_eq!(lineage.definition.code, d1.code);
    assert_eq!(lineage.snapshot.id, s1.id);
    assert_eq!(lineage.page.id, page.id);

    let trained_here = pipeline.definitions_for_snapshot(owner, s1.id).await.unwrap();
    let ids: Vec<_> = trained_here.iter().map(|d| d.id).collect();
    assert!(ids.contains(&d1.id) && ids.contains(&d2.id));
}
