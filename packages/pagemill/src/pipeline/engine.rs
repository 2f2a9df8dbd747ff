//! The Pipeline - main entry point for the lifecycle library.
//!
//! `Pipeline` fronts the four components over injected storage and
//! collaborator implementations: snapshot capture, definition training
//! and forking, dedup-safe execution, and the derived provenance queries
//! (see `provenance.rs`).
//!
//! Every operation is owner-scoped: entities that don't exist and
//! entities owned by someone else are both reported as `NotFound`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{BackendError, BackendResult, PipelineError, Result};
use crate::pipeline::drift;
use crate::pipeline::lease::{await_outcome, ExecOutcome, ExecutionLeases, Lease, LeaseGuard};
use crate::traits::{
    backend::{ExecuteRequest, ExtractionBackend, GenerateRequest},
    events::{EventSink, NullSink},
    store::CoreStore,
};
use crate::types::{
    DefinitionId, DomainEvent, DuplicatePolicy, ExtractionDefinition, ExtractionRun, FetchMeta,
    HtmlSnapshot, OwnerId, Page, PageId, Pagination, PipelineConfig, SnapshotId,
};

/// The extraction-pipeline lifecycle engine.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::new(MemoryStore::new(), PagentClient::from_env()?);
///
/// let page = pipeline.create_page(owner, "https://example.com/products").await?;
/// let snap = pipeline.create_snapshot(owner, page.id, html, meta).await?;
/// let def = pipeline.learn(owner, page.id, snap.id, "extract product titles").await?;
/// let run = pipeline.execute(owner, def.id, snap.id).await?;
/// ```
pub struct Pipeline<S: CoreStore, B: ExtractionBackend> {
    pub(crate) store: S,
    pub(crate) backend: B,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) config: PipelineConfig,
    leases: ExecutionLeases,
}

impl<S: CoreStore, B: ExtractionBackend> Pipeline<S, B> {
    /// Create a pipeline with default configuration and no event sink.
    pub fn new(store: S, backend: B) -> Self {
        Self {
            store,
            backend,
            events: Arc::new(NullSink),
            config: PipelineConfig::default(),
            leases: ExecutionLeases::new(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(store: S, backend: B, config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::new(store, backend)
        }
    }

    /// Attach an event sink for domain events.
    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Arc::new(sink);
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Register a new tracked page for `owner_id`.
    pub async fn create_page(&self, owner_id: OwnerId, url: impl Into<String>) -> Result<Page> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(PipelineError::invalid_input("page URL must not be empty"));
        }

        let page = Page::new(owner_id, url);
        self.store.insert_page(&page).await?;
        info!(page_id = %page.id, url = %page.url, "page created");
        Ok(page)
    }

    /// Delete a page and everything it owns.
    pub async fn delete_page(&self, owner_id: OwnerId, page_id: PageId) -> Result<()> {
        self.owned_page(owner_id, page_id).await?;
        self.store.delete_page(page_id).await?;
        info!(page_id = %page_id, "page deleted (cascade)");
        Ok(())
    }

    /// List pages for an owner, most-recent-first.
    pub async fn list_pages(&self, owner_id: OwnerId, pagination: &Pagination) -> Result<Vec<Page>> {
        self.store.list_pages(owner_id, pagination).await
    }

    // =========================================================================
    // Snapshot Store
    // =========================================================================

    /// Record an immutable snapshot of a page's HTML.
    pub async fn create_snapshot(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        html: impl Into<String>,
        meta: FetchMeta,
    ) -> Result<HtmlSnapshot> {
        self.owned_page(owner_id, page_id).await?;

        let html = html.into();
        if html.is_empty() {
            return Err(PipelineError::invalid_input(
                "snapshot HTML must not be empty",
            ));
        }

        let snapshot = HtmlSnapshot::new(page_id, html, meta);
        self.store.insert_snapshot(&snapshot).await?;
        debug!(
            snapshot_id = %snapshot.id,
            page_id = %page_id,
            content_hash = %snapshot.content_hash,
            "snapshot recorded"
        );
        self.events.publish(DomainEvent::SnapshotCreated {
            page_id,
            snapshot_id: snapshot.id,
        });
        Ok(snapshot)
    }

    /// Get a snapshot, scoped to a page.
    pub async fn get_snapshot(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        snapshot_id: SnapshotId,
    ) -> Result<HtmlSnapshot> {
        self.owned_page(owner_id, page_id).await?;
        match self.store.get_snapshot(snapshot_id).await? {
            Some(snapshot) if snapshot.page_id == page_id => Ok(snapshot),
            _ => Err(PipelineError::not_found("snapshot", snapshot_id)),
        }
    }

    /// List snapshots of a page, most-recent-first.
    pub async fn list_snapshots(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<HtmlSnapshot>> {
        self.owned_page(owner_id, page_id).await?;
        self.store.list_snapshots(page_id, pagination).await
    }

    // =========================================================================
    // Definition Registry
    // =========================================================================

    /// Train a new extraction definition on a snapshot.
    ///
    /// Invokes the generation collaborator exactly once. On success the
    /// definition is persisted `Ready`; on failure nothing is persisted
    /// and the caller observes `GenerationFailed` — there is never a row
    /// for a half-built recipe.
    pub async fn learn(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        snapshot_id: SnapshotId,
        goal: impl Into<String>,
    ) -> Result<ExtractionDefinition> {
        self.learn_with_cancellation(owner_id, page_id, snapshot_id, goal, CancellationToken::new())
            .await
    }

    /// `learn` with caller-controlled cancellation.
    pub async fn learn_with_cancellation(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        snapshot_id: SnapshotId,
        goal: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<ExtractionDefinition> {
        self.learn_inner(owner_id, page_id, snapshot_id, goal.into(), None, &cancel)
            .await
    }

    /// Fork a new definition from an existing one plus a refinement goal.
    ///
    /// The parent is untouched; the fork is trained against the parent's
    /// original snapshot with the composed goal.
    pub async fn retrain(
        &self,
        owner_id: OwnerId,
        definition_id: DefinitionId,
        refinement_goal: impl Into<String>,
    ) -> Result<ExtractionDefinition> {
        self.retrain_with_cancellation(
            owner_id,
            definition_id,
            refinement_goal,
            CancellationToken::new(),
        )
        .await
    }

    /// `retrain` with caller-controlled cancellation.
    pub async fn retrain_with_cancellation(
        &self,
        owner_id: OwnerId,
        definition_id: DefinitionId,
        refinement_goal: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<ExtractionDefinition> {
        let refinement = refinement_goal.into();
        if refinement.trim().is_empty() {
            return Err(PipelineError::invalid_input(
                "refinement goal must not be empty",
            ));
        }

        let (parent, _) = self.owned_definition(owner_id, definition_id).await?;
        if !parent.is_ready() {
            // An unfinished recipe cannot be refined; to the caller it is
            // indistinguishable from an absent one.
            return Err(PipelineError::not_found("definition", definition_id));
        }

        let composed = ExtractionDefinition::compose_goal(&parent.goal, &refinement);
        debug!(parent = %parent.id, "retraining definition");
        self.learn_inner(
            owner_id,
            parent.page_id,
            parent.snapshot_id,
            composed,
            Some((parent.id, refinement)),
            &cancel,
        )
        .await
    }

    /// Whether a definition has finished training successfully.
    pub async fn is_ready(&self, owner_id: OwnerId, definition_id: DefinitionId) -> Result<bool> {
        let (definition, _) = self.owned_definition(owner_id, definition_id).await?;
        Ok(definition.is_ready())
    }

    /// List definitions of a page, most-recent-first.
    pub async fn list_definitions(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionDefinition>> {
        self.owned_page(owner_id, page_id).await?;
        self.store.list_definitions(page_id, pagination).await
    }

    async fn learn_inner(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        snapshot_id: SnapshotId,
        goal: String,
        lineage: Option<(DefinitionId, String)>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionDefinition> {
        if goal.trim().is_empty() {
            return Err(PipelineError::invalid_input(
                "extraction goal must not be empty",
            ));
        }

        let page = self.owned_page(owner_id, page_id).await?;
        let snapshot = self.snapshot_of_page(owner_id, page_id, snapshot_id).await?;

        debug!(page_id = %page_id, snapshot_id = %snapshot_id, "generating extraction code");
        let request = GenerateRequest {
            url: page.url.clone(),
            html: snapshot.html.clone(),
            goal: goal.clone(),
        };
        let recipe = await_collaborator(
            self.backend.generate(request),
            self.config.generation_timeout,
            cancel,
            "generate",
        )
        .await?
        .map_err(|e| PipelineError::GenerationFailed {
            diagnostic: e.to_string(),
        })?;

        if recipe.code.trim().is_empty() {
            return Err(PipelineError::GenerationFailed {
                diagnostic: "generator returned empty extraction code".into(),
            });
        }

        let mut definition =
            ExtractionDefinition::ready(page_id, snapshot_id, goal, recipe.code, recipe.output_schema);
        if let Some((parent, refinement)) = lineage {
            definition = definition.with_lineage(parent, refinement);
        }
        self.store.insert_definition(&definition).await?;
        info!(
            definition_id = %definition.id,
            page_id = %page_id,
            retrained_from = ?definition.retrained_from,
            "definition ready"
        );
        self.events.publish(DomainEvent::DefinitionReady {
            page_id,
            definition_id: definition.id,
            retrained_from: definition.retrained_from,
        });
        Ok(definition)
    }

    // =========================================================================
    // Execution Engine
    // =========================================================================

    /// Execute a ready definition against a chosen snapshot.
    ///
    /// At most one execution for the same definition-snapshot pair runs
    /// concurrently; depending on the duplicate policy a second caller
    /// either shares the in-flight outcome or is rejected with
    /// `AlreadyRunning`. On collaborator failure no run is persisted and
    /// the caller may retry — retries are never automatic.
    pub async fn execute(
        &self,
        owner_id: OwnerId,
        definition_id: DefinitionId,
        snapshot_id: SnapshotId,
    ) -> Result<ExtractionRun> {
        self.execute_with_cancellation(owner_id, definition_id, snapshot_id, CancellationToken::new())
            .await
    }

    /// `execute` with caller-controlled cancellation. Cancelling releases
    /// the execution lease so a later attempt is not blocked.
    pub async fn execute_with_cancellation(
        &self,
        owner_id: OwnerId,
        definition_id: DefinitionId,
        snapshot_id: SnapshotId,
        cancel: CancellationToken,
    ) -> Result<ExtractionRun> {
        let (definition, page) = self.owned_definition(owner_id, definition_id).await?;
        if !definition.is_ready() {
            return Err(PipelineError::NotReady {
                id: definition_id.into_uuid(),
            });
        }

        let snapshot = self.store.get_snapshot(snapshot_id).await?;
        let snapshot = match snapshot {
            None => return Err(PipelineError::not_found("snapshot", snapshot_id)),
            Some(s) if s.page_id != definition.page_id => {
                // Same owner, wrong page is a usage error; anything the
                // owner can't see stays NotFound.
                return if self.owned_page(owner_id, s.page_id).await.is_ok() {
                    Err(PipelineError::CrossPageMismatch {
                        definition_id: definition_id.into_uuid(),
                        snapshot_id: snapshot_id.into_uuid(),
                    })
                } else {
                    Err(PipelineError::not_found("snapshot", snapshot_id))
                };
            }
            Some(s) => s,
        };

        match self.config.duplicate_policy {
            DuplicatePolicy::Reject => match self.leases.try_acquire(definition_id, snapshot_id) {
                Some(guard) => {
                    self.lead_execution(guard, &page, &definition, &snapshot, &cancel)
                        .await
                }
                None => Err(PipelineError::AlreadyRunning {
                    definition_id: definition_id.into_uuid(),
                    snapshot_id: snapshot_id.into_uuid(),
                }),
            },
            DuplicatePolicy::Wait => match self.leases.acquire(definition_id, snapshot_id) {
                Lease::Leader(guard) => {
                    self.lead_execution(guard, &page, &definition, &snapshot, &cancel)
                        .await
                }
                Lease::Follower(slot) => {
                    debug!(
                        definition_id = %definition_id,
                        snapshot_id = %snapshot_id,
                        "joining in-flight execution"
                    );
                    match await_outcome(slot).await {
                        ExecOutcome::Run(run) => Ok(run),
                        ExecOutcome::Failed(diagnostic) => {
                            Err(PipelineError::ExecutionFailed { diagnostic })
                        }
                        ExecOutcome::TimedOut { elapsed_ms } => Err(PipelineError::Timeout {
                            operation: "execute",
                            elapsed_ms,
                        }),
                        ExecOutcome::Cancelled => Err(PipelineError::Cancelled),
                    }
                }
            },
        }
    }

    /// List runs of a definition, most-recent-first.
    pub async fn list_runs(
        &self,
        owner_id: OwnerId,
        definition_id: DefinitionId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionRun>> {
        self.owned_definition(owner_id, definition_id).await?;
        self.store.list_runs(definition_id, pagination).await
    }

    /// Run the collaborator as lease leader and publish the outcome.
    async fn lead_execution(
        &self,
        guard: LeaseGuard,
        page: &Page,
        definition: &ExtractionDefinition,
        snapshot: &HtmlSnapshot,
        cancel: &CancellationToken,
    ) -> Result<ExtractionRun> {
        let result = self
            .run_collaborator(page, definition, snapshot, cancel)
            .await;
        match &result {
            Ok(run) => guard.complete(ExecOutcome::Run(run.clone())),
            Err(PipelineError::Timeout { elapsed_ms, .. }) => {
                guard.complete(ExecOutcome::TimedOut {
                    elapsed_ms: *elapsed_ms,
                })
            }
            Err(PipelineError::Cancelled) => guard.complete(ExecOutcome::Cancelled),
            Err(e) => guard.complete(ExecOutcome::Failed(e.to_string())),
        }
        result
    }

    async fn run_collaborator(
        &self,
        page: &Page,
        definition: &ExtractionDefinition,
        snapshot: &HtmlSnapshot,
        cancel: &CancellationToken,
    ) -> Result<ExtractionRun> {
        let request = ExecuteRequest {
            url: page.url.clone(),
            html: snapshot.html.clone(),
            goal: definition.goal.clone(),
            code: definition.code.clone(),
        };
        let output = await_collaborator(
            self.backend.execute(request),
            self.config.execution_timeout,
            cancel,
            "execute",
        )
        .await?
        .map_err(|e| PipelineError::ExecutionFailed {
            diagnostic: e.to_string(),
        })?;

        let drifted = definition
            .output_schema
            .as_ref()
            .map(|schema| drift::drift_against(schema, &output));

        let run = ExtractionRun::new(definition.id, snapshot.id, output, drifted);
        self.store.insert_run(&run).await?;
        info!(
            run_id = %run.id,
            definition_id = %definition.id,
            snapshot_id = %snapshot.id,
            drifted = ?drifted,
            "run persisted"
        );
        self.events.publish(DomainEvent::RunCompleted {
            definition_id: definition.id,
            snapshot_id: snapshot.id,
            run_id: run.id,
            drifted,
        });
        Ok(run)
    }

    // =========================================================================
    // Ownership resolution
    // =========================================================================

    /// Resolve a page the owner can see, or `NotFound`.
    pub(crate) async fn owned_page(&self, owner_id: OwnerId, page_id: PageId) -> Result<Page> {
        match self.store.get_page(page_id).await? {
            Some(page) if page.owner_id == owner_id => Ok(page),
            _ => Err(PipelineError::not_found("page", page_id)),
        }
    }

    /// Resolve a definition the owner can see, with its page.
    pub(crate) async fn owned_definition(
        &self,
        owner_id: OwnerId,
        definition_id: DefinitionId,
    ) -> Result<(ExtractionDefinition, Page)> {
        let Some(definition) = self.store.get_definition(definition_id).await? else {
            return Err(PipelineError::not_found("definition", definition_id));
        };
        let page = self
            .owned_page(owner_id, definition.page_id)
            .await
            .map_err(|_| PipelineError::not_found("definition", definition_id))?;
        Ok((definition, page))
    }

    /// Resolve a snapshot that must belong to the given (owned) page.
    ///
    /// A snapshot under a different page of the same owner is a usage
    /// error (`InvalidInput`); one the owner can't see is `NotFound`.
    pub(crate) async fn snapshot_of_page(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        snapshot_id: SnapshotId,
    ) -> Result<HtmlSnapshot> {
        let Some(snapshot) = self.store.get_snapshot(snapshot_id).await? else {
            return Err(PipelineError::not_found("snapshot", snapshot_id));
        };
        if snapshot.page_id != page_id {
            return if self.owned_page(owner_id, snapshot.page_id).await.is_ok() {
                Err(PipelineError::invalid_input(
                    "snapshot does not belong to the given page",
                ))
            } else {
                Err(PipelineError::not_found("snapshot", snapshot_id))
            };
        }
        Ok(snapshot)
    }
}

/// Await a collaborator call under an optional deadline and cancellation.
///
/// The outer error covers local aborts (`Timeout`, `Cancelled`); the
/// inner result is the collaborator's own verdict, mapped by the caller
/// so that learn and execute keep their distinct failure variants.
async fn await_collaborator<T>(
    fut: impl Future<Output = BackendResult<T>>,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
    operation: &'static str,
) -> Result<std::result::Result<T, BackendError>> {
    let call = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(res) => Ok(res),
                Err(_) => Err(PipelineError::Timeout {
                    operation,
                    elapsed_ms: limit.as_millis() as u64,
                }),
            },
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        res = call => res,
    }
}
