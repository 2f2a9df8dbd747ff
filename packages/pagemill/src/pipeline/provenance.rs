//! Provenance queries - lineage and drift reporting.
//!
//! Derived read-side views over the stores. Nothing here is a source of
//! truth: every answer is recomputed from pages, snapshots, definitions,
//! and runs, and is therefore rebuildable at any time.

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::traits::{backend::ExtractionBackend, store::CoreStore};
use crate::types::{
    ExtractionDefinition, ExtractionRun, HtmlSnapshot, OwnerId, Page, PageId, Pagination, RunId,
    SnapshotId,
};

use super::engine::Pipeline;

/// The full chain from a run back to what produced it.
#[derive(Debug, Clone)]
pub struct Lineage {
    /// The run itself.
    pub run: ExtractionRun,

    /// The definition that was executed.
    pub definition: ExtractionDefinition,

    /// The snapshot it ran against.
    pub snapshot: HtmlSnapshot,

    /// The page both belong to.
    pub page: Page,
}

impl<S: CoreStore, B: ExtractionBackend> Pipeline<S, B> {
    /// Trace a run back to its definition, snapshot, and page.
    pub async fn lineage_of(&self, owner_id: OwnerId, run_id: RunId) -> Result<Lineage> {
        let not_found = || PipelineError::not_found("run", run_id);

        let run = self.store.get_run(run_id).await?.ok_or_else(not_found)?;
        let definition = self
            .store
            .get_definition(run.definition_id)
            .await?
            .ok_or_else(not_found)?;
        let page = self
            .owned_page(owner_id, definition.page_id)
            .await
            .map_err(|_| not_found())?;
        let snapshot = self
            .store
            .get_snapshot(run.snapshot_id)
            .await?
            .ok_or_else(not_found)?;

        Ok(Lineage {
            run,
            definition,
            snapshot,
            page,
        })
    }

    /// All definitions trained on a snapshot, most-recent-first.
    pub async fn definitions_for_snapshot(
        &self,
        owner_id: OwnerId,
        snapshot_id: SnapshotId,
    ) -> Result<Vec<ExtractionDefinition>> {
        let Some(snapshot) = self.store.get_snapshot(snapshot_id).await? else {
            return Err(PipelineError::not_found("snapshot", snapshot_id));
        };
        self.owned_page(owner_id, snapshot.page_id)
            .await
            .map_err(|_| PipelineError::not_found("snapshot", snapshot_id))?;

        self.store.definitions_for_snapshot(snapshot_id).await
    }

    /// Runs of a page whose output drifted from the declared schema,
    /// most-recent-first. The "this extraction may need retraining"
    /// signal.
    pub async fn drift_report(
        &self,
        owner_id: OwnerId,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionRun>> {
        self.owned_page(owner_id, page_id).await?;
        let drifted = self.store.drifted_runs(page_id, pagination).await?;
        debug!(page_id = %page_id, drifted = drifted.len(), "drift report");
        Ok(drifted)
    }
}
