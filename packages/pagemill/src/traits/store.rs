//! Storage traits for pages, snapshots, definitions, and runs.
//!
//! The storage layer is split into focused traits:
//! - `PageStore`: tracked pages and the cascade delete
//! - `SnapshotStore`: immutable HTML captures
//! - `DefinitionStore`: extraction definitions
//! - `RunStore`: append-only execution records
//! - `CoreStore`: composite trait combining all four
//!
//! Stores are dumb CRUD: ownership checks and invariant enforcement live
//! in the pipeline, which is the only writer. Every listing is
//! most-recent-first (IDs are time-ordered v7).

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    DefinitionId, ExtractionDefinition, ExtractionRun, HtmlSnapshot, OwnerId, Page, PageId,
    Pagination, RunId, SnapshotId,
};

/// Store for tracked pages.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Persist a new page.
    async fn insert_page(&self, page: &Page) -> Result<()>;

    /// Get a page by ID.
    async fn get_page(&self, id: PageId) -> Result<Option<Page>>;

    /// List pages for an owner.
    async fn list_pages(&self, owner_id: OwnerId, pagination: &Pagination) -> Result<Vec<Page>>;

    /// Delete a page and everything it owns: snapshots, definitions, and
    /// the runs referencing either. Returns whether a page was deleted.
    async fn delete_page(&self, id: PageId) -> Result<bool>;
}

/// Store for immutable HTML snapshots.
///
/// There is deliberately no update operation — HTML is a historical fact.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a new snapshot (append-only).
    async fn insert_snapshot(&self, snapshot: &HtmlSnapshot) -> Result<()>;

    /// Get a snapshot by ID.
    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<HtmlSnapshot>>;

    /// List snapshots of a page, most-recent-first.
    async fn list_snapshots(
        &self,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<HtmlSnapshot>>;
}

/// Store for extraction definitions.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Persist a new definition.
    async fn insert_definition(&self, definition: &ExtractionDefinition) -> Result<()>;

    /// Get a definition by ID.
    async fn get_definition(&self, id: DefinitionId) -> Result<Option<ExtractionDefinition>>;

    /// List definitions of a page, most-recent-first.
    async fn list_definitions(
        &self,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionDefinition>>;

    /// All definitions trained on the given snapshot.
    async fn definitions_for_snapshot(
        &self,
        snapshot_id: SnapshotId,
    ) -> Result<Vec<ExtractionDefinition>>;
}

/// Store for append-only execution records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a new run (append-only).
    async fn insert_run(&self, run: &ExtractionRun) -> Result<()>;

    /// Get a run by ID.
    async fn get_run(&self, id: RunId) -> Result<Option<ExtractionRun>>;

    /// List runs of a definition, most-recent-first.
    async fn list_runs(
        &self,
        definition_id: DefinitionId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionRun>>;

    /// Runs of a page flagged `drifted = true`, most-recent-first.
    async fn drifted_runs(
        &self,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionRun>>;
}

/// Composite storage trait used by the pipeline.
pub trait CoreStore: PageStore + SnapshotStore + DefinitionStore + RunStore {}

// Blanket implementation: anything implementing all four traits is a CoreStore
impl<T: PageStore + SnapshotStore + DefinitionStore + RunStore> CoreStore for T {}
