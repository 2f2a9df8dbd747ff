//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::traits::store::{DefinitionStore, PageStore, RunStore, SnapshotStore};
use crate::types::{
    DefinitionId, ExtractionDefinition, ExtractionRun, HtmlSnapshot, OwnerId, Page, PageId,
    Pagination, RunId, SnapshotId,
};

/// In-memory storage for the full lifecycle.
///
/// Useful for testing and development. Not suitable for production as
/// data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    pages: RwLock<HashMap<PageId, Page>>,
    snapshots: RwLock<HashMap<SnapshotId, HtmlSnapshot>>,
    definitions: RwLock<HashMap<DefinitionId, ExtractionDefinition>>,
    runs: RwLock<HashMap<RunId, ExtractionRun>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.pages.write().unwrap().clear();
        self.snapshots.write().unwrap().clear();
        self.definitions.write().unwrap().clear();
        self.runs.write().unwrap().clear();
    }

    /// Number of stored pages.
    pub fn page_count(&self) -> usize {
        self.pages.read().unwrap().len()
    }

    /// Number of stored snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().unwrap().len()
    }

    /// Number of stored definitions.
    pub fn definition_count(&self) -> usize {
        self.definitions.read().unwrap().len()
    }

    /// Number of stored runs.
    pub fn run_count(&self) -> usize {
        self.runs.read().unwrap().len()
    }
}

/// Order most-recent-first, apply the cursor, truncate to the limit.
fn paginate<T>(mut items: Vec<T>, pagination: &Pagination, id_of: impl Fn(&T) -> Uuid) -> Vec<T> {
    if let Some(before) = pagination.before {
        items.retain(|item| id_of(item) < before);
    }
    items.sort_by(|a, b| id_of(b).cmp(&id_of(a)));
    items.truncate(pagination.limit);
    items
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn insert_page(&self, page: &Page) -> Result<()> {
        self.pages.write().unwrap().insert(page.id, page.clone());
        Ok(())
    }

    async fn get_page(&self, id: PageId) -> Result<Option<Page>> {
        Ok(self.pages.read().unwrap().get(&id).cloned())
    }

    async fn list_pages(&self, owner_id: OwnerId, pagination: &Pagination) -> Result<Vec<Page>> {
        let pages: Vec<_> = self
            .pages
            .read()
            .unwrap()
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(paginate(pages, pagination, |p| p.id.into_uuid()))
    }

    async fn delete_page(&self, id: PageId) -> Result<bool> {
        let existed = self.pages.write().unwrap().remove(&id).is_some();
        if !existed {
            return Ok(false);
        }

        let removed_snapshots: Vec<SnapshotId> = {
            let mut snapshots = self.snapshots.write().unwrap();
            let ids: Vec<_> = snapshots
                .values()
                .filter(|s| s.page_id == id)
                .map(|s| s.id)
                .collect();
            for sid in &ids {
                snapshots.remove(sid);
            }
            ids
        };

        let removed_definitions: Vec<DefinitionId> = {
            let mut definitions = self.definitions.write().unwrap();
            let ids: Vec<_> = definitions
                .values()
                .filter(|d| d.page_id == id)
                .map(|d| d.id)
                .collect();
            for did in &ids {
                definitions.remove(did);
            }
            ids
        };

        // Runs are owned jointly by definition and snapshot; losing either
        // side removes the run.
        self.runs.write().unwrap().retain(|_, run| {
            !removed_definitions.contains(&run.definition_id)
                && !removed_snapshots.contains(&run.snapshot_id)
        });

        Ok(true)
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn insert_snapshot(&self, snapshot: &HtmlSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .unwrap()
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<HtmlSnapshot>> {
        Ok(self.snapshots.read().unwrap().get(&id).cloned())
    }

    async fn list_snapshots(
        &self,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<HtmlSnapshot>> {
        let snapshots: Vec<_> = self
            .snapshots
            .read()
            .unwrap()
            .values()
            .filter(|s| s.page_id == page_id)
            .cloned()
            .collect();
        Ok(paginate(snapshots, pagination, |s| s.id.into_uuid()))
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn insert_definition(&self, definition: &ExtractionDefinition) -> Result<()> {
        self.definitions
            .write()
            .unwrap()
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<ExtractionDefinition>> {
        Ok(self.definitions.read().unwrap().get(&id).cloned())
    }

    async fn list_definitions(
        &self,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionDefinition>> {
        let definitions: Vec<_> = self
            .definitions
            .read()
            .unwrap()
            .values()
            .filter(|d| d.page_id == page_id)
            .cloned()
            .collect();
        Ok(paginate(definitions, pagination, |d| d.id.into_uuid()))
    }

    async fn definitions_for_snapshot(
        &self,
        snapshot_id: SnapshotId,
    ) -> Result<Vec<ExtractionDefinition>> {
        let mut definitions: Vec<_> = self
            .definitions
            .read()
            .unwrap()
            .values()
            .filter(|d| d.snapshot_id == snapshot_id)
            .cloned()
            .collect();
        definitions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(definitions)
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert_run(&self, run: &ExtractionRun) -> Result<()> {
        self.runs.write().unwrap().insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: RunId) -> Result<Option<ExtractionRun>> {
        Ok(self.runs.read().unwrap().get(&id).cloned())
    }

    async fn list_runs(
        &self,
        definition_id: DefinitionId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionRun>> {
        let runs: Vec<_> = self
            .runs
            .read()
            .unwrap()
            .values()
            .filter(|r| r.definition_id == definition_id)
            .cloned()
            .collect();
        Ok(paginate(runs, pagination, |r| r.id.into_uuid()))
    }

    async fn drifted_runs(
        &self,
        page_id: PageId,
        pagination: &Pagination,
    ) -> Result<Vec<ExtractionRun>> {
        let page_definitions: Vec<DefinitionId> = self
            .definitions
            .read()
            .unwrap()
            .values()
            .filter(|d| d.page_id == page_id)
            .map(|d| d.id)
            .collect();

        let runs: Vec<_> = self
            .runs
            .read()
            .unwrap()
            .values()
            .filter(|r| r.drifted == Some(true) && page_definitions.contains(&r.definition_id))
            .cloned()
            .collect();
        Ok(paginate(runs, pagination, |r| r.id.into_uuid()))
    }
}
