//! Domain events published by the pipeline.
//!
//! Events are a side channel for observers (UIs, change feeds); pipeline
//! correctness never depends on any subscriber being present.

use serde::{Deserialize, Serialize};

use super::ids::{DefinitionId, PageId, RunId, SnapshotId};

/// An event describing a completed state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A new snapshot was recorded for a page.
    SnapshotCreated {
        page_id: PageId,
        snapshot_id: SnapshotId,
    },

    /// A definition finished training and is ready to execute.
    DefinitionReady {
        page_id: PageId,
        definition_id: DefinitionId,
        retrained_from: Option<DefinitionId>,
    },

    /// An execution completed and its run was persisted.
    RunCompleted {
        definition_id: DefinitionId,
        snapshot_id: SnapshotId,
        run_id: RunId,
        drifted: Option<bool>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DomainEvent::SnapshotCreated {
            page_id: PageId::new(),
            snapshot_id: SnapshotId::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "snapshot_created");
    }
}
