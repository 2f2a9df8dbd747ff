//! Extraction runs - one execution of a definition against a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DefinitionId, RunId, SnapshotId};

/// One execution of a definition against a chosen snapshot.
///
/// Runs are append-only: created once, never updated. Every run carries
/// an explicit definition reference in addition to the snapshot used —
/// the two must belong to the same page, which the execution engine
/// enforces at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRun {
    /// Unique identifier (time-ordered).
    pub id: RunId,

    /// The definition that was executed.
    pub definition_id: DefinitionId,

    /// The snapshot the definition ran against. Not necessarily the
    /// definition's training snapshot.
    pub snapshot_id: SnapshotId,

    /// Raw output payload from the execution collaborator, stored as-is.
    pub output: serde_json::Value,

    /// Whether the output shape drifted from the definition's declared
    /// schema. `None` when the definition declared no schema.
    pub drifted: Option<bool>,

    /// When the run completed.
    pub created_at: DateTime<Utc>,
}

impl ExtractionRun {
    /// Record a completed execution.
    pub fn new(
        definition_id: DefinitionId,
        snapshot_id: SnapshotId,
        output: serde_json::Value,
        drifted: Option<bool>,
    ) -> Self {
        Self {
            id: RunId::new(),
            definition_id,
            snapshot_id,
            output,
            drifted,
            created_at: Utc::now(),
        }
    }
}
