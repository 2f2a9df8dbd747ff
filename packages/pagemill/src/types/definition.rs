//! Extraction definitions - goal-bound, generated extraction recipes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DefinitionId, PageId, SnapshotId};

/// Training lifecycle of a definition.
///
/// `PendingTraining → Ready` on successful code generation, or
/// `PendingTraining → Failed` on a generation error. Terminal states are
/// `Ready` and `Failed`; there is no retry transition — improving a
/// definition forks a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    PendingTraining,
    Ready,
    Failed,
}

impl TrainingState {
    /// Stable string form, used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingTraining => "pending_training",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_training" => Some(Self::PendingTraining),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An extraction recipe: goal + generated code + declared output schema.
///
/// Bound to the snapshot it was trained on. The `(code, output_schema)`
/// pair is immutable once the definition is `Ready`; refinement always
/// creates a new definition (see `retrained_from`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionDefinition {
    /// Unique identifier (time-ordered).
    pub id: DefinitionId,

    /// Owning page.
    pub page_id: PageId,

    /// The snapshot this definition was trained on.
    pub snapshot_id: SnapshotId,

    /// Free-text extraction goal. For retrained definitions this is the
    /// parent goal composed with the refinement text.
    pub goal: String,

    /// Generated executable extraction code. Opaque to the core; only
    /// the execution collaborator interprets it.
    pub code: String,

    /// Declared output schema, if the generator produced one. Advisory:
    /// used for drift reporting, never for validation-based rejection.
    pub output_schema: Option<serde_json::Value>,

    /// Training lifecycle state.
    pub state: TrainingState,

    /// The definition this one was forked from, for retrained definitions.
    pub retrained_from: Option<DefinitionId>,

    /// The refinement text that produced this fork.
    pub refinement_goal: Option<String>,

    /// When the definition was created.
    pub created_at: DateTime<Utc>,
}

impl ExtractionDefinition {
    /// Create a `Ready` definition from a successful generation.
    pub fn ready(
        page_id: PageId,
        snapshot_id: SnapshotId,
        goal: impl Into<String>,
        code: impl Into<String>,
        output_schema: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: DefinitionId::new(),
            page_id,
            snapshot_id,
            goal: goal.into(),
            code: code.into(),
            output_schema,
            state: TrainingState::Ready,
            retrained_from: None,
            refinement_goal: None,
            created_at: Utc::now(),
        }
    }

    /// Record the fork lineage of a retrained definition.
    pub fn with_lineage(
        mut self,
        parent: DefinitionId,
        refinement_goal: impl Into<String>,
    ) -> Self {
        self.retrained_from = Some(parent);
        self.refinement_goal = Some(refinement_goal.into());
        self
    }

    /// Whether the definition has finished training successfully.
    pub fn is_ready(&self) -> bool {
        self.state == TrainingState::Ready
    }

    /// Compose a parent goal with a refinement for retraining.
    pub fn compose_goal(parent_goal: &str, refinement: &str) -> String {
        format!("{parent_goal}\n\nRefinement: {refinement}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_state_round_trips() {
        for state in [
            TrainingState::PendingTraining,
            TrainingState::Ready,
            TrainingState::Failed,
        ] {
            assert_eq!(TrainingState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TrainingState::parse("unknown"), None);
    }

    #[test]
    fn composed_goal_keeps_parent_text() {
        let composed = ExtractionDefinition::compose_goal("extract title", "also extract price");
        assert!(composed.starts_with("extract title"));
        assert!(composed.contains("also extract price"));
    }
}
