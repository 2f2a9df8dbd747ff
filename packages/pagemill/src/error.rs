//! Typed errors for the pipeline lifecycle.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Entity absent, or not owned by the caller.
    ///
    /// Ownership mismatches are reported as `NotFound` rather than a
    /// Forbidden-style error so that existence never leaks across owners.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// A required field was missing or malformed.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Definition has not finished training.
    #[error("definition not ready: {id}")]
    NotReady { id: Uuid },

    /// The generation collaborator failed; nothing was persisted.
    #[error("code generation failed: {diagnostic}")]
    GenerationFailed { diagnostic: String },

    /// The execution collaborator failed; nothing was persisted.
    #[error("execution failed: {diagnostic}")]
    ExecutionFailed { diagnostic: String },

    /// An execution for the same definition-snapshot pair is in flight.
    #[error("execution already running for definition {definition_id} against snapshot {snapshot_id}")]
    AlreadyRunning {
        definition_id: Uuid,
        snapshot_id: Uuid,
    },

    /// Deadline exceeded while waiting on a collaborator.
    #[error("timed out after {elapsed_ms}ms waiting on {operation}")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
    },

    /// Snapshot and definition belong to different pages.
    #[error("snapshot {snapshot_id} and definition {definition_id} belong to different pages")]
    CrossPageMismatch {
        definition_id: Uuid,
        snapshot_id: Uuid,
    },

    /// Operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Shorthand for a `NotFound` with a typed id.
    pub fn not_found(entity: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for an `InvalidInput` with a reason.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for a `Storage` error from any error value.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Errors produced by collaborator backends (generation, execution, fetch).
///
/// The pipeline maps these to `GenerationFailed` / `ExecutionFailed`,
/// attaching the collaborator's diagnostic text verbatim. No retries are
/// performed here or in the pipeline; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connection refused, DNS, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Collaborator returned a non-success HTTP status.
    #[error("collaborator returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("malformed collaborator response: {reason}")]
    MalformedResponse { reason: String },

    /// Collaborator reported an application-level error in its envelope.
    #[error("collaborator error: {diagnostic}")]
    Service { diagnostic: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for collaborator backends.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
