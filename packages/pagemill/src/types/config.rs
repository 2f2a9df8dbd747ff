//! Pipeline configuration.

use std::time::Duration;

/// What to do when an execution for the same definition-snapshot pair is
/// already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Wait for the in-flight execution and share its outcome. Preferred:
    /// both callers observe a result, and no duplicate collaborator call
    /// is made.
    #[default]
    Wait,

    /// Reject the second caller with `AlreadyRunning`.
    Reject,
}

/// Tunable pipeline behavior.
///
/// Collaborator calls run on the order of tens of seconds; the deadlines
/// here bound how long `learn` and `execute` wait before surfacing
/// `Timeout`. `None` means wait indefinitely (callers can still cancel).
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Deadline for the generation collaborator during `learn`/`retrain`.
    pub generation_timeout: Option<Duration>,

    /// Deadline for the execution collaborator during `execute`.
    pub execution_timeout: Option<Duration>,

    /// Behavior for concurrent duplicate executions.
    pub duplicate_policy: DuplicatePolicy,
}

impl PipelineConfig {
    /// Set the generation deadline.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = Some(timeout);
        self
    }

    /// Set the execution deadline.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    /// Set the duplicate-execution policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}
