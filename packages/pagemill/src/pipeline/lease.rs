//! Execution leases: single-flight deduplication per definition-snapshot pair.
//!
//! The invariant: for a fixed `(definition, snapshot)` pair, at most one
//! collaborator execution is in flight at any moment. The first caller
//! becomes the *leader* and performs the call; callers arriving while it
//! runs become *followers* and share the leader's outcome over a watch
//! channel. Release is RAII — dropping the guard publishes an outcome
//! (or `Cancelled` if none was set) and frees the key on every exit
//! path, so a cancelled or panicked execution never blocks later ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use uuid::Uuid;

use crate::types::{DefinitionId, ExtractionRun, SnapshotId};

type LeaseKey = (Uuid, Uuid);

/// Terminal outcome of an in-flight execution, shared with followers.
#[derive(Debug, Clone)]
pub(crate) enum ExecOutcome {
    /// The leader persisted this run.
    Run(ExtractionRun),

    /// The leader's collaborator call (or persist) failed.
    Failed(String),

    /// The leader hit its deadline.
    TimedOut { elapsed_ms: u64 },

    /// The leader was cancelled (or dropped without publishing).
    Cancelled,
}

type Slot = watch::Receiver<Option<ExecOutcome>>;

/// Map of in-flight executions.
#[derive(Default)]
pub(crate) struct ExecutionLeases {
    inflight: Arc<Mutex<HashMap<LeaseKey, Slot>>>,
}

/// Result of an acquisition attempt in wait mode.
pub(crate) enum Lease {
    /// This caller executes and must publish the outcome via the guard.
    Leader(LeaseGuard),

    /// Another execution is in flight; await its outcome.
    Follower(Slot),
}

impl ExecutionLeases {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn key(definition_id: DefinitionId, snapshot_id: SnapshotId) -> LeaseKey {
        (definition_id.into_uuid(), snapshot_id.into_uuid())
    }

    /// Acquire the lease, joining an in-flight execution if one exists.
    pub(crate) fn acquire(&self, definition_id: DefinitionId, snapshot_id: SnapshotId) -> Lease {
        let key = Self::key(definition_id, snapshot_id);
        let mut inflight = self.inflight.lock().unwrap();
        if let Some(rx) = inflight.get(&key) {
            return Lease::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(key, rx);
        Lease::Leader(LeaseGuard {
            key,
            tx,
            inflight: Arc::clone(&self.inflight),
        })
    }

    /// Acquire the lease only if no execution is in flight.
    pub(crate) fn try_acquire(
        &self,
        definition_id: DefinitionId,
        snapshot_id: SnapshotId,
    ) -> Option<LeaseGuard> {
        match self.acquire(definition_id, snapshot_id) {
            Lease::Leader(guard) => Some(guard),
            Lease::Follower(_) => None,
        }
    }
}

/// RAII lease held by the leader.
pub(crate) struct LeaseGuard {
    key: LeaseKey,
    tx: watch::Sender<Option<ExecOutcome>>,
    inflight: Arc<Mutex<HashMap<LeaseKey, Slot>>>,
}

impl LeaseGuard {
    /// Publish the outcome to followers and release the lease.
    pub(crate) fn complete(self, outcome: ExecOutcome) {
        self.tx.send_replace(Some(outcome));
        // Drop releases the key.
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        // Dropped without publishing: the execution was abandoned.
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(ExecOutcome::Cancelled);
                true
            } else {
                false
            }
        });
        self.inflight.lock().unwrap().remove(&self.key);
    }
}

/// Wait for the leader's published outcome.
pub(crate) async fn await_outcome(mut slot: Slot) -> ExecOutcome {
    loop {
        if let Some(outcome) = slot.borrow_and_update().clone() {
            return outcome;
        }
        if slot.changed().await.is_err() {
            // Leader vanished without publishing.
            return ExecOutcome::Cancelled;
        }
    }
}
