//! Pages - tracked URLs owned by one user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{OwnerId, PageId};

/// A tracked URL whose HTML is captured over time.
///
/// Pages are created explicitly and never mutated. Deleting a page
/// cascades to its snapshots, definitions, and (transitively) runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Unique identifier (time-ordered).
    pub id: PageId,

    /// Owner identity; all access is scoped to this owner.
    pub owner_id: OwnerId,

    /// The tracked URL.
    pub url: String,

    /// When the page was registered.
    pub created_at: DateTime<Utc>,
}

impl Page {
    /// Create a new page owned by `owner_id`.
    pub fn new(owner_id: OwnerId, url: impl Into<String>) -> Self {
        Self {
            id: PageId::new(),
            owner_id,
            url: url.into(),
            created_at: Utc::now(),
        }
    }
}
