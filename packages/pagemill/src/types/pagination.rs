//! Cursor-based pagination for listing operations.
//!
//! IDs are time-ordered (UUID v7), so the ID of the last item seen is a
//! stable cursor: a follow-up query for items strictly older than the
//! cursor is re-queryable and never skips or duplicates entries, even as
//! new records are appended.

use uuid::Uuid;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A page request: most-recent-first, at most `limit` items, strictly
/// older than `before` when set.
#[derive(Debug, Clone)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: usize,

    /// Exclusive upper bound: only items with an ID older than this
    /// cursor are returned.
    pub before: Option<Uuid>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            before: None,
        }
    }
}

impl Pagination {
    /// First page with the default size.
    pub fn first_page() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Continue after the given item (its ID becomes the cursor).
    pub fn before(mut self, cursor: impl Into<Uuid>) -> Self {
        self.before = Some(cursor.into());
        self
    }
}
