//! HTML snapshots - immutable captures of a page at a point in time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ids::{PageId, SnapshotId};

/// Metadata recorded alongside a fetch.
///
/// Mirrors what the scrape collaborator reports: transport details plus
/// the response status. `method` and `browser_type` describe how the
/// fetch was performed (e.g. `"playwright"` / `"firefox"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchMeta {
    /// Content type of the response, if reported.
    pub content_type: Option<String>,

    /// Byte length of the fetched body.
    pub content_length: u64,

    /// When the fetch happened.
    pub fetched_at: Option<DateTime<Utc>>,

    /// HTTP status of the source response.
    pub status_code: Option<u16>,

    /// Fetch mechanism (e.g. "playwright", "requests").
    pub method: Option<String>,

    /// Browser engine used, when the fetch was browser-driven.
    pub browser_type: Option<String>,
}

impl FetchMeta {
    /// Metadata for a body of the given length, everything else unknown.
    pub fn for_body(body: &str) -> Self {
        Self {
            content_length: body.len() as u64,
            fetched_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the source response status.
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the fetch mechanism.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the browser engine.
    pub fn with_browser_type(mut self, browser_type: impl Into<String>) -> Self {
        self.browser_type = Some(browser_type.into());
        self
    }
}

/// An immutable capture of a page's HTML.
///
/// Once created, content is never modified; re-fetching a page creates a
/// new snapshot. The content hash is computed at construction so that
/// content-addressed deduplication can be layered on later without
/// changing identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSnapshot {
    /// Unique identifier (time-ordered).
    pub id: SnapshotId,

    /// Owning page.
    pub page_id: PageId,

    /// Raw HTML content, byte-for-byte as fetched.
    pub html: String,

    /// SHA-256 hash of `html`.
    pub content_hash: String,

    /// Fetch metadata.
    pub meta: FetchMeta,

    /// When the snapshot was recorded.
    pub created_at: DateTime<Utc>,
}

impl HtmlSnapshot {
    /// Create a new snapshot of `page_id` with the given HTML and metadata.
    pub fn new(page_id: PageId, html: impl Into<String>, meta: FetchMeta) -> Self {
        let html = html.into();
        let content_hash = Self::hash_content(&html);

        Self {
            id: SnapshotId::new(),
            page_id,
            html,
            content_hash,
            meta,
            created_at: Utc::now(),
        }
    }

    /// Calculate the SHA-256 hash of snapshot content.
    pub fn hash_content(html: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(html.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether `other_html` differs from this snapshot's content.
    pub fn content_changed(&self, other_html: &str) -> bool {
        Self::hash_content(other_html) != self.content_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_across_identical_content() {
        let page = PageId::new();
        let a = HtmlSnapshot::new(page, "<html>A</html>", FetchMeta::default());
        let b = HtmlSnapshot::new(page, "<html>A</html>", FetchMeta::default());
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn content_changed_detects_difference() {
        let snap = HtmlSnapshot::new(PageId::new(), "<html>A</html>", FetchMeta::default());
        assert!(!snap.content_changed("<html>A</html>"));
        assert!(snap.content_changed("<html>B</html>"));
    }
}
