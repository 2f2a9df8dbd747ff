//! Collaborator trait for the scrape-fetch service.
//!
//! Fetching lives outside the core: an embedding application fetches a
//! page (however it likes) and then records a snapshot. This trait is the
//! interface boundary for drivers that want the convenience
//! `capture_snapshot` flow.

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::FetchMeta;

/// A fetched page: raw HTML plus fetch metadata.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Raw HTML body. The core rejects empty HTML at snapshot creation.
    pub html: String,

    /// Fetch metadata as reported by the scraper.
    pub meta: FetchMeta,
}

/// The scrape-fetch collaborator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the current HTML of `url`.
    async fn fetch(&self, url: &str) -> BackendResult<FetchedPage>;
}
