//! Request/response types for the Pagent OS API.
//!
//! Field names follow the service's wire protocol exactly. HTML travels
//! either as plain text (`html` with `html_compressed: false`) or
//! base64-encoded (`html_base64` in scrape responses); the service also
//! accepts a gzip+base64 variant which this client does not produce.

use serde::{Deserialize, Serialize};

/// Response format for `/pages/get-html`.
///
/// The service additionally supports `gzip` and `raw`; this client
/// requests the two JSON-envelope formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeFormat {
    /// Plain HTML in the JSON envelope.
    Json,
    /// Base64-encoded HTML, avoiding JSON unicode-escaping issues.
    Base64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRequest {
    pub url: String,
    pub format: ScrapeFormat,
}

/// Fetch metadata as reported by the scraper.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeMetadata {
    pub url: String,
    pub method: String,
    /// ISO-8601 timestamp string.
    pub timestamp: String,
    pub content_length: u64,
    pub status: String,
    #[serde(default)]
    pub browser_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeResponse {
    pub html: String,
    pub meta: ScrapeMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeResponseBase64 {
    pub html_base64: String,
    pub meta: ScrapeMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearnEtlRequest {
    pub url: String,
    pub html: String,
    pub html_compressed: bool,
    pub goal: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearnEtlResponse {
    #[serde(default)]
    pub entities_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub etl_function_code: Option<String>,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteEtlRequest {
    pub etl_function_code: String,
    pub url: String,
    pub goal: String,
    pub html: String,
    pub html_compressed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteEtlResponse {
    pub status: String,
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
    pub timestamp: String,
    #[serde(default)]
    pub error: Option<String>,
}
