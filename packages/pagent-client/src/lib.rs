//! Pure Pagent OS REST API client.
//!
//! A minimal client for the Pagent OS service, which bundles the three
//! external collaborators of the extraction pipeline:
//!
//! - `POST /pages/get-html` — browser-driven scrape of a URL
//! - `POST /pages/learn-etl` — AI generation of an extraction function
//!   (plus an entities schema) from HTML and a goal
//! - `POST /pages/execute-etl` — sandboxed execution of a generated
//!   extraction function against HTML
//!
//! Implements [`pagemill::ExtractionBackend`] and [`pagemill::PageFetcher`],
//! so it plugs straight into a `Pipeline`.
//!
//! # Example
//!
//! ```rust,ignore
//! use pagent_client::PagentClient;
//! use pagemill::{MemoryStore, Pipeline};
//!
//! let client = PagentClient::from_env()?;
//! let pipeline = Pipeline::new(MemoryStore::new(), client);
//! ```

pub mod types;

pub use types::{
    ExecuteEtlRequest, ExecuteEtlResponse, LearnEtlRequest, LearnEtlResponse, ScrapeFormat,
    ScrapeMetadata, ScrapeRequest, ScrapeResponse, ScrapeResponseBase64,
};

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use pagemill::{
    BackendError, ExecuteRequest, ExtractionBackend, FetchMeta, FetchedPage, GenerateRequest,
    GeneratedRecipe, PageFetcher,
};

type Result<T> = std::result::Result<T, BackendError>;

const DEFAULT_BASE_URL: &str = "http://localhost:8101";

/// Client for the Pagent OS API.
pub struct PagentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl PagentClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| BackendError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Attach an API key, sent as a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Create from environment: `PAGENT_BASE_URL` (defaults to the local
    /// dev server) and optional `PAGENT_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("PAGENT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut client = Self::new(base_url)?;
        if let Ok(key) = std::env::var("PAGENT_API_KEY") {
            client = client.with_api_key(key);
        }
        Ok(client)
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "pagent request");

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                code: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse {
                reason: e.to_string(),
            })
    }

    /// Scrape a page, returning its HTML and the scraper's metadata.
    pub async fn fetch_html(
        &self,
        url: &str,
        format: ScrapeFormat,
    ) -> Result<(String, ScrapeMetadata)> {
        let request = ScrapeRequest {
            url: url.to_string(),
            format,
        };

        match format {
            ScrapeFormat::Json => {
                let response: ScrapeResponse = self.post("/pages/get-html", &request).await?;
                Ok((response.html, response.meta))
            }
            ScrapeFormat::Base64 => {
                let response: ScrapeResponseBase64 = self.post("/pages/get-html", &request).await?;
                let html = decode_base64_html(&response.html_base64)?;
                Ok((html, response.meta))
            }
        }
    }

    /// Generate an extraction function for HTML and a goal.
    pub async fn learn_etl(&self, url: &str, html: &str, goal: &str) -> Result<LearnEtlResponse> {
        let request = LearnEtlRequest {
            url: url.to_string(),
            html: html.to_string(),
            html_compressed: false,
            goal: goal.to_string(),
        };
        self.post("/pages/learn-etl", &request).await
    }

    /// Execute a generated extraction function against HTML.
    pub async fn execute_etl(
        &self,
        code: &str,
        url: &str,
        goal: &str,
        html: &str,
    ) -> Result<ExecuteEtlResponse> {
        let request = ExecuteEtlRequest {
            etl_function_code: code.to_string(),
            url: url.to_string(),
            goal: goal.to_string(),
            html: html.to_string(),
            html_compressed: false,
        };
        self.post("/pages/execute-etl", &request).await
    }
}

#[async_trait]
impl ExtractionBackend for PagentClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedRecipe> {
        let response = self
            .learn_etl(&request.url, &request.html, &request.goal)
            .await?;

        if response.status != "success" {
            return Err(BackendError::Service {
                diagnostic: response
                    .error
                    .unwrap_or_else(|| format!("generation status: {}", response.status)),
            });
        }

        let code = response
            .etl_function_code
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| BackendError::MalformedResponse {
                reason: "response missing etl_function_code".into(),
            })?;

        Ok(GeneratedRecipe {
            code,
            output_schema: response.entities_schema,
        })
    }

    async fn execute(&self, request: ExecuteRequest) -> Result<serde_json::Value> {
        let response = self
            .execute_etl(&request.code, &request.url, &request.goal, &request.html)
            .await?;

        if response.status != "success" {
            return Err(BackendError::Service {
                diagnostic: response
                    .error
                    .unwrap_or_else(|| format!("execution status: {}", response.status)),
            });
        }

        response
            .extracted_data
            .ok_or_else(|| BackendError::MalformedResponse {
                reason: "response missing extracted_data".into(),
            })
    }
}

#[async_trait]
impl PageFetcher for PagentClient {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let (html, meta) = self.fetch_html(url, ScrapeFormat::Base64).await?;

        let mut fetch_meta = FetchMeta {
            content_length: meta.content_length,
            fetched_at: parse_timestamp(&meta.timestamp),
            method: Some(meta.method),
            browser_type: meta.browser_type,
            ..FetchMeta::default()
        };
        if meta.status == "success" {
            fetch_meta = fetch_meta.with_status_code(200);
        }

        Ok(FetchedPage {
            html,
            meta: fetch_meta,
        })
    }
}

/// Decode the service's base64 HTML encoding.
fn decode_base64_html(encoded: &str) -> Result<String> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| BackendError::MalformedResponse {
            reason: format!("invalid base64 html: {e}"),
        })?;
    String::from_utf8(bytes).map_err(|e| BackendError::MalformedResponse {
        reason: format!("base64 html is not utf-8: {e}"),
    })
}

/// Parse the service's ISO-8601 timestamps, which may or may not carry a
/// timezone (Python `isoformat()` omits it for naive datetimes).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_tz) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_tz.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_html() {
        let encoded = BASE64.encode("<html>caf\u{e9}</html>");
        assert_eq!(decode_base64_html(&encoded).unwrap(), "<html>caf\u{e9}</html>");
        assert!(decode_base64_html("not-base64!!!").is_err());
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        assert!(parse_timestamp("2024-05-01T12:00:00.123456").is_some());
        assert!(parse_timestamp("2024-05-01T12:00:00+00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = PagentClient::new("http://localhost:8101/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8101");
    }
}
