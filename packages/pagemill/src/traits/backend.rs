//! Collaborator trait for AI code generation and execution.
//!
//! The core never generates or runs extraction code itself — both are
//! delegated to an external service behind this trait. Generated code is
//! an opaque string here; sandboxing is the collaborator's concern.

use async_trait::async_trait;

use crate::error::BackendResult;

/// Request to generate an extraction function for a page.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// URL of the page the HTML came from.
    pub url: String,

    /// Raw snapshot HTML.
    pub html: String,

    /// Free-text extraction goal.
    pub goal: String,
}

/// A generated extraction recipe.
#[derive(Debug, Clone)]
pub struct GeneratedRecipe {
    /// Executable extraction code, opaque to the core.
    pub code: String,

    /// Declared output schema, if the generator produced one.
    pub output_schema: Option<serde_json::Value>,
}

/// Request to execute previously generated extraction code.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// URL of the page the HTML came from.
    pub url: String,

    /// Raw snapshot HTML to run against.
    pub html: String,

    /// The goal the code was generated for.
    pub goal: String,

    /// The generated extraction code.
    pub code: String,
}

/// The generation/execution collaborator.
///
/// Calls are blocking I/O boundaries on the order of tens of seconds;
/// the pipeline wraps them with deadlines and cancellation. Exactly one
/// call is made per `learn`/`execute` — retries are the caller's
/// decision, never performed here.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Generate an extraction function and schema for the given HTML and goal.
    async fn generate(&self, request: GenerateRequest) -> BackendResult<GeneratedRecipe>;

    /// Execute extraction code against the given HTML, returning the raw
    /// structured output.
    async fn execute(&self, request: ExecuteRequest) -> BackendResult<serde_json::Value>;
}
