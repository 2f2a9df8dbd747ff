//! Testing utilities including mock collaborator implementations.
//!
//! These are useful for testing applications that embed the pipeline
//! without making real AI or network calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::{BackendError, BackendResult};
use crate::traits::{
    backend::{ExecuteRequest, ExtractionBackend, GenerateRequest, GeneratedRecipe},
    fetcher::{FetchedPage, PageFetcher},
};
use crate::types::FetchMeta;

/// Record of a call made to the mock backend.
#[derive(Debug, Clone)]
pub enum MockCall {
    Generate { goal: String },
    Execute { goal: String },
}

/// A mock generation/execution collaborator.
///
/// Returns deterministic, configurable responses. Cloning shares the
/// underlying state, so tests can keep a handle for assertions after
/// moving a clone into the pipeline.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Predefined recipes by goal.
    recipes: Arc<RwLock<HashMap<String, GeneratedRecipe>>>,

    /// Predefined execution outputs by goal.
    outputs: Arc<RwLock<HashMap<String, Value>>>,

    /// When set, every `generate` fails with this diagnostic.
    generation_failure: Arc<RwLock<Option<String>>>,

    /// When set, every `execute` fails with this diagnostic.
    execution_failure: Arc<RwLock<Option<String>>>,

    /// Artificial latency before `generate` responds.
    generate_delay: Arc<RwLock<Option<Duration>>>,

    /// Artificial latency before `execute` responds.
    execute_delay: Arc<RwLock<Option<Duration>>>,

    /// Call tracking for assertions.
    calls: Arc<RwLock<Vec<MockCall>>>,
}

impl MockBackend {
    /// Create a new mock with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predefined recipe for a goal.
    pub fn with_recipe(self, goal: impl Into<String>, recipe: GeneratedRecipe) -> Self {
        self.recipes.write().unwrap().insert(goal.into(), recipe);
        self
    }

    /// Shorthand: recipe with the given code and schema for a goal.
    pub fn with_schema(self, goal: impl Into<String>, schema: Value) -> Self {
        let goal = goal.into();
        let recipe = GeneratedRecipe {
            code: format!("def extract(html):\n    # {goal}\n    return data"),
            output_schema: Some(schema),
        };
        self.with_recipe(goal, recipe)
    }

    /// Add a predefined execution output for a goal.
    pub fn with_output(self, goal: impl Into<String>, output: Value) -> Self {
        self.outputs.write().unwrap().insert(goal.into(), output);
        self
    }

    /// Artificial latency for `generate`.
    pub fn with_generate_delay(self, delay: Duration) -> Self {
        *self.generate_delay.write().unwrap() = Some(delay);
        self
    }

    /// Artificial latency for `execute`.
    pub fn with_execute_delay(self, delay: Duration) -> Self {
        *self.execute_delay.write().unwrap() = Some(delay);
        self
    }

    /// Make every `generate` fail until cleared.
    pub fn fail_generation(&self, diagnostic: impl Into<String>) {
        *self.generation_failure.write().unwrap() = Some(diagnostic.into());
    }

    /// Make every `execute` fail until cleared.
    pub fn fail_execution(&self, diagnostic: impl Into<String>) {
        *self.execution_failure.write().unwrap() = Some(diagnostic.into());
    }

    /// Clear injected failures.
    pub fn clear_failures(&self) {
        *self.generation_failure.write().unwrap() = None;
        *self.execution_failure.write().unwrap() = None;
    }

    /// All calls made to this mock.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of `generate` calls made.
    pub fn generate_calls(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::Generate { .. }))
            .count()
    }

    /// Number of `execute` calls made.
    pub fn execute_calls(&self) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::Execute { .. }))
            .count()
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    async fn generate(&self, request: GenerateRequest) -> BackendResult<GeneratedRecipe> {
        self.calls.write().unwrap().push(MockCall::Generate {
            goal: request.goal.clone(),
        });

        let delay = *self.generate_delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(diagnostic) = self.generation_failure.read().unwrap().clone() {
            return Err(BackendError::Service { diagnostic });
        }

        if let Some(recipe) = self.recipes.read().unwrap().get(&request.goal) {
            return Ok(recipe.clone());
        }

        Ok(GeneratedRecipe {
            code: format!("def extract(html):\n    # {}\n    return data", request.goal),
            output_schema: None,
        })
    }

    async fn execute(&self, request: ExecuteRequest) -> BackendResult<Value> {
        self.calls.write().unwrap().push(MockCall::Execute {
            goal: request.goal.clone(),
        });

        let delay = *self.execute_delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(diagnostic) = self.execution_failure.read().unwrap().clone() {
            return Err(BackendError::Service { diagnostic });
        }

        if let Some(output) = self.outputs.read().unwrap().get(&request.goal) {
            return Ok(output.clone());
        }

        Ok(json!({ "goal": request.goal, "items": [] }))
    }
}

/// A mock scrape-fetch collaborator with scripted pages.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the HTML returned for a URL.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), html.into());
        self
    }

    /// Make every fetch fail until cleared.
    pub fn fail(&self, diagnostic: impl Into<String>) {
        *self.failure.write().unwrap() = Some(diagnostic.into());
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> BackendResult<FetchedPage> {
        if let Some(diagnostic) = self.failure.read().unwrap().clone() {
            return Err(BackendError::Service { diagnostic });
        }

        let html = self
            .pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| format!("<html><body>{url}</body></html>"));

        let meta = FetchMeta::for_body(&html)
            .with_status_code(200)
            .with_method("mock");
        Ok(FetchedPage { html, meta })
    }
}
