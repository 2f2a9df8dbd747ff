//! Extraction-Pipeline Lifecycle Library
//!
//! Turns raw web pages into structured data through AI-generated,
//! page-specific extraction functions — and tracks every step. The
//! library owns the lifecycle, not the AI: immutable snapshot capture,
//! creation and forking ("retraining") of extraction definitions,
//! dedup-safe execution, and provenance linking every output back to the
//! exact snapshot and definition that produced it.
//!
//! # Design Philosophy
//!
//! - Snapshots are historical facts: captured once, never modified.
//! - Definitions are immutable recipes: improving one forks a new one.
//! - Runs are append-only and fully attributed (definition + snapshot).
//! - Generated code is opaque here; generation and execution are
//!   delegated to external collaborators behind traits.
//! - Schemas are advisory: drift is reported, never rejected.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pagemill::{MemoryStore, Pipeline};
//! use pagemill::testing::MockBackend;
//!
//! let pipeline = Pipeline::new(MemoryStore::new(), MockBackend::new());
//!
//! let page = pipeline.create_page(owner, "https://example.com/products").await?;
//! let snap = pipeline.create_snapshot(owner, page.id, html, meta).await?;
//! let def = pipeline.learn(owner, page.id, snap.id, "extract product titles").await?;
//! let run = pipeline.execute(owner, def.id, snap.id).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (storage, collaborators, events)
//! - [`types`] - Domain types and typed IDs
//! - [`pipeline`] - The lifecycle engine, leases, drift, provenance
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{BackendError, PipelineError};
pub use traits::{
    backend::{ExecuteRequest, ExtractionBackend, GenerateRequest, GeneratedRecipe},
    events::{BroadcastSink, EventSink, NullSink},
    fetcher::{FetchedPage, PageFetcher},
    store::{CoreStore, DefinitionStore, PageStore, RunStore, SnapshotStore},
};
pub use types::{
    DefinitionId, DomainEvent, DuplicatePolicy, ExtractionDefinition, ExtractionRun, FetchMeta,
    HtmlSnapshot, Id, OwnerId, Page, PageId, Pagination, PipelineConfig, RunId, SnapshotId,
    TrainingState,
};

// Re-export the engine and provenance view
pub use pipeline::{Lineage, Pipeline};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
