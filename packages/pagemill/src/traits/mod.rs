//! Core trait abstractions: storage, collaborators, and event delivery.

pub mod backend;
pub mod events;
pub mod fetcher;
pub mod store;

pub use backend::{ExecuteRequest, ExtractionBackend, GenerateRequest, GeneratedRecipe};
pub use events::{BroadcastSink, EventSink, NullSink};
pub use fetcher::{FetchedPage, PageFetcher};
pub use store::{CoreStore, DefinitionStore, PageStore, RunStore, SnapshotStore};
