//! Domain types for the extraction-pipeline lifecycle.

pub mod config;
pub mod definition;
pub mod events;
pub mod ids;
pub mod page;
pub mod pagination;
pub mod run;
pub mod snapshot;

pub use config::{DuplicatePolicy, PipelineConfig};
pub use definition::{ExtractionDefinition, TrainingState};
pub use events::DomainEvent;
pub use ids::{DefinitionId, Id, OwnerId, PageId, RunId, SnapshotId};
pub use page::Page;
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE};
pub use run::ExtractionRun;
pub use snapshot::{FetchMeta, HtmlSnapshot};
