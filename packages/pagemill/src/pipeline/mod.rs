//! The extraction pipeline: orchestration, execution leases, drift
//! detection, and provenance queries.

pub mod drift;
mod engine;
mod lease;
mod provenance;

pub use drift::{drift_against, expected_fields};
pub use engine::Pipeline;
pub use provenance::Lineage;
