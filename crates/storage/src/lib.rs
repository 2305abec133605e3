//! shelter-storage: the persistence gateway of the adoption workflow.
//!
//! - [`ShelterStorage`] -- snapshot-based, version-checked gateway trait
//! - [`MemoryStorage`] -- in-process backend used by the binary and tests
//! - [`conformance`] -- backend-agnostic test suite for implementations

pub mod conformance;
mod error;
mod memory;
mod record;
mod stats;
mod traits;

pub use error::{EntityKind, StorageError};
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{
    AdoptionFilter, AdoptionSortField, ApplicationFilter, ApplicationSortField, Page, SortOrder,
};
pub use stats::AdoptionStatistics;
pub use traits::ShelterStorage;
