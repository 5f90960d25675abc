//! Case-manager directory.
//!
//! Builds the list of selectable case-manager partitions. Roster sources are
//! tried in priority order (first one with entries wins), then keys found in
//! previously produced workbooks are merged in, and the two reserved
//! partitions are always present.

pub mod catalog;
pub mod error;
pub mod roster;
pub mod scan;
pub mod sources;

pub use catalog::{
    Catalog, CatalogMeta, CaseManagerDirectory, CaseManagerOption, OptionKind, SourceAttempt,
};
pub use error::{DirectoryError, Result};
pub use sources::{
    DatabaseRosterSource, GcsObjectStore, LatestBatchRosterSource, ObjectInfo, ObjectStore,
    ObjectStoreRosterSource, RosterFileSource, RosterSource,
};
