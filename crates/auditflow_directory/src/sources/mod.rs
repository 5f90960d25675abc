//! Roster sources, tried in priority order by the directory.

mod database;
mod latest_batch;
mod object_store;
mod roster_file;

pub use database::DatabaseRosterSource;
pub use latest_batch::LatestBatchRosterSource;
pub use object_store::{GcsObjectStore, ObjectInfo, ObjectStore, ObjectStoreRosterSource};
pub use roster_file::RosterFileSource;

use crate::error::Result;
use async_trait::async_trait;

/// One place case-manager names can come from.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Short descriptor reported in catalog metadata, e.g. `roster-file:/srv/roster.csv`.
    fn describe(&self) -> String;

    /// Raw names in source order. An unavailable source returns an empty
    /// list; a broken one returns an error.
    async fn names(&self) -> Result<Vec<String>>;
}
