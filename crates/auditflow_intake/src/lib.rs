//! Batch staging for uploaded documents.
//!
//! A batch is validated as a whole before any disk I/O, then streamed into
//! `uploads/<batchId>/{documents,tabular-data,other}/` with exclusive-create
//! writes, and finally described by an atomically written `batch.json`.

pub mod catalog;
pub mod classify;
pub mod error;
pub mod limits;
pub mod stager;
pub mod writer;

pub use catalog::{BatchCatalog, StagedBatch};
pub use classify::{Classifier, DEFAULT_ROSTER_HINTS};
pub use error::{Result, StageError};
pub use limits::StagingLimits;
pub use stager::{BatchStager, UploadFile};
pub use writer::{write_exclusive, WrittenFile};
