//! Auditflow shared protocol
//!
//! Everything the staging, run-tracking, directory and orchestration crates
//! must agree on with each other and with the external analyzer:
//!
//! - **types**: run status state machine, scopes, file kinds, artifact formats,
//!   and the manifest/batch records as they appear on disk
//! - **layout**: the storage root and its fixed subtrees
//! - **naming**: case-manager key derivation and output filename convention
//! - **defaults** / **paths**: canonical constants and home-directory resolution

pub mod defaults;
pub mod layout;
pub mod naming;
pub mod paths;
pub mod types;

pub use auditflow_ids::{BatchId, IdParseError, RunId};
pub use layout::StorageRoot;
pub use naming::{key_from_name, label_from_key, CaseManagerNaming, ALL_KEY, BLANK_KEY};
pub use types::{
    ArtifactFormat, BatchManifest, FileKind, RecordSource, RunOutputs, RunRecord, RunScope,
    RunSelection, RunStatus, StagedFile,
};
