//! Run manifests and the artifacts they point at.
//!
//! Manifests are written by the external analyzer; everything here only
//! reads. [`state::reconcile`] decides what a run looks like from whatever
//! is on disk, [`RunManifestStore`] scans the disk, and [`ArtifactResolver`]
//! turns a run plus a format into a contained file or a redirect.

pub mod artifact;
pub mod error;
pub mod manifest;
pub mod state;
pub mod store;

pub use artifact::{ArtifactOrigin, ArtifactResolver, ArtifactResponse, ResolvedArtifact};
pub use error::{ArtifactError, RunStoreError};
pub use manifest::ManifestFile;
pub use state::{reconcile, RunSnapshot, TierSnapshot};
pub use store::RunManifestStore;
