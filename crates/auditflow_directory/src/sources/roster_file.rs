use super::RosterSource;
use crate::error::{DirectoryError, Result};
use crate::roster::parse_named;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// The canonical roster file kept next to the storage root.
pub struct RosterFileSource {
    path: PathBuf,
}

impl RosterFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RosterSource for RosterFileSource {
    fn describe(&self) -> String {
        format!("roster-file:{}", self.path.display())
    }

    async fn names(&self) -> Result<Vec<String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(DirectoryError::io(&self.path, err)),
        };
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        parse_named(&name, &bytes)
    }
}
