use super::RosterSource;
use crate::error::Result;
use async_trait::async_trait;
use auditflow_db::{AuditflowDb, RosterQuery};
use std::path::PathBuf;
use tracing::debug;

/// Roster table (or query) in a SQLite database.
pub struct DatabaseRosterSource {
    path: PathBuf,
    query: RosterQuery,
}

impl DatabaseRosterSource {
    pub fn new(path: impl Into<PathBuf>, query: RosterQuery) -> Self {
        Self {
            path: path.into(),
            query,
        }
    }
}

#[async_trait]
impl RosterSource for DatabaseRosterSource {
    fn describe(&self) -> String {
        match &self.query {
            RosterQuery::Table { table, column } => {
                format!("database:{}#{}.{}", self.path.display(), table, column)
            }
            RosterQuery::Custom(_) => format!("database:{}#query", self.path.display()),
        }
    }

    async fn names(&self) -> Result<Vec<String>> {
        let db = match AuditflowDb::open_existing(&self.path).await {
            Ok(db) => db,
            Err(err) if err.is_missing() => {
                debug!(path = %self.path.display(), "No roster database");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let names = db.roster_names(&self.query).await;
        db.close().await;
        Ok(names?)
    }
}
