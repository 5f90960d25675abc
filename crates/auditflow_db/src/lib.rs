//! Read-only access to the roster database.
//!
//! The analyzer environment may keep its case-manager roster in a SQLite
//! file. This crate opens that file read-only and pulls distinct names out of
//! a configured table/column or a guarded custom query.
//!
//! # Usage
//!
//! ```rust,ignore
//! use auditflow_db::{AuditflowDb, RosterQuery};
//!
//! let db = AuditflowDb::open_existing("/srv/audit/roster.sqlite3").await?;
//! let names = db
//!     .roster_names(&RosterQuery::table("roster", "case_manager"))
//!     .await?;
//! ```

mod error;
pub mod sql_guard;

pub use error::{DbError, Result};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

/// Upper bound on rows read from any roster query.
pub const MAX_ROSTER_ROWS: usize = 10_000;

/// Where roster names come from inside the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterQuery {
    /// `SELECT DISTINCT <column> FROM <table>`
    Table { table: String, column: String },
    /// Custom read-only query; the first column of each row is a name.
    Custom(String),
}

impl RosterQuery {
    pub fn table(table: impl Into<String>, column: impl Into<String>) -> Self {
        RosterQuery::Table {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Build the SQL to execute, validating identifiers or the custom query.
    pub fn to_sql(&self) -> Result<String> {
        let sql = match self {
            RosterQuery::Table { table, column } => {
                let table = sql_guard::quote_identifier(table)?;
                let column = sql_guard::quote_identifier(column)?;
                format!(
                    "SELECT DISTINCT CAST({col} AS TEXT) FROM {table} WHERE {col} IS NOT NULL",
                    col = column,
                    table = table
                )
            }
            RosterQuery::Custom(sql) => {
                sql_guard::validate_read_only(sql)?;
                sql.clone()
            }
        };
        Ok(sql_guard::apply_row_limit(&sql, MAX_ROSTER_ROWS))
    }
}

/// Read-only handle on a roster database.
#[derive(Clone)]
pub struct AuditflowDb {
    pool: SqlitePool,
}

impl AuditflowDb {
    /// Open an existing database read-only (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=ro", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await?;

        info!(path = %path.display(), "Roster database opened");

        Ok(Self { pool })
    }

    /// Distinct, trimmed, non-empty names in query order.
    pub async fn roster_names(&self, query: &RosterQuery) -> Result<Vec<String>> {
        let sql = query.to_sql()?;
        debug!(sql = %sql, "Querying roster");

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_missing_table)?;

        let mut names: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Option<String> = row
                .try_get(0)
                .map_err(|err| DbError::ColumnType(err.to_string()))?;
            let Some(value) = value else { continue };
            let trimmed = value.trim();
            if !trimmed.is_empty() && !names.iter().any(|existing| existing == trimmed) {
                names.push(trimmed.to_string());
            }
        }
        Ok(names)
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn map_missing_table(err: sqlx::Error) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.message().contains("no such table") => {
            DbError::not_found(db_err.message().to_string())
        }
        _ => DbError::Sqlx(err),
    }
}
