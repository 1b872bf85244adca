use std::path::PathBuf;
use thiserror::Error;

/// Failures of the SQLite layer underneath [`crate::store::SqliteJobStore`].
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema migration could not be applied; the database is left at the
    /// previous version.
    #[error("Migration v{version} ({description}) failed: {source}")]
    Migration {
        version: u32,
        description: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}
