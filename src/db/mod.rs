pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Invalid stored value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Uniqueness violated: {0}")]
    UniqueViolation(String),

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        // Unique and primary-key violations surface as duplicates.
        if let rusqlite::Error::SqliteFailure(ffi_err, msg) = &err {
            if ffi_err.code == ErrorCode::ConstraintViolation
                && (ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
            {
                return DatabaseError::UniqueViolation(
                    msg.clone().unwrap_or_else(|| ffi_err.to_string()),
                );
            }
        }
        DatabaseError::Sqlite(err)
    }
}
