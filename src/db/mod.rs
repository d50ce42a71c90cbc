pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Unknown {field} value in store: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Schema migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Rejected write: {0}")]
    ConstraintViolation(String),

    #[error("Store file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON column: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatabaseError {
    pub(crate) fn not_found(entity_type: &str, id: i64) -> Self {
        DatabaseError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }
}
