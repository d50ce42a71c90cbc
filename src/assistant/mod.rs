//! Local question answering over the visit log.
//!
//! Questions are matched against an ordered list of regex intents; the
//! first match runs a handler that reads the store and formats a reply.
//! Nothing leaves the device.

pub mod engine;
pub mod handlers;
pub mod intents;
pub mod keyword;

pub use engine::QueryEngine;
pub use intents::{match_intent, Intent};
pub use keyword::KeywordRules;

use rusqlite::Connection;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::{Medication, Record};

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Record source unavailable: {0}")]
    Source(String),
}

/// Read-only view of the store used by the assistant.
pub trait RecordSource {
    /// All records, newest first.
    fn records(&self) -> Result<Vec<Record>, AssistantError>;

    fn active_medications(&self) -> Result<Vec<Medication>, AssistantError>;
}

impl RecordSource for Connection {
    fn records(&self) -> Result<Vec<Record>, AssistantError> {
        Ok(db::get_all_records(self)?)
    }

    fn active_medications(&self) -> Result<Vec<Medication>, AssistantError> {
        Ok(db::get_active_medications(self)?)
    }
}
