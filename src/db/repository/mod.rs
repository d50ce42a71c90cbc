//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `rusqlite::Connection`. Operations that
//! touch more than one table open their own transaction.

mod attachment;
mod medication;
mod medication_log;
mod record;
mod settings;

pub use attachment::*;
pub use medication::*;
pub use medication_log::*;
pub use record::*;
pub use settings::*;
