use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;

use super::codec::BackupPayload;
use super::BackupError;

/// Outcome of a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub records_restored: usize,
    pub attachments_restored: usize,
    /// Attachments whose record was not part of the backup.
    pub skipped_attachments: usize,
}

/// Replace every record and attachment with the payload contents.
///
/// Runs in one transaction: if any row fails to insert, the store keeps its
/// previous contents. Medications, logs and settings are not touched.
pub fn replace_store(
    conn: &Connection,
    payload: BackupPayload,
) -> Result<RestoreSummary, BackupError> {
    let tx = conn.unchecked_transaction().map_err(db::DatabaseError::from)?;
    tx.execute("DELETE FROM attachments", [])
        .map_err(db::DatabaseError::from)?;
    tx.execute("DELETE FROM records", [])
        .map_err(db::DatabaseError::from)?;

    let mut summary = RestoreSummary::default();
    let mut record_ids = HashSet::with_capacity(payload.records.len());
    for mut record in payload.records {
        record.normalize_costs();
        db::insert_record_with_id(&tx, &record)?;
        record_ids.insert(record.id);
        summary.records_restored += 1;
    }

    for attachment in &payload.attachments {
        if !record_ids.contains(&attachment.record_id) {
            tracing::warn!(
                attachment_id = attachment.id,
                record_id = attachment.record_id,
                "Skipping backup attachment without a record"
            );
            summary.skipped_attachments += 1;
            continue;
        }
        db::insert_attachment_with_id(&tx, attachment)?;
        summary.attachments_restored += 1;
    }

    tx.commit().map_err(db::DatabaseError::from)?;
    tracing::info!(
        records = summary.records_restored,
        attachments = summary.attachments_restored,
        skipped = summary.skipped_attachments,
        "Store restored from backup"
    );
    Ok(summary)
}
