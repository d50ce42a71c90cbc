use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

const ATTACHMENT_COLUMNS: &str =
    "id, record_id, name, mime_type, data, ocr_text, ocr_status, module";

/// Insert one attachment bound to `record_id`. Callers wrap this in the
/// transaction that owns the record write.
pub(crate) fn insert_attachment(
    conn: &Connection,
    record_id: i64,
    att: &AttachmentDraft,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO attachments (record_id, name, mime_type, data, ocr_text, ocr_status, module)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record_id,
            att.name,
            att.mime_type,
            att.data,
            att.ocr_text,
            att.ocr_status.as_str(),
            att.module.map(|m| m.as_str()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert an attachment keeping its original identifier (restore path).
pub(crate) fn insert_attachment_with_id(
    conn: &Connection,
    att: &Attachment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO attachments (id, record_id, name, mime_type, data, ocr_text, ocr_status, module)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            att.id,
            att.record_id,
            att.name,
            att.mime_type,
            att.data,
            att.ocr_text,
            att.ocr_status.as_str(),
            att.module.map(|m| m.as_str()),
        ],
    )?;
    Ok(())
}

pub fn get_attachments_for_record(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<Attachment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE record_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![record_id], attachment_row_from_rusqlite)?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(attachment_from_row(row?)?);
    }
    Ok(attachments)
}

pub fn get_attachment(conn: &Connection, id: i64) -> Result<Option<Attachment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1"
    ))?;
    match stmt.query_row(params![id], attachment_row_from_rusqlite) {
        Ok(row) => Ok(Some(attachment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Every attachment in the store, for export.
pub fn get_all_attachments(conn: &Connection) -> Result<Vec<Attachment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments ORDER BY id"
    ))?;
    let rows = stmt.query_map([], attachment_row_from_rusqlite)?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(attachment_from_row(row?)?);
    }
    Ok(attachments)
}

pub fn count_attachments_for_record(conn: &Connection, record_id: i64) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM attachments WHERE record_id = ?1",
        params![record_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Record the outcome of an OCR call for one attachment.
///
/// A failed call stores `OcrStatus::Error` and leaves any previous text
/// untouched; the rest of the record stays editable.
pub fn set_attachment_ocr_result(
    conn: &Connection,
    id: i64,
    status: OcrStatus,
    text: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = match text {
        Some(text) => conn.execute(
            "UPDATE attachments SET ocr_status = ?1, ocr_text = ?2 WHERE id = ?3",
            params![status.as_str(), text, id],
        )?,
        None => conn.execute(
            "UPDATE attachments SET ocr_status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?,
    };
    if updated == 0 {
        return Err(DatabaseError::not_found("Attachment", id));
    }
    if status == OcrStatus::Error {
        tracing::warn!(attachment_id = id, "OCR failed for attachment");
    }
    Ok(())
}

// Raw columns; module and status strings are parsed afterwards.
struct AttachmentRow {
    id: i64,
    record_id: i64,
    name: String,
    mime_type: String,
    data: Vec<u8>,
    ocr_text: Option<String>,
    ocr_status: String,
    module: Option<String>,
}

fn attachment_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<AttachmentRow> {
    Ok(AttachmentRow {
        id: row.get(0)?,
        record_id: row.get(1)?,
        name: row.get(2)?,
        mime_type: row.get(3)?,
        data: row.get(4)?,
        ocr_text: row.get(5)?,
        ocr_status: row.get(6)?,
        module: row.get(7)?,
    })
}

fn attachment_from_row(row: AttachmentRow) -> Result<Attachment, DatabaseError> {
    Ok(Attachment {
        id: row.id,
        record_id: row.record_id,
        name: row.name,
        mime_type: row.mime_type,
        data: row.data,
        ocr_text: row.ocr_text,
        ocr_status: row.ocr_status.parse()?,
        module: row.module.map(|m| m.parse()).transpose()?,
    })
}
