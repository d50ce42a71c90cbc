use std::collections::HashSet;

use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::attachment::{get_attachments_for_record, insert_attachment};

const RECORD_COLUMNS: &str = "id, date, hospital, department, doctor, visit_type, title, \
     diagnosis, medical_advice, cost_items, cost_self, cost_pool, cost_personal, cost_total, \
     notes, timestamp";

fn validate_draft(draft: &RecordDraft) -> Result<(), DatabaseError> {
    if parse_record_date(&draft.date).is_none() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "record date must start with YYYY-MM-DD, got {:?}",
            draft.date
        )));
    }
    Ok(())
}

/// Insert a record together with its attachments.
///
/// Runs in one transaction: if any attachment insert fails, the record is
/// not created either.
pub fn add_record(
    conn: &Connection,
    draft: &RecordDraft,
    attachments: &[AttachmentDraft],
) -> Result<i64, DatabaseError> {
    validate_draft(draft)?;
    let totals = draft.totals();
    let items_json = serde_json::to_string(&draft.cost_items)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO records (date, hospital, department, doctor, visit_type, title, diagnosis,
         medical_advice, cost_items, cost_self, cost_pool, cost_personal, cost_total, notes, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            draft.date,
            draft.hospital,
            draft.department,
            draft.doctor,
            draft.visit_type,
            draft.title,
            draft.diagnosis,
            draft.medical_advice,
            items_json,
            totals.self_pay,
            totals.pool_pay,
            totals.personal_pay,
            totals.total,
            draft.notes,
            now_iso(),
        ],
    )?;
    let record_id = tx.last_insert_rowid();

    for att in attachments {
        insert_attachment(&tx, record_id, att)?;
    }
    tx.commit()?;

    tracing::info!(record_id, attachments = attachments.len(), "Record added");
    Ok(record_id)
}

/// Full-field update of a record plus attachment changes, all-or-nothing.
///
/// `deleted_attachment_ids` only removes attachments owned by this record;
/// an empty slice leaves existing attachments untouched.
pub fn update_record(
    conn: &Connection,
    id: i64,
    draft: &RecordDraft,
    new_attachments: &[AttachmentDraft],
    deleted_attachment_ids: &[i64],
) -> Result<(), DatabaseError> {
    validate_draft(draft)?;
    let totals = draft.totals();
    let items_json = serde_json::to_string(&draft.cost_items)?;

    let tx = conn.unchecked_transaction()?;
    let updated = tx.execute(
        "UPDATE records SET date = ?1, hospital = ?2, department = ?3, doctor = ?4,
         visit_type = ?5, title = ?6, diagnosis = ?7, medical_advice = ?8, cost_items = ?9,
         cost_self = ?10, cost_pool = ?11, cost_personal = ?12, cost_total = ?13, notes = ?14,
         timestamp = ?15
         WHERE id = ?16",
        params![
            draft.date,
            draft.hospital,
            draft.department,
            draft.doctor,
            draft.visit_type,
            draft.title,
            draft.diagnosis,
            draft.medical_advice,
            items_json,
            totals.self_pay,
            totals.pool_pay,
            totals.personal_pay,
            totals.total,
            draft.notes,
            now_iso(),
            id,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Record", id));
    }

    let mut removed = 0;
    for att_id in deleted_attachment_ids {
        removed += tx.execute(
            "DELETE FROM attachments WHERE id = ?1 AND record_id = ?2",
            params![att_id, id],
        )?;
    }
    for att in new_attachments {
        insert_attachment(&tx, id, att)?;
    }
    tx.commit()?;

    tracing::info!(
        record_id = id,
        added = new_attachments.len(),
        removed,
        "Record updated"
    );
    Ok(())
}

pub fn get_record(conn: &Connection, id: i64) -> Result<Option<Record>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"))?;
    match stmt.query_row(params![id], record_row_from_rusqlite) {
        Ok(row) => Ok(Some(record_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

pub fn get_record_with_attachments(
    conn: &Connection,
    id: i64,
) -> Result<Option<RecordWithAttachments>, DatabaseError> {
    let Some(record) = get_record(conn, id)? else {
        return Ok(None);
    };
    let attachments = get_attachments_for_record(conn, id)?;
    Ok(Some(RecordWithAttachments { record, attachments }))
}

/// All records, newest visit first. Same-date records list the most
/// recently created first.
pub fn get_all_records(conn: &Connection) -> Result<Vec<Record>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM records ORDER BY date DESC, id DESC"
    ))?;
    let rows = stmt.query_map([], record_row_from_rusqlite)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

/// Records whose hospital, department, title or visit type contains the
/// query, plus records with an attachment whose OCR text contains it.
///
/// Matching is a case-insensitive substring test with Unicode case folding,
/// done in Rust on both sides. Each record appears once; order matches
/// [`get_all_records`]. A blank query returns every record.
pub fn search_records(conn: &Connection, query: &str) -> Result<Vec<Record>, DatabaseError> {
    let needle = query.trim().to_lowercase();
    let records = get_all_records(conn)?;
    if needle.is_empty() {
        return Ok(records);
    }
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    let mut stmt =
        conn.prepare("SELECT record_id, ocr_text FROM attachments WHERE ocr_text IS NOT NULL")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    let mut ocr_hits = HashSet::new();
    for row in rows {
        let (record_id, text) = row?;
        if contains(&text) {
            ocr_hits.insert(record_id);
        }
    }

    Ok(records
        .into_iter()
        .filter(|r| {
            ocr_hits.contains(&r.id)
                || [&r.hospital, &r.department, &r.title, &r.visit_type]
                    .into_iter()
                    .any(|field| contains(field))
        })
        .collect())
}

/// Delete a record and every attachment that references it, atomically.
pub fn delete_record(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let deleted_attachments =
        tx.execute("DELETE FROM attachments WHERE record_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Record", id));
    }
    tx.commit()?;

    tracing::info!(record_id = id, deleted_attachments, "Record deleted");
    Ok(())
}

pub fn count_records(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
    Ok(count)
}

/// Insert a record keeping its original identifier (restore path).
pub(crate) fn insert_record_with_id(conn: &Connection, record: &Record) -> Result<(), DatabaseError> {
    let items_json = serde_json::to_string(&record.cost_items)?;
    let totals = CostTotals::from_items(&record.cost_items);
    conn.execute(
        "INSERT INTO records (id, date, hospital, department, doctor, visit_type, title, diagnosis,
         medical_advice, cost_items, cost_self, cost_pool, cost_personal, cost_total, notes, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            record.id,
            record.date,
            record.hospital,
            record.department,
            record.doctor,
            record.visit_type,
            record.title,
            record.diagnosis,
            record.medical_advice,
            items_json,
            totals.self_pay,
            totals.pool_pay,
            totals.personal_pay,
            totals.total,
            record.notes,
            record.timestamp,
        ],
    )?;
    Ok(())
}

// Raw columns; cost items are still JSON here.
struct RecordRow {
    id: i64,
    date: String,
    hospital: String,
    department: String,
    doctor: Option<String>,
    visit_type: String,
    title: String,
    diagnosis: Option<String>,
    medical_advice: Option<String>,
    cost_items: String,
    cost_self: f64,
    cost_pool: f64,
    cost_personal: f64,
    cost_total: f64,
    notes: String,
    timestamp: String,
}

fn record_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        date: row.get(1)?,
        hospital: row.get(2)?,
        department: row.get(3)?,
        doctor: row.get(4)?,
        visit_type: row.get(5)?,
        title: row.get(6)?,
        diagnosis: row.get(7)?,
        medical_advice: row.get(8)?,
        cost_items: row.get(9)?,
        cost_self: row.get(10)?,
        cost_pool: row.get(11)?,
        cost_personal: row.get(12)?,
        cost_total: row.get(13)?,
        notes: row.get(14)?,
        timestamp: row.get(15)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<Record, DatabaseError> {
    let mut record = Record {
        id: row.id,
        date: row.date,
        hospital: row.hospital,
        department: row.department,
        doctor: row.doctor,
        visit_type: row.visit_type,
        title: row.title,
        diagnosis: row.diagnosis,
        medical_advice: row.medical_advice,
        cost_items: serde_json::from_str(&row.cost_items)?,
        totals: CostTotals {
            self_pay: row.cost_self,
            pool_pay: row.cost_pool,
            personal_pay: row.cost_personal,
            total: row.cost_total,
        },
        notes: row.notes,
        timestamp: row.timestamp,
    };
    record.normalize_costs();
    Ok(record)
}
