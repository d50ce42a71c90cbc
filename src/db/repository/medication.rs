use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

const MEDICATION_COLUMNS: &str = "id, name, dosage, per_dose, frequency, usage, times, start_date, \
     duration_days, end_date, status, linked_record_id, notes, created_at, stopped_at, completed_at";

/// Checks the draft and returns its derived end date.
fn validate_draft(med: &MedicationDraft) -> Result<NaiveDate, DatabaseError> {
    if med.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation("medication name is required".into()));
    }
    if med.duration_days == 0 {
        return Err(DatabaseError::ConstraintViolation(
            "medication duration must be at least one day".into(),
        ));
    }
    if med.duration_days > MAX_COURSE_DAYS {
        return Err(DatabaseError::ConstraintViolation(format!(
            "medication duration exceeds {MAX_COURSE_DAYS} days"
        )));
    }
    med.end_date().ok_or_else(|| {
        DatabaseError::ConstraintViolation("medication end date is out of range".into())
    })
}

pub fn add_medication(conn: &Connection, med: &MedicationDraft) -> Result<i64, DatabaseError> {
    let end_date = validate_draft(med)?;
    let status = med.status.unwrap_or_default();
    conn.execute(
        "INSERT INTO medications (name, dosage, per_dose, frequency, usage, times, start_date,
         duration_days, end_date, status, linked_record_id, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            med.name,
            med.dosage,
            med.per_dose,
            med.frequency,
            med.usage,
            serde_json::to_string(&med.times)?,
            med.start_date.to_string(),
            med.duration_days,
            end_date.to_string(),
            status.as_str(),
            med.linked_record_id,
            med.notes,
            now_iso(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(medication_id = id, "Medication added");
    Ok(id)
}

/// All medications, most recently created first.
pub fn get_all_medications(conn: &Connection) -> Result<Vec<Medication>, DatabaseError> {
    query_medications(
        conn,
        &format!("SELECT {MEDICATION_COLUMNS} FROM medications ORDER BY created_at DESC, id DESC"),
        [],
    )
}

pub fn get_active_medications(conn: &Connection) -> Result<Vec<Medication>, DatabaseError> {
    query_medications(
        conn,
        &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE status = 'active' ORDER BY id"),
        [],
    )
}

pub fn get_medication(conn: &Connection, id: i64) -> Result<Option<Medication>, DatabaseError> {
    let mut meds = query_medications(
        conn,
        &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1"),
        params![id],
    )?;
    Ok(meds.pop())
}

/// Full-field update. The end date is re-derived; a `None` status keeps
/// the current one.
pub fn update_medication(
    conn: &Connection,
    id: i64,
    med: &MedicationDraft,
) -> Result<(), DatabaseError> {
    let end_date = validate_draft(med)?;
    let updated = conn.execute(
        "UPDATE medications SET name = ?1, dosage = ?2, per_dose = ?3, frequency = ?4,
         usage = ?5, times = ?6, start_date = ?7, duration_days = ?8, end_date = ?9,
         status = COALESCE(?10, status), linked_record_id = ?11, notes = ?12
         WHERE id = ?13",
        params![
            med.name,
            med.dosage,
            med.per_dose,
            med.frequency,
            med.usage,
            serde_json::to_string(&med.times)?,
            med.start_date.to_string(),
            med.duration_days,
            end_date.to_string(),
            med.status.map(|s| s.as_str()),
            med.linked_record_id,
            med.notes,
            id,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Medication", id));
    }
    Ok(())
}

/// Delete a medication together with its adherence logs.
pub fn delete_medication(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let deleted_logs = tx.execute(
        "DELETE FROM medication_logs WHERE medication_id = ?1",
        params![id],
    )?;
    let deleted = tx.execute("DELETE FROM medications WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Medication", id));
    }
    tx.commit()?;

    tracing::info!(medication_id = id, deleted_logs, "Medication deleted");
    Ok(())
}

pub fn stop_medication(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET status = 'stopped', stopped_at = ?1 WHERE id = ?2",
        params![now_iso(), id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Medication", id));
    }
    Ok(())
}

pub fn complete_medication(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET status = 'completed', completed_at = ?1 WHERE id = ?2",
        params![now_iso(), id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("Medication", id));
    }
    Ok(())
}

fn query_medications<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

// Raw columns; `times` is still JSON here.
struct MedicationRow {
    id: i64,
    name: String,
    dosage: String,
    per_dose: String,
    frequency: String,
    usage: Option<String>,
    times: String,
    start_date: String,
    duration_days: u32,
    end_date: String,
    status: String,
    linked_record_id: Option<i64>,
    notes: String,
    created_at: String,
    stopped_at: Option<String>,
    completed_at: Option<String>,
}

fn medication_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<MedicationRow> {
    Ok(MedicationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        dosage: row.get(2)?,
        per_dose: row.get(3)?,
        frequency: row.get(4)?,
        usage: row.get(5)?,
        times: row.get(6)?,
        start_date: row.get(7)?,
        duration_days: row.get(8)?,
        end_date: row.get(9)?,
        status: row.get(10)?,
        linked_record_id: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
        stopped_at: row.get(14)?,
        completed_at: row.get(15)?,
    })
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        DatabaseError::ConstraintViolation(format!("invalid {field}: {value}"))
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: row.id,
        name: row.name,
        dosage: row.dosage,
        per_dose: row.per_dose,
        frequency: row.frequency,
        usage: row.usage,
        times: serde_json::from_str(&row.times)?,
        start_date: parse_date("start_date", &row.start_date)?,
        duration_days: row.duration_days,
        end_date: parse_date("end_date", &row.end_date)?,
        status: row.status.parse()?,
        linked_record_id: row.linked_record_id,
        notes: row.notes,
        created_at: row.created_at,
        stopped_at: row.stopped_at,
        completed_at: row.completed_at,
    })
}
