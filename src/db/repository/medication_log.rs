use chrono::{Days, Local, NaiveDate};
use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

const LOG_COLUMNS: &str = "id, medication_id, date, time, status, timestamp";

/// Record a taken/skipped event.
///
/// Upserts on `(medication_id, date, time)`: tapping again for the same
/// dose overwrites status and timestamp instead of adding a row.
pub fn add_medication_log(
    conn: &Connection,
    entry: &MedicationLogEntry,
) -> Result<i64, DatabaseError> {
    let date = entry.date.to_string();
    conn.execute(
        "INSERT INTO medication_logs (medication_id, date, time, status, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(medication_id, date, time)
         DO UPDATE SET status = excluded.status, timestamp = excluded.timestamp",
        params![
            entry.medication_id,
            date,
            entry.time,
            entry.status.as_str(),
            now_iso(),
        ],
    )?;
    let id = conn.query_row(
        "SELECT id FROM medication_logs WHERE medication_id = ?1 AND date = ?2 AND time = ?3",
        params![entry.medication_id, date, entry.time],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Undo a logged dose. Missing entries are ignored.
pub fn delete_medication_log(
    conn: &Connection,
    medication_id: i64,
    date: NaiveDate,
    time: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM medication_logs WHERE medication_id = ?1 AND date = ?2 AND time = ?3",
        params![medication_id, date.to_string(), time],
    )?;
    Ok(())
}

pub fn get_medication_logs(
    conn: &Connection,
    medication_id: i64,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    query_logs(
        conn,
        &format!(
            "SELECT {LOG_COLUMNS} FROM medication_logs WHERE medication_id = ?1 ORDER BY date, time"
        ),
        params![medication_id],
    )
}

pub fn get_logs_for_date(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    query_logs(
        conn,
        &format!("SELECT {LOG_COLUMNS} FROM medication_logs WHERE date = ?1 ORDER BY time, medication_id"),
        params![date.to_string()],
    )
}

/// Logs dated on or after `start`.
pub fn get_logs_since(
    conn: &Connection,
    start: NaiveDate,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    query_logs(
        conn,
        &format!("SELECT {LOG_COLUMNS} FROM medication_logs WHERE date >= ?1 ORDER BY date, time"),
        params![start.to_string()],
    )
}

pub fn get_today_logs(conn: &Connection) -> Result<Vec<MedicationLog>, DatabaseError> {
    get_logs_for_date(conn, Local::now().date_naive())
}

/// Logs from the last `days` days, today included. A window reaching past
/// the earliest representable date returns every log.
pub fn get_recent_logs(conn: &Connection, days: u32) -> Result<Vec<MedicationLog>, DatabaseError> {
    let start = Local::now()
        .date_naive()
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    get_logs_since(conn, start)
}

fn query_logs<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<MedicationLog>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, log_row_from_rusqlite)?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(log_from_row(row?)?);
    }
    Ok(logs)
}

struct LogRow {
    id: i64,
    medication_id: i64,
    date: String,
    time: String,
    status: String,
    timestamp: String,
}

fn log_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<LogRow> {
    Ok(LogRow {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        status: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

fn log_from_row(row: LogRow) -> Result<MedicationLog, DatabaseError> {
    Ok(MedicationLog {
        id: row.id,
        medication_id: row.medication_id,
        date: NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
            DatabaseError::ConstraintViolation(format!("invalid log date: {}", row.date))
        })?,
        time: row.time,
        status: row.status.parse()?,
        timestamp: row.timestamp,
    })
}
