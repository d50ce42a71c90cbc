use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::enums::{LogStatus, MedicationStatus};

/// Fields of a medication course as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDraft {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub per_dose: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub usage: Option<String>,
    /// Daily reminder times, `HH:MM`.
    #[serde(default)]
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub duration_days: u32,
    /// `None` keeps the current status on update and means active on insert.
    #[serde(default)]
    pub status: Option<MedicationStatus>,
    #[serde(default)]
    pub linked_record_id: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

/// Longest course the store accepts, in days.
pub const MAX_COURSE_DAYS: u32 = 36_500;

impl MedicationDraft {
    /// Last day of the course: `start + duration - 1`.
    pub fn end_date(&self) -> Option<NaiveDate> {
        course_end_date(self.start_date, self.duration_days)
    }
}

/// `None` when the end falls past year 9999, which ISO date columns cannot
/// hold.
pub fn course_end_date(start: NaiveDate, duration_days: u32) -> Option<NaiveDate> {
    start
        .checked_add_days(Days::new(u64::from(duration_days.max(1)) - 1))
        .filter(|end| end.year() <= 9999)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: i64,
    pub name: String,
    pub dosage: String,
    pub per_dose: String,
    pub frequency: String,
    pub usage: Option<String>,
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub duration_days: u32,
    pub end_date: NaiveDate,
    pub status: MedicationStatus,
    pub linked_record_id: Option<i64>,
    pub notes: String,
    pub created_at: String,
    pub stopped_at: Option<String>,
    pub completed_at: Option<String>,
}

/// One taken/skipped tap, as submitted by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationLogEntry {
    pub medication_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub status: LogStatus,
}

/// A stored adherence event. Unique per `(medication_id, date, time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationLog {
    pub id: i64,
    pub medication_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub status: LogStatus,
    pub timestamp: String,
}
