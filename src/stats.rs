//! Dashboard aggregates over the record list.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, DatabaseError};
use crate::models::{parse_record_date, Record};

/// Entries shown in the top hospital / department lists.
pub const TOP_N: usize = 6;
/// Bucket for records with an empty hospital or department.
pub const OTHER_BUCKET: &str = "其他";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCost {
    /// `YYYY-MM`
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_records: usize,
    pub total_cost: f64,
    pub hospital_count: usize,
    pub department_count: usize,
    pub top_hospitals: Vec<NameCount>,
    pub top_departments: Vec<NameCount>,
    /// Oldest month first.
    pub cost_trend: Vec<MonthlyCost>,
}

pub fn summarize(records: &[Record]) -> StatsSummary {
    let mut hospitals: Vec<NameCount> = Vec::new();
    let mut departments: Vec<NameCount> = Vec::new();
    let mut trend: Vec<MonthlyCost> = Vec::new();
    let mut total_cost = 0.0;

    for record in records {
        let cost = if record.totals.total.is_finite() {
            record.totals.total
        } else {
            0.0
        };
        total_cost += cost;

        bump(&mut hospitals, &record.hospital);
        bump(&mut departments, &record.department);

        if let Some(date) = parse_record_date(&record.date) {
            let month = date.format("%Y-%m").to_string();
            match trend.iter_mut().find(|m| m.month == month) {
                Some(entry) => entry.amount += cost,
                None => trend.push(MonthlyCost { month, amount: cost }),
            }
        }
    }

    let hospital_count = hospitals.len();
    let department_count = departments.len();
    trend.sort_by(|a, b| a.month.cmp(&b.month));

    StatsSummary {
        total_records: records.len(),
        total_cost,
        hospital_count,
        department_count,
        top_hospitals: top(hospitals),
        top_departments: top(departments),
        cost_trend: trend,
    }
}

/// Summary over everything in the store.
pub fn load_summary(conn: &Connection) -> Result<StatsSummary, DatabaseError> {
    let records = db::get_all_records(conn)?;
    Ok(summarize(&records))
}

fn bump(counts: &mut Vec<NameCount>, name: &str) {
    let name = match name.trim() {
        "" => OTHER_BUCKET,
        trimmed => trimmed,
    };
    match counts.iter_mut().find(|c| c.name == name) {
        Some(entry) => entry.count += 1,
        None => counts.push(NameCount {
            name: name.to_string(),
            count: 1,
        }),
    }
}

// Stable sort: equal counts keep first-seen order.
fn top(mut counts: Vec<NameCount>) -> Vec<NameCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_N);
    counts
}
