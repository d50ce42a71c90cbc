use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use super::lenient_amount;

/// One itemized charge split by payer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostItem {
    #[serde(default)]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub self_pay: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub pool_pay: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub personal_pay: f64,
    /// Receipt attachment the amounts were read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<i64>,
}

impl CostItem {
    pub fn total(&self) -> f64 {
        self.self_pay + self.pool_pay + self.personal_pay
    }
}

/// Per-payer sums over all cost items of a record.
///
/// Never set directly: always produced by [`CostTotals::from_items`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostTotals {
    #[serde(rename = "cost_self", default, deserialize_with = "lenient_amount")]
    pub self_pay: f64,
    #[serde(rename = "cost_pool", default, deserialize_with = "lenient_amount")]
    pub pool_pay: f64,
    #[serde(rename = "cost_personal", default, deserialize_with = "lenient_amount")]
    pub personal_pay: f64,
    #[serde(rename = "cost_total", default, deserialize_with = "lenient_amount")]
    pub total: f64,
}

impl CostTotals {
    pub fn from_items(items: &[CostItem]) -> Self {
        items.iter().fold(Self::default(), |acc, item| Self {
            self_pay: acc.self_pay + item.self_pay,
            pool_pay: acc.pool_pay + item.pool_pay,
            personal_pay: acc.personal_pay + item.personal_pay,
            total: acc.total + item.total(),
        })
    }

    fn is_zero(&self) -> bool {
        self.self_pay == 0.0 && self.pool_pay == 0.0 && self.personal_pay == 0.0 && self.total == 0.0
    }
}

/// User-editable fields of a visit record, used for create and full update.
///
/// There is no way to pass totals in: they are derived from `cost_items`
/// by the store on every write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordDraft {
    pub date: String,
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub doctor: Option<String>,
    #[serde(default)]
    pub visit_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medical_advice: Option<String>,
    #[serde(default)]
    pub cost_items: Vec<CostItem>,
    #[serde(default)]
    pub notes: String,
}

impl RecordDraft {
    pub fn totals(&self) -> CostTotals {
        CostTotals::from_items(&self.cost_items)
    }

    pub fn add_cost_item(&mut self, mut item: CostItem) -> i64 {
        let next_id = self.cost_items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        item.id = next_id;
        self.cost_items.push(item);
        next_id
    }

    pub fn remove_cost_item(&mut self, item_id: i64) -> bool {
        let before = self.cost_items.len();
        self.cost_items.retain(|i| i.id != item_id);
        self.cost_items.len() != before
    }
}

/// A stored visit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub date: String,
    #[serde(default)]
    pub hospital: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub doctor: Option<String>,
    #[serde(default)]
    pub visit_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medical_advice: Option<String>,
    #[serde(default)]
    pub cost_items: Vec<CostItem>,
    #[serde(flatten)]
    pub totals: CostTotals,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Record {
    /// Recompute totals from the line items.
    ///
    /// Records written before itemized costs existed carry totals with no
    /// items; those become a single line item first. A legacy grand total
    /// with no per-payer split is attributed to self-pay.
    pub fn normalize_costs(&mut self) {
        if self.cost_items.is_empty() && !self.totals.is_zero() {
            let legacy = self.totals;
            let mut item = CostItem {
                id: 1,
                self_pay: legacy.self_pay,
                pool_pay: legacy.pool_pay,
                personal_pay: legacy.personal_pay,
                attachment_id: None,
            };
            if item.total() == 0.0 {
                item.self_pay = legacy.total;
            }
            self.cost_items.push(item);
        }
        self.totals = CostTotals::from_items(&self.cost_items);
    }

    pub fn draft(&self) -> RecordDraft {
        RecordDraft {
            date: self.date.clone(),
            hospital: self.hospital.clone(),
            department: self.department.clone(),
            doctor: self.doctor.clone(),
            visit_type: self.visit_type.clone(),
            title: self.title.clone(),
            diagnosis: self.diagnosis.clone(),
            medical_advice: self.medical_advice.clone(),
            cost_items: self.cost_items.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// A record merged with its attachment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordWithAttachments {
    #[serde(flatten)]
    pub record: Record,
    pub attachments: Vec<Attachment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(s: f64, p: f64, a: f64) -> CostItem {
        CostItem {
            self_pay: s,
            pool_pay: p,
            personal_pay: a,
            ..Default::default()
        }
    }

    #[test]
    fn totals_sum_all_categories() {
        let totals = CostTotals::from_items(&[item(10.0, 20.0, 5.0), item(1.5, 0.0, 2.5)]);
        assert_eq!(totals.self_pay, 11.5);
        assert_eq!(totals.pool_pay, 20.0);
        assert_eq!(totals.personal_pay, 7.5);
        assert_eq!(totals.total, 39.0);
        assert_eq!(totals.total, totals.self_pay + totals.pool_pay + totals.personal_pay);
    }

    #[test]
    fn draft_totals_follow_item_edits() {
        let mut draft = RecordDraft::default();
        let first = draft.add_cost_item(item(10.0, 0.0, 0.0));
        draft.add_cost_item(item(0.0, 40.0, 0.0));
        assert_eq!(draft.totals().total, 50.0);

        draft.cost_items[1].personal_pay = 5.0;
        assert_eq!(draft.totals().total, 55.0);

        assert!(draft.remove_cost_item(first));
        assert_eq!(draft.totals().total, 45.0);
        assert!(!draft.remove_cost_item(first));
    }

    #[test]
    fn cost_item_ids_are_unique_within_draft() {
        let mut draft = RecordDraft::default();
        let a = draft.add_cost_item(item(1.0, 0.0, 0.0));
        let b = draft.add_cost_item(item(2.0, 0.0, 0.0));
        draft.remove_cost_item(a);
        let c = draft.add_cost_item(item(3.0, 0.0, 0.0));
        assert_ne!(b, c);
    }

    #[test]
    fn legacy_totals_become_single_item() {
        let mut record: Record = serde_json::from_value(json!({
            "id": 3,
            "date": "2023-01-01",
            "cost_total": "80",
            "cost_self": 30,
            "cost_pool": "50",
            "cost_personal": ""
        }))
        .unwrap();
        record.normalize_costs();
        assert_eq!(record.cost_items.len(), 1);
        assert_eq!(record.totals.total, 80.0);
        assert_eq!(record.totals.self_pay, 30.0);
    }

    #[test]
    fn legacy_total_without_split_counts_as_self_pay() {
        let mut record: Record = serde_json::from_value(json!({
            "id": 4,
            "date": "2023-01-01",
            "cost_total": 120
        }))
        .unwrap();
        record.normalize_costs();
        assert_eq!(record.totals.self_pay, 120.0);
        assert_eq!(record.totals.total, 120.0);
    }

    #[test]
    fn stale_totals_are_recomputed() {
        let mut record: Record = serde_json::from_value(json!({
            "id": 5,
            "date": "2023-01-01",
            "cost_items": [{"id": 1, "self_pay": "10", "pool_pay": 5, "personal_pay": null}],
            "cost_total": 999
        }))
        .unwrap();
        record.normalize_costs();
        assert_eq!(record.totals.total, 15.0);
    }

    #[test]
    fn record_json_exposes_flat_cost_fields() {
        let mut record: Record = serde_json::from_value(json!({"id": 1, "date": "2024-01-01"})).unwrap();
        record.cost_items.push(item(2.0, 3.0, 0.0));
        record.normalize_costs();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["cost_total"], json!(5.0));
        assert_eq!(value["cost_self"], json!(2.0));
    }
}
