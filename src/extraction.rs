//! Field extraction from OCR text.
//!
//! The OCR service returns raw text for receipts and prescriptions; these
//! parsers pull out the numbers and phrases the forms need. They are
//! heuristics: anything not found is left empty or zero.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{CostItem, MedicationDraft, MAX_COURSE_DAYS};

const POOL_KEYWORDS: &[&str] = &["统筹", "基金支付"];
const PERSONAL_KEYWORDS: &[&str] = &["账户支付", "个账", "个人账户"];
const SELF_KEYWORDS: &[&str] = &["自费", "现金", "个人支付"];

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+?(?:胶囊|片|颗粒|口服液|注射液|软膏|滴眼液|喷雾剂|丸|乳膏|膏))").unwrap()
});
static DOSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?\s?(?:mg|μg|ug|ml|g|克|毫升|毫克))").unwrap()
});
static PER_DOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:每次|一次)\s?(\d+(?:\.\d+)?\s?(?:粒|片|袋|支|滴|丸|mg|ml|g|克|毫升|毫克))")
        .unwrap()
});
static PER_DOSE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\s?(?:粒|片|袋|支|滴|丸))").unwrap());
static FREQUENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:每天|每日|一日)\s?(\d+|[一二两三四五六])|(\d+))\s?次").unwrap()
});
static USAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(饭[前后]|睡前|晨起|需要时|空腹|餐[前后])").unwrap());
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:用药|共|连续|疗程)\s?(\d+)\s?[天日])|(?:(\d+)\s?天)").unwrap()
});

/// Read self-pay, pool-pay and personal-account amounts from receipt text.
///
/// For each payer, the first line mentioning one of its keywords and
/// containing a number supplies the last number on that line.
pub fn parse_cost_receipt(text: &str) -> CostItem {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let item = CostItem {
        self_pay: find_amount(&lines, SELF_KEYWORDS),
        pool_pay: find_amount(&lines, POOL_KEYWORDS),
        personal_pay: find_amount(&lines, PERSONAL_KEYWORDS),
        ..Default::default()
    };
    if item.total() == 0.0 {
        tracing::warn!(lines = lines.len(), "No payment amounts found in receipt text");
    }
    item
}

fn find_amount(lines: &[&str], keywords: &[&str]) -> f64 {
    lines
        .iter()
        .filter(|line| keywords.iter().any(|k| line.contains(k)))
        .find_map(|line| AMOUNT.find_iter(line).last())
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Medication fields recognised in prescription text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrescriptionFields {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub per_dose: Option<String>,
    /// Normalised to `每日N次`.
    pub frequency: Option<String>,
    /// Default reminder times for 1 to 4 doses a day.
    pub times: Vec<String>,
    pub usage: Option<String>,
    pub duration_days: Option<u32>,
}

impl PrescriptionFields {
    /// Copy every recognised field onto a draft, leaving the rest as is.
    pub fn apply_to(&self, draft: &mut MedicationDraft) {
        if let Some(name) = &self.name {
            draft.name = name.clone();
        }
        if let Some(dosage) = &self.dosage {
            draft.dosage = dosage.clone();
        }
        if let Some(per_dose) = &self.per_dose {
            draft.per_dose = per_dose.clone();
        }
        if let Some(frequency) = &self.frequency {
            draft.frequency = frequency.clone();
        }
        if !self.times.is_empty() {
            draft.times = self.times.clone();
        }
        if self.usage.is_some() {
            draft.usage = self.usage.clone();
        }
        if let Some(days) = self.duration_days {
            draft.duration_days = days;
        }
    }
}

fn first_group(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub fn parse_prescription(text: &str) -> PrescriptionFields {
    let mut fields = PrescriptionFields {
        name: first_group(&NAME, text),
        dosage: first_group(&DOSAGE, text),
        per_dose: first_group(&PER_DOSE, text).or_else(|| first_group(&PER_DOSE_COUNT, text)),
        usage: first_group(&USAGE, text).map(|u| format!("{u}服用")),
        ..Default::default()
    };

    if let Some(doses) = FREQUENCY
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| dose_count(m.as_str()))
    {
        fields.frequency = Some(format!("每日{doses}次"));
        fields.times = default_times(doses);
    }

    fields.duration_days = DURATION
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|d| (1..=MAX_COURSE_DAYS).contains(d));

    fields
}

fn dose_count(raw: &str) -> Option<u32> {
    match raw {
        "一" => Some(1),
        "二" | "两" => Some(2),
        "三" => Some(3),
        "四" => Some(4),
        "五" => Some(5),
        "六" => Some(6),
        digits => digits.parse().ok(),
    }
    .filter(|n| *n > 0)
}

/// Reminder times for a daily dose count; empty above four.
pub fn default_times(doses: u32) -> Vec<String> {
    let times: &[&str] = match doses {
        1 => &["08:00"],
        2 => &["08:00", "20:00"],
        3 => &["08:00", "13:00", "19:00"],
        4 => &["08:00", "12:00", "16:00", "20:00"],
        _ => &[],
    };
    times.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn receipt_amounts_by_payer() {
        let text = "上海市医疗收费票据\n\
                    医保统筹支付 1,234.50\n\
                    个人账户支付：56.7\n\
                    现金支付 12 元 合计 30.00\n";
        let item = parse_cost_receipt(text);
        assert_eq!(item.pool_pay, 1234.5);
        assert_eq!(item.personal_pay, 56.7);
        assert_eq!(item.self_pay, 30.0);
    }

    #[test]
    fn receipt_skips_keyword_lines_without_numbers() {
        let text = "统筹基金\n统筹支付 88\n统筹支付 99";
        assert_eq!(parse_cost_receipt(text).pool_pay, 88.0);
    }

    #[test]
    fn receipt_without_amounts_is_zero() {
        let item = parse_cost_receipt("门诊病历\n请妥善保管");
        assert_eq!(item.total(), 0.0);
    }

    #[test]
    fn prescription_fields() {
        let text = "阿莫西林胶囊 0.25g\n用法：每次2粒 每日3次 饭后\n共7天";
        let fields = parse_prescription(text);
        assert_eq!(fields.name.as_deref(), Some("阿莫西林胶囊"));
        assert_eq!(fields.dosage.as_deref(), Some("0.25g"));
        assert_eq!(fields.per_dose.as_deref(), Some("2粒"));
        assert_eq!(fields.frequency.as_deref(), Some("每日3次"));
        assert_eq!(fields.times, vec!["08:00", "13:00", "19:00"]);
        assert_eq!(fields.usage.as_deref(), Some("饭后服用"));
        assert_eq!(fields.duration_days, Some(7));
    }

    #[test]
    fn chinese_numeral_frequency() {
        let fields = parse_prescription("布洛芬缓释片 一日两次 睡前");
        assert_eq!(fields.frequency.as_deref(), Some("每日2次"));
        assert_eq!(fields.times, vec!["08:00", "20:00"]);
        assert_eq!(fields.usage.as_deref(), Some("睡前服用"));
    }

    #[test]
    fn dates_are_not_durations() {
        let fields = parse_prescription("开具日期 2024年5月10日\n维生素C片 每日1次");
        assert_eq!(fields.duration_days, None);
        assert_eq!(fields.times, vec!["08:00"]);
    }

    #[test]
    fn implausible_duration_is_ignored() {
        assert_eq!(parse_prescription("维生素C片 共99999999天").duration_days, None);
        assert_eq!(parse_prescription("维生素C片 共0天").duration_days, None);
        assert_eq!(
            parse_prescription(&format!("维生素C片 共{MAX_COURSE_DAYS}天")).duration_days,
            Some(MAX_COURSE_DAYS)
        );
    }

    #[test]
    fn scanned_prescription_with_absurd_duration_still_saves() {
        let conn = crate::db::open_memory_database().unwrap();
        let mut draft = MedicationDraft {
            name: String::new(),
            dosage: String::new(),
            per_dose: String::new(),
            frequency: String::new(),
            usage: None,
            times: Vec::new(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            duration_days: 7,
            status: None,
            linked_record_id: None,
            notes: String::new(),
        };
        parse_prescription("维生素C片 共99999999天").apply_to(&mut draft);
        assert_eq!(draft.duration_days, 7);
        let id = crate::db::add_medication(&conn, &draft).unwrap();
        let stored = crate::db::get_medication(&conn, id).unwrap().unwrap();
        assert_eq!(stored.name, "维生素C片");
    }

    #[test]
    fn more_than_four_doses_have_no_default_times() {
        let fields = parse_prescription("滴眼液 每日6次");
        assert_eq!(fields.frequency.as_deref(), Some("每日6次"));
        assert!(fields.times.is_empty());
    }

    #[test]
    fn apply_to_keeps_unrecognised_fields() {
        let mut draft = MedicationDraft {
            name: "手填".into(),
            dosage: String::new(),
            per_dose: String::new(),
            frequency: "每日1次".into(),
            usage: None,
            times: vec!["09:00".into()],
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            duration_days: 5,
            status: None,
            linked_record_id: None,
            notes: "备注".into(),
        };
        parse_prescription("0.5g 共10天").apply_to(&mut draft);
        assert_eq!(draft.name, "手填");
        assert_eq!(draft.dosage, "0.5g");
        assert_eq!(draft.duration_days, 10);
        assert_eq!(draft.times, vec!["09:00"]);
        assert_eq!(draft.notes, "备注");
    }
}
