//! Reply builders, one per intent. Pure functions over already-loaded data.

use chrono::{Datelike, NaiveDateTime};

use crate::models::{parse_record_date, Medication, Record};

pub const GREETING_REPLY: &str =
    "您好！我是您的就诊记录助手，可以帮您查询医疗花费、就诊次数、正在服用的药物和历史就诊记录。";

pub const HELP_REPLY: &str = "您可以这样问我：\n\
- 我一共花了多少钱？\n\
- 我去过几次医院？\n\
- 我正在吃什么药？\n\
- 最近一次看病是什么时候？\n\
- 我上次什么时候看过牙科？";

pub const UNKNOWN_REPLY: &str =
    "抱歉，我还不太理解您的问题。您可以问我花费、就诊次数、正在吃的药，或者“上次什么时候看过某科”。输入“帮助”查看更多示例。";

pub const ERROR_REPLY: &str = "抱歉，处理您的问题时出了点问题，请稍后再试。";

pub const NO_RECORDS_REPLY: &str = "您还没有任何就诊记录。";

pub const NO_ACTIVE_MEDICATIONS_REPLY: &str = "您目前没有正在进行的服药计划。";

pub const VAGUE_KEYWORD_REPLY: &str =
    "请说得具体一些，比如“我上次什么时候看过牙科？”";

/// Grand total and self-pay total across all records.
pub fn cost_summary(records: &[Record]) -> String {
    let (total, self_pay) = records.iter().fold((0.0_f64, 0.0_f64), |(t, s), r| {
        (t + finite(r.totals.total), s + finite(r.totals.self_pay))
    });
    format!(
        "根据您的记录，累计医疗总花费为 ¥{total:.2}，其中个人自付 ¥{self_pay:.2}。"
    )
}

fn finite(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

/// Record count, visits this calendar year and the most visited hospital.
///
/// Hospitals tie on count are resolved to the one seen first in `records`
/// order.
pub fn visit_summary(records: &[Record], now: NaiveDateTime) -> String {
    if records.is_empty() {
        return NO_RECORDS_REPLY.to_string();
    }

    let this_year = records
        .iter()
        .filter_map(|r| parse_record_date(&r.date))
        .filter(|d| d.year() == now.year())
        .count();

    let mut reply = format!(
        "您一共有 {} 条就诊记录，今年就诊 {} 次。",
        records.len(),
        this_year
    );
    if let Some((hospital, visits)) = most_visited_hospital(records) {
        reply.push_str(&format!("最常去的医院是{hospital}（{visits} 次）。"));
    }
    reply
}

fn most_visited_hospital(records: &[Record]) -> Option<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for record in records {
        let name = record.hospital.trim();
        if name.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(h, _)| *h == name) {
            Some((_, n)) => *n += 1,
            None => counts.push((name, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (hospital, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((hospital, n));
        }
    }
    best
}

/// Days from `now` until the start of the course's end date, rounded up,
/// never negative.
pub fn days_remaining(medication: &Medication, now: NaiveDateTime) -> i64 {
    let Some(course_end) = medication.end_date.and_hms_opt(0, 0, 0) else {
        return 0;
    };
    let seconds = (course_end - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 86_399) / 86_400
}

pub fn active_medications(medications: &[Medication], now: NaiveDateTime) -> String {
    if medications.is_empty() {
        return NO_ACTIVE_MEDICATIONS_REPLY.to_string();
    }

    let mut reply = format!("您目前正在服用 {} 种药物：", medications.len());
    for (i, med) in medications.iter().enumerate() {
        let details: Vec<&str> = [med.dosage.as_str(), med.frequency.as_str()]
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        reply.push_str(&format!("\n{}. {}", i + 1, med.name));
        if !details.is_empty() {
            reply.push_str(&format!("（{}）", details.join("，")));
        }
        reply.push_str(&format!("，还剩 {} 天", days_remaining(med, now)));
    }
    reply
}

/// Describe the first record; `records` is expected newest first.
pub fn most_recent(records: &[Record]) -> String {
    let Some(record) = records.first() else {
        return NO_RECORDS_REPLY.to_string();
    };
    format!(
        "您最近一次就诊是在 {}，{}{}，{}。",
        display_date(record),
        record.hospital,
        prefixed(&record.department),
        or_placeholder(&record.title)
    )
}

/// Newest record whose serialized form contains `keyword`, ignoring case.
pub fn keyword_search(records: &[Record], keyword: &str, now: NaiveDateTime) -> String {
    let needle = keyword.to_lowercase();
    let mut matches: Vec<&Record> = records
        .iter()
        .filter(|r| {
            serde_json::to_string(r)
                .map(|json| json.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .collect();
    matches.sort_by(|a, b| b.date.cmp(&a.date));

    let Some(record) = matches.first() else {
        return format!("没有找到与“{keyword}”相关的记录。");
    };
    format!(
        "您最近一次与“{}”相关的就诊是{}（{}），在{}{}：{}。\n[查看详情](/records/{})",
        keyword,
        relative_day(record, now),
        display_date(record),
        record.hospital,
        prefixed(&record.department),
        or_placeholder(&record.title),
        record.id
    )
}

fn relative_day(record: &Record, now: NaiveDateTime) -> String {
    let Some(date) = parse_record_date(&record.date) else {
        return "某天".to_string();
    };
    match (now.date() - date).num_days() {
        0 => "今天".to_string(),
        1 => "昨天".to_string(),
        n if n > 1 => format!("{n}天前"),
        n => format!("{}天后", -n),
    }
}

fn display_date(record: &Record) -> String {
    parse_record_date(&record.date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| record.date.clone())
}

fn prefixed(department: &str) -> String {
    if department.trim().is_empty() {
        String::new()
    } else {
        format!(" {department}")
    }
}

fn or_placeholder(title: &str) -> &str {
    if title.trim().is_empty() {
        "未填写诊断"
    } else {
        title
    }
}
