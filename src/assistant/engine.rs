use chrono::{Local, NaiveDateTime};

use super::handlers;
use super::intents::{match_intent, Intent};
use super::keyword::KeywordRules;
use super::{AssistantError, RecordSource};

/// Fallback trigger: questions mentioning records get the visit summary.
const RECORDS_WORD: &str = "记录";

/// Words that name a visit in general rather than something specific.
/// A "last time" question left with only these is about the newest record.
const GENERIC_VISIT_WORDS: &[&str] = &[
    "看医生", "看病", "就诊", "医院", "医生", "一次", "情况", "什么", "怎么样", "病",
];

fn names_subject(keyword: &str) -> bool {
    let rest = GENERIC_VISIT_WORDS
        .iter()
        .fold(keyword.to_string(), |text, word| text.replace(word, ""));
    !rest.trim().is_empty()
}

/// Rule-based question answering over locally stored records.
///
/// Every question gets exactly one reply string. Source failures are logged
/// and turned into a generic apology.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    rules: KeywordRules,
}

impl QueryEngine {
    pub fn new(rules: KeywordRules) -> Self {
        Self { rules }
    }

    /// Answer `question` against `source` using the current local time.
    pub fn answer(&self, source: &dyn RecordSource, question: &str) -> String {
        self.answer_at(source, question, Local::now().naive_local())
    }

    /// Answer `question` as if asked at `now`.
    pub fn answer_at(
        &self,
        source: &dyn RecordSource,
        question: &str,
        now: NaiveDateTime,
    ) -> String {
        let intent = match_intent(question)
            .or_else(|| question.contains(RECORDS_WORD).then_some(Intent::VisitCount))
            .map(|intent| match intent {
                // "When did I last do X" asks about X, not the newest visit.
                Intent::MostRecent if names_subject(&self.rules.extract(question)) => {
                    Intent::KeywordSearch
                }
                other => other,
            });
        let Some(intent) = intent else {
            tracing::debug!("No intent matched");
            return handlers::UNKNOWN_REPLY.to_string();
        };

        tracing::debug!(intent = intent.as_str(), "Intent matched");
        match self.respond(intent, source, question, now) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(intent = intent.as_str(), error = %e, "Intent handler failed");
                handlers::ERROR_REPLY.to_string()
            }
        }
    }

    fn respond(
        &self,
        intent: Intent,
        source: &dyn RecordSource,
        question: &str,
        now: NaiveDateTime,
    ) -> Result<String, AssistantError> {
        let reply = match intent {
            Intent::Greeting => handlers::GREETING_REPLY.to_string(),
            Intent::Help => handlers::HELP_REPLY.to_string(),
            Intent::CostSummary => handlers::cost_summary(&source.records()?),
            Intent::VisitCount => handlers::visit_summary(&source.records()?, now),
            Intent::ActiveMedications => {
                handlers::active_medications(&source.active_medications()?, now)
            }
            Intent::MostRecent => {
                let mut records = source.records()?;
                records.sort_by(|a, b| b.date.cmp(&a.date));
                handlers::most_recent(&records)
            }
            Intent::KeywordSearch => {
                let keyword = self.rules.extract(question);
                if keyword.is_empty() {
                    handlers::VAGUE_KEYWORD_REPLY.to_string()
                } else {
                    handlers::keyword_search(&source.records()?, &keyword, now)
                }
            }
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{CostItem, Medication, MedicationDraft, Record, RecordDraft};
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    struct BrokenSource;

    impl RecordSource for BrokenSource {
        fn records(&self) -> Result<Vec<Record>, AssistantError> {
            Err(AssistantError::Source("disk unplugged".into()))
        }

        fn active_medications(&self) -> Result<Vec<Medication>, AssistantError> {
            Err(AssistantError::Source("disk unplugged".into()))
        }
    }

    fn add(conn: &rusqlite::Connection, date: &str, hospital: &str, dept: &str, cost: f64, own: f64) {
        let mut draft = RecordDraft {
            date: date.into(),
            hospital: hospital.into(),
            department: dept.into(),
            title: format!("{dept}就诊"),
            ..Default::default()
        };
        draft.add_cost_item(CostItem {
            self_pay: own,
            pool_pay: cost - own,
            ..Default::default()
        });
        db::add_record(conn, &draft, &[]).unwrap();
    }

    fn store() -> rusqlite::Connection {
        let conn = db::open_memory_database().unwrap();
        add(&conn, "2024-03-01", "华山医院", "牙科", 100.0, 20.0);
        add(&conn, "2023-11-20", "瑞金医院", "内科", 50.0, 0.0);
        conn
    }

    #[test]
    fn cost_question_reports_both_totals() {
        let reply = QueryEngine::default().answer_at(&store(), "我一共花了多少钱？", now());
        assert!(reply.contains("150.00"), "{reply}");
        assert!(reply.contains("20.00"), "{reply}");
    }

    #[test]
    fn no_active_medications() {
        let reply = QueryEngine::default().answer_at(&store(), "正在吃什么药", now());
        assert!(reply.contains("没有正在进行的服药计划"), "{reply}");
    }

    #[test]
    fn active_medication_listed() {
        let conn = store();
        db::add_medication(
            &conn,
            &MedicationDraft {
                name: "布洛芬".into(),
                dosage: "0.3g".into(),
                per_dose: "1粒".into(),
                frequency: "每日两次".into(),
                usage: None,
                times: vec!["08:00".into(), "20:00".into()],
                start_date: now().date() - Duration::days(1),
                duration_days: 5,
                status: None,
                linked_record_id: None,
                notes: String::new(),
            },
        )
        .unwrap();
        let reply = QueryEngine::default().answer_at(&conn, "我在吃哪些药", now());
        assert!(reply.contains("布洛芬"), "{reply}");
        assert!(reply.contains("还剩 3 天"), "{reply}");
    }

    #[test]
    fn keyword_question_links_record() {
        let reply =
            QueryEngine::default().answer_at(&store(), "我上次什么时候看过牙科？", now());
        assert!(reply.contains("华山医院"), "{reply}");
        assert!(reply.contains("70天前"), "{reply}");
        assert!(reply.contains("[查看详情](/records/"), "{reply}");
    }

    #[test]
    fn keyword_question_without_keyword_asks_for_detail() {
        let reply = QueryEngine::default().answer_at(&store(), "我什么时候去过？", now());
        assert_eq!(reply, handlers::VAGUE_KEYWORD_REPLY);
    }

    #[test]
    fn most_recent_record() {
        let reply = QueryEngine::default().answer_at(&store(), "最近一次看病是哪天", now());
        assert!(reply.contains("2024-03-01"), "{reply}");
    }

    #[test]
    fn last_time_question_about_a_subject_searches_for_it() {
        let conn = store();
        let mut gastroscopy = RecordDraft {
            date: "2024-01-01".into(),
            hospital: "中山医院".into(),
            department: "消化内科".into(),
            title: "胃镜检查".into(),
            ..Default::default()
        };
        gastroscopy.add_cost_item(CostItem::default());
        db::add_record(&conn, &gastroscopy, &[]).unwrap();

        let engine = QueryEngine::default();
        for question in ["上一次做胃镜是哪天", "我最后一次看胃镜是什么时候"] {
            let reply = engine.answer_at(&conn, question, now());
            assert!(reply.contains("中山医院"), "{question}: {reply}");
            assert!(!reply.contains("华山医院"), "{question}: {reply}");
        }

        // Without a subject the newest visit is still the answer.
        for question in ["最近一次看病是什么时候", "上一次看病是什么情况", "最后一次就诊"] {
            let reply = engine.answer_at(&conn, question, now());
            assert!(reply.contains("2024-03-01"), "{question}: {reply}");
        }
    }

    #[test]
    fn subject_detection_ignores_generic_visit_words() {
        assert!(!names_subject(""));
        assert!(!names_subject("一次看病"));
        assert!(!names_subject("病什么情况"));
        assert!(names_subject("胃镜"));
        assert!(names_subject("心脏病"));
    }

    #[test]
    fn records_word_falls_back_to_visit_summary() {
        let reply = QueryEngine::default().answer_at(&store(), "看看我的记录", now());
        assert!(reply.contains("2 条就诊记录"), "{reply}");
        assert!(reply.contains("今年就诊 1 次"), "{reply}");
    }

    #[test]
    fn unknown_question() {
        let reply = QueryEngine::default().answer_at(&store(), "明天会下雨吗", now());
        assert_eq!(reply, handlers::UNKNOWN_REPLY);
    }

    #[test]
    fn canned_replies_need_no_records() {
        let engine = QueryEngine::default();
        assert_eq!(engine.answer_at(&BrokenSource, "你好", now()), handlers::GREETING_REPLY);
        assert_eq!(engine.answer_at(&BrokenSource, "帮助", now()), handlers::HELP_REPLY);
    }

    #[test]
    fn source_failure_becomes_apology() {
        let engine = QueryEngine::default();
        for question in ["花了多少钱", "去过几次医院", "正在吃什么药", "上次什么时候看过牙科"] {
            assert_eq!(
                engine.answer_at(&BrokenSource, question, now()),
                handlers::ERROR_REPLY
            );
        }
    }

    #[test]
    fn help_examples_route_to_their_intents() {
        let engine = QueryEngine::default();
        let conn = store();
        for line in handlers::HELP_REPLY.lines().skip(1) {
            let question = line.trim_start_matches("- ");
            let reply = engine.answer_at(&conn, question, now());
            assert_ne!(reply, handlers::UNKNOWN_REPLY, "{question}");
            assert_ne!(reply, handlers::ERROR_REPLY, "{question}");
        }
    }
}
