use std::sync::LazyLock;

use regex::Regex;

/// Question categories the assistant can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Help,
    CostSummary,
    VisitCount,
    ActiveMedications,
    MostRecent,
    KeywordSearch,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Help => "help",
            Intent::CostSummary => "cost_summary",
            Intent::VisitCount => "visit_count",
            Intent::ActiveMedications => "active_medications",
            Intent::MostRecent => "most_recent",
            Intent::KeywordSearch => "keyword_search",
        }
    }
}

struct IntentRule {
    intent: Intent,
    patterns: Vec<Regex>,
}

/// Evaluated top to bottom; the first rule with any matching pattern wins.
static INTENT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    let rule = |intent, patterns: &[&str]| IntentRule {
        intent,
        patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
    };
    vec![
        rule(Intent::Greeting, &[r"(?i)^\s*(你好|您好|嗨|hi\b|hello\b)"]),
        rule(Intent::Help, &[r"(?i)帮助|你能做什么|怎么用|\bhelp\b"]),
        rule(Intent::CostSummary, &[r"花了|花费|花销|费用|多少钱|开销|医药费"]),
        rule(Intent::VisitCount, &[r"几次|多少次|次数|几条记录|多少条记录"]),
        rule(Intent::ActiveMedications, &[r"吃什么药|正在吃|在吃|服药|用药"]),
        rule(Intent::MostRecent, &[r"最近一次|最后一次|上一次"]),
        rule(Intent::KeywordSearch, &[r"什么时候|哪天|哪一天|何时"]),
    ]
});

/// First intent whose pattern matches the question.
pub fn match_intent(question: &str) -> Option<Intent> {
    INTENT_RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| p.is_match(question)))
        .map(|rule| rule.intent)
}
