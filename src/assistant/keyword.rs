/// Stop-words and verb prefixes removed from a "when did I last..." question
/// to leave the thing being asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRules {
    particles: Vec<String>,
    verb_prefixes: Vec<String>,
}

const DEFAULT_PARTICLES: &[&str] = &[
    "什么时候", "最后一次", "上一次", "哪一天", "上次", "最近", "哪天", "何时", "一下",
    "我", "是", "的", "了", "过吗", "吗", "呢", "啊", "呀", "？", "?", "。", "，", ",", "！", "!",
];

const DEFAULT_VERB_PREFIXES: &[&str] = &[
    "看过", "看", "去过", "去", "做过", "做", "拿过", "拿", "开过", "开", "查过", "查", "到", "在",
];

impl KeywordRules {
    /// Build rules from custom lists. Longer entries are tried first so
    /// `上一次` is removed whole rather than leaving `一次` behind.
    pub fn new<P, V>(particles: P, verb_prefixes: V) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            particles: longest_first(particles),
            verb_prefixes: longest_first(verb_prefixes),
        }
    }

    /// Isolate the keyword: drop every particle anywhere in the question,
    /// then strip leading verbs until none is left. May return an empty
    /// string.
    pub fn extract(&self, question: &str) -> String {
        let mut text = question.trim().to_string();
        for particle in &self.particles {
            text = text.replace(particle.as_str(), "");
        }

        let mut rest = text.trim();
        'strip: loop {
            for prefix in &self.verb_prefixes {
                if let Some(stripped) = rest.strip_prefix(prefix.as_str()) {
                    rest = stripped.trim_start();
                    continue 'strip;
                }
            }
            break;
        }
        rest.trim().to_string()
    }
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_PARTICLES.iter().copied(),
            DEFAULT_VERB_PREFIXES.iter().copied(),
        )
    }
}

fn longest_first<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut list: Vec<String> = items
        .into_iter()
        .map(Into::into)
        .filter(|s: &String| !s.is_empty())
        .collect();
    list.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    list
}
