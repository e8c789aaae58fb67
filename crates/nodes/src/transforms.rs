//! Named transform functions resolvable by `transform` nodes.
//!
//! The registry is built at engine construction time and may be extended by
//! the host. Transforms are pure: same input, same output, no I/O.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::NodeError;

pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value, NodeError> + Send + Sync>;

pub const CLEAN_TEXT: &str = "clean-text";
pub const NORMALIZE_DATES: &str = "normalize-dates";
pub const SORT_BY_RELEVANCE: &str = "sort-by-relevance";
pub const PASSTHROUGH: &str = "passthrough";

#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(CLEAN_TEXT, |v| Ok(clean_text(v)));
        registry.register(NORMALIZE_DATES, |v| Ok(normalize_dates(v)));
        registry.register(SORT_BY_RELEVANCE, |v| Ok(sort_by_relevance(v)));
        registry.register(PASSTHROUGH, Ok);
        registry
    }

    /// Register (or replace) a transform.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the named transform.
    ///
    /// # Errors
    /// [`NodeError::UnknownTransform`] if `name` is not registered, or
    /// whatever the transform itself returns.
    pub fn apply(&self, name: &str, input: Value) -> Result<Value, NodeError> {
        let f = self
            .get(name)
            .ok_or_else(|| NodeError::UnknownTransform(name.to_string()))?;
        f(input)
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// clean-text
// ---------------------------------------------------------------------------

/// Scraped-UI artifacts trailing a truncated text block.
const TRAILING_ARTIFACTS: &[&str] = &["…see more", "... see more", "...see more", "… see more", "…more"];

/// Collapse whitespace, drop zero-width/control characters, and strip
/// "see more" artifacts in every string, recursively.
pub fn clean_text(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_string(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_text).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clean_text(v)))
                .collect(),
        ),
        other => other,
    }
}

fn clean_string(s: &str) -> String {
    let visible: String = s
        .chars()
        .filter(|c| !matches!(c, '\u{200b}'..='\u{200d}' | '\u{feff}'))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let mut collapsed = visible.split_whitespace().collect::<Vec<_>>().join(" ");

    for artifact in TRAILING_ARTIFACTS {
        if collapsed.to_lowercase().ends_with(artifact) {
            let cut = collapsed.len() - artifact.len();
            if collapsed.is_char_boundary(cut) {
                collapsed.truncate(cut);
                collapsed = collapsed.trim_end().to_string();
            }
            break;
        }
    }
    collapsed
}

// ---------------------------------------------------------------------------
// normalize-dates
// ---------------------------------------------------------------------------

const DATE_KEYS: &[&str] = &["start", "end", "from", "to", "since", "until", "period"];

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

fn is_date_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("date") || DATE_KEYS.contains(&lower.as_str())
}

/// Rewrite values of date-like fields (`*date*`, `start`, `end`, ...) into
/// `YYYY-MM`, `YYYY` or `present`. Ranges such as `"Jan 2020 - Present"`
/// become `"2020-01 - present"`. Unrecognised values are left as-is.
pub fn normalize_dates(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_dates).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) if is_date_key(&k) => {
                            Value::String(normalize_date_range(&s).unwrap_or(s))
                        }
                        other => normalize_dates(other),
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

fn normalize_date_range(s: &str) -> Option<String> {
    let parts: Vec<&str> = s
        .split(['–', '—'])
        .flat_map(|p| p.split(" - "))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [single] => normalize_date(single),
        [from, to] => Some(format!("{} - {}", normalize_date(from)?, normalize_date(to)?)),
        _ => None,
    }
}

fn normalize_date(s: &str) -> Option<String> {
    let lower = s.trim().to_lowercase();
    if matches!(lower.as_str(), "present" | "current" | "now" | "today") {
        return Some("present".to_string());
    }

    // "2020" / "2020-01"
    if let Some(year) = parse_year(&lower) {
        return Some(year.to_string());
    }
    if let Some((y, m)) = lower.split_once('-') {
        if let (Some(year), Ok(month)) = (parse_year(y), m.parse::<u32>()) {
            if (1..=12).contains(&month) {
                return Some(format!("{year}-{month:02}"));
            }
        }
    }

    // "01/2020"
    if let Some((m, y)) = lower.split_once('/') {
        if let (Ok(month), Some(year)) = (m.trim().parse::<u32>(), parse_year(y.trim())) {
            if (1..=12).contains(&month) {
                return Some(format!("{year}-{month:02}"));
            }
        }
        return None;
    }

    // "Jan 2020" / "January 2020" / "Sept. 2020"
    let mut words = lower.split_whitespace();
    let (month_word, year_word) = (words.next()?, words.next()?);
    if words.next().is_some() {
        return None;
    }
    let month_word = month_word.trim_end_matches(['.', ',']);
    let month = MONTHS
        .iter()
        .find(|(prefix, _)| month_word.len() >= 3 && month_word.starts_with(prefix))
        .map(|&(_, m)| m)?;
    let year = parse_year(year_word)?;
    Some(format!("{year}-{month:02}"))
}

fn parse_year(s: &str) -> Option<u32> {
    if s.len() != 4 || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().filter(|y| (1900..=2100).contains(y))
}

// ---------------------------------------------------------------------------
// sort-by-relevance
// ---------------------------------------------------------------------------

const RANKED_KEYS: &[&str] = &["experiences", "items", "posts", "projects"];

/// Sort the ranked arrays of an object (`experiences`, `items`, `posts`,
/// `projects`) by descending `relevance`.
///
/// Items without a numeric `relevance` are scored by how many keywords from
/// `targetRole` and `keywords` occur in their text, and the score is
/// written back. A bare array is sorted by its items' existing scores.
pub fn sort_by_relevance(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(rank(items, &[])),
        Value::Object(mut map) => {
            let keywords = keywords_of(&map);
            for key in RANKED_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    map.insert((*key).to_string(), Value::Array(rank(items, &keywords)));
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn keywords_of(map: &Map<String, Value>) -> Vec<String> {
    let mut keywords: Vec<String> = map
        .get("targetRole")
        .and_then(Value::as_str)
        .map(|role| {
            role.split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() > 2)
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();

    if let Some(Value::Array(extra)) = map.get("keywords") {
        keywords.extend(extra.iter().filter_map(Value::as_str).map(str::to_lowercase));
    }
    keywords.sort();
    keywords.dedup();
    keywords
}

fn rank(items: Vec<Value>, keywords: &[String]) -> Vec<Value> {
    let mut scored: Vec<(f64, Value)> = items
        .into_iter()
        .map(|mut item| {
            let existing = item.get("relevance").and_then(Value::as_f64);
            let score = existing.unwrap_or_else(|| score_text(&item, keywords));
            if existing.is_none() && !keywords.is_empty() {
                if let Value::Object(map) = &mut item {
                    map.insert("relevance".to_string(), Value::from(score));
                }
            }
            (score, item)
        })
        .collect();

    // Stable: ties keep their scraped order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, item)| item).collect()
}

fn score_text(item: &Value, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let mut text = String::new();
    collect_text(item, &mut text);
    let text = text.to_lowercase();
    keywords.iter().filter(|k| text.contains(k.as_str())).count() as f64
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}
