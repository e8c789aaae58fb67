//! Domain transforms used by the predefined workflows.
//!
//! These shape scraped profile data into prompt-sized inputs and turn LLM
//! completions (parsed JSON or `{"content": text}`) into stable output
//! structures for the UI.

use nodes::NodeError;
use serde_json::{Map, Value, json};

pub const EXTRACT_PROFILE: &str = "extract-profile";
pub const ASSEMBLE_ANALYSIS: &str = "assemble-analysis";
pub const FORMAT_FLASHCARDS: &str = "format-flashcards";
pub const FORMAT_EMAIL: &str = "format-email";

/// How many experiences survive `extract-profile`.
const TOP_EXPERIENCES: usize = 3;
const TOP_POSTS: usize = 3;
const MAX_SKILLS: usize = 10;

// ---------------------------------------------------------------------------
// extract-profile
// ---------------------------------------------------------------------------

/// Reduce a scraped profile to the fields prompts need.
///
/// Keeps identity fields, the most relevant experiences and posts (inputs
/// are expected to be sorted already), and a bounded skill list. Fails if
/// the input is not an object.
pub fn extract_profile(input: Value) -> Result<Value, NodeError> {
    let Value::Object(profile) = input else {
        return Err(NodeError::failed("extract-profile expects a profile object"));
    };

    let text = |key: &str| profile.get(key).and_then(Value::as_str).unwrap_or_default();

    let experiences: Vec<Value> = array(&profile, "experiences")
        .iter()
        .take(TOP_EXPERIENCES)
        .map(|exp| {
            json!({
                "title": exp.get("title").cloned().unwrap_or(Value::Null),
                "company": exp.get("company").cloned().unwrap_or(Value::Null),
                "period": period(exp),
            })
        })
        .collect();

    let posts: Vec<Value> = array(&profile, "posts")
        .iter()
        .take(TOP_POSTS)
        .filter_map(|post| match post {
            Value::String(s) => Some(Value::String(s.clone())),
            other => other.get("text").cloned(),
        })
        .collect();

    let skills: Vec<Value> = array(&profile, "skills")
        .iter()
        .filter(|s| s.is_string())
        .take(MAX_SKILLS)
        .cloned()
        .collect();

    let mut out = Map::new();
    out.insert("name".into(), json!(text("name")));
    out.insert("headline".into(), json!(text("headline")));
    out.insert("about".into(), json!(text("about")));
    out.insert("experiences".into(), Value::Array(experiences));
    out.insert("posts".into(), Value::Array(posts));
    out.insert("skills".into(), Value::Array(skills));
    for key in ["targetRole", "senderName", "purpose", "company"] {
        if let Some(v) = profile.get(key) {
            out.insert(key.into(), v.clone());
        }
    }
    Ok(Value::Object(out))
}

fn array<'a>(map: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    map.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn period(exp: &Value) -> Value {
    let start = exp.get("startDate").and_then(Value::as_str);
    let end = exp.get("endDate").and_then(Value::as_str);
    match (start, end) {
        (Some(s), Some(e)) => json!(format!("{s} - {e}")),
        (Some(s), None) => json!(format!("{s} - present")),
        _ => exp.get("dates").cloned().unwrap_or(Value::Null),
    }
}

// ---------------------------------------------------------------------------
// assemble-analysis
// ---------------------------------------------------------------------------

/// Flatten fan-out results into `{section: [item, ...], warnings: [...]}`.
///
/// Each top-level key of the input is a section produced by one parallel
/// sub-node. Failed sub-nodes (`{"error": msg}`) yield an empty section and
/// a warning, so a single failed LLM call never fails the analysis.
pub fn assemble_analysis(input: Value) -> Result<Value, NodeError> {
    let Value::Object(sections) = input else {
        return Err(NodeError::failed("assemble-analysis expects an object of sections"));
    };

    let mut out = Map::new();
    let mut warnings = Vec::new();

    for (section, value) in sections {
        if let Some(err) = value.get("error").and_then(Value::as_str) {
            warnings.push(json!(format!("{section}: {err}")));
            out.insert(section, json!([]));
            continue;
        }
        let items = section_items(&section, &value);
        out.insert(section, Value::Array(items));
    }

    out.insert("warnings".into(), Value::Array(warnings));
    Ok(Value::Object(out))
}

fn section_items(section: &str, value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(text) => split_lines(text),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get(section).or_else(|| map.get("items")) {
                return items.clone();
            }
            if let Some(text) = map.get("content").and_then(Value::as_str) {
                return split_lines(text);
            }
            // Single-object answers become a one-item section.
            vec![value.clone()]
        }
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Non-empty lines with list markers (`-`, `*`, `•`, `1.`) removed.
fn split_lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(strip_marker)
        .filter(|line| !line.is_empty())
        .map(|line| Value::String(line.to_string()))
        .collect()
}

fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']);
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    let line = match line[digits..].strip_prefix(['.', ')']) {
        Some(rest) if digits > 0 => rest,
        _ => line,
    };
    line.trim()
}

// ---------------------------------------------------------------------------
// format-flashcards
// ---------------------------------------------------------------------------

/// Normalise flashcards to `{flashcards: [{question, answer}], count}`.
///
/// Accepts `{flashcards: [...]}`, `{cards: [...]}`, a bare array, or free
/// text with `Q:`/`A:` lines.
pub fn format_flashcards(input: Value) -> Result<Value, NodeError> {
    let cards: Vec<Value> = match &input {
        Value::Array(items) => items.iter().filter_map(card).collect(),
        Value::Object(map) => match map.get("flashcards").or_else(|| map.get("cards")) {
            Some(Value::Array(items)) => items.iter().filter_map(card).collect(),
            _ => map
                .get("content")
                .and_then(Value::as_str)
                .map(cards_from_text)
                .unwrap_or_default(),
        },
        Value::String(text) => cards_from_text(text),
        _ => Vec::new(),
    };

    Ok(json!({ "count": cards.len(), "flashcards": cards }))
}

fn card(item: &Value) -> Option<Value> {
    let question = item
        .get("question")
        .or_else(|| item.get("front"))
        .and_then(Value::as_str)?;
    let answer = item
        .get("answer")
        .or_else(|| item.get("back"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(json!({ "question": question.trim(), "answer": answer.trim() }))
}

fn cards_from_text(text: &str) -> Vec<Value> {
    let mut cards = Vec::new();
    let mut question: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if let Some(q) = strip_label(line, &["Q:", "Question:"]) {
            question = Some(q.to_string());
        } else if let Some(a) = strip_label(line, &["A:", "Answer:"]) {
            if let Some(q) = question.take() {
                cards.push(json!({ "question": q, "answer": a }));
            }
        }
    }
    cards
}

fn strip_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels
        .iter()
        .find_map(|label| line.strip_prefix(label))
        .map(str::trim)
}

// ---------------------------------------------------------------------------
// format-email
// ---------------------------------------------------------------------------

/// Normalise a drafted email to `{subject, body, wordCount}`.
///
/// Accepts `{subject, body}` or `{content: text}` where a leading
/// `Subject:` line becomes the subject.
pub fn format_email(input: Value) -> Result<Value, NodeError> {
    let (subject, body) = match (
        input.get("subject").and_then(Value::as_str),
        input.get("body").and_then(Value::as_str),
    ) {
        (subject, Some(body)) => (subject.unwrap_or_default().to_string(), body.to_string()),
        _ => {
            let text = input
                .get("content")
                .and_then(Value::as_str)
                .or_else(|| input.as_str())
                .ok_or_else(|| NodeError::failed("format-email found no draft to format"))?;
            split_subject(text)
        }
    };

    let body = body.trim().to_string();
    let word_count = body.split_whitespace().count();
    Ok(json!({
        "subject": subject.trim(),
        "body": body,
        "wordCount": word_count,
    }))
}

fn split_subject(text: &str) -> (String, String) {
    let text = text.trim();
    match text.split_once('\n') {
        Some((first, rest)) => match strip_label(first, &["Subject:", "subject:"]) {
            Some(subject) => (subject.to_string(), rest.to_string()),
            None => (String::new(), text.to_string()),
        },
        None => (String::new(), text.to_string()),
    }
}
