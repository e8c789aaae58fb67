//! `{{key}}` placeholder templates.
//!
//! Templates are parsed once into literal and placeholder segments and
//! rendered against a node's JSON input. Placeholder keys may be dotted
//! paths (`{{profile.name}}`). Anything between braces that is not a valid
//! key is kept as literal text.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Vec<String>),
}

/// How placeholder values are turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Every value is JSON-stringified (strings keep their quotes).
    Json,
    /// Strings are inserted raw; other values are JSON-stringified.
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                break;
            };

            let key = after_open[..close].trim();
            literal.push_str(&rest[..open]);

            match parse_key(key) {
                Some(path) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(path));
                }
                None => {
                    literal.push_str(&rest[open..open + 2 + close + 2]);
                }
            }
            rest = &after_open[close + 2..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Dotted placeholder keys in order of appearance.
    pub fn placeholders(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(path) => Some(path.join(".")),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// The template is a single placeholder with no surrounding text.
    fn sole_placeholder(&self) -> Option<&[String]> {
        match self.segments.as_slice() {
            [Segment::Placeholder(path)] => Some(path),
            _ => None,
        }
    }

    /// Render against `input`. Placeholders whose key is absent render as
    /// an empty string.
    pub fn render(&self, input: &Value, style: RenderStyle) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(path) => {
                    if let Some(value) = lookup(input, path) {
                        out.push_str(&stringify(value, style));
                    }
                }
            }
        }
        out
    }
}

fn parse_key(key: &str) -> Option<Vec<String>> {
    if key.is_empty() {
        return None;
    }
    let parts: Vec<String> = key.split('.').map(str::to_string).collect();
    let valid = parts.iter().all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    });
    valid.then_some(parts)
}

/// Resolve a dotted path inside `value`. Numeric segments index arrays.
pub fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn stringify(value: &Value, style: RenderStyle) -> String {
    match (style, value) {
        (RenderStyle::Plain, Value::String(s)) => s.clone(),
        _ => value.to_string(),
    }
}

/// Substitute placeholders throughout a JSON body template.
///
/// A string that consists of exactly one placeholder is replaced by the
/// referenced value itself, keeping its JSON type. Other strings are
/// rendered in [`RenderStyle::Plain`]. Object keys are left untouched.
pub fn render_value(template: &Value, input: &Value) -> Value {
    match template {
        Value::String(source) => {
            let parsed = Template::parse(source);
            if let Some(path) = parsed.sole_placeholder() {
                return lookup(input, path).cloned().unwrap_or(Value::Null);
            }
            Value::String(parsed.render(input, RenderStyle::Plain))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, input)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, input)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}
