use crate::AuthorMention;
use serde_json::Value;

/// Author entry as dblp ships it: a bare string, or `{"text": ..., "@pid": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAuthor {
    Name(String),
    Structured { text: String, pid: Option<String> },
}

impl RawAuthor {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Name(s.clone())),
            Value::Object(_) => {
                let text = value
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let pid = value
                    .get("@pid")
                    .or_else(|| value.get("pid"))
                    .and_then(Value::as_str)
                    .map(String::from);
                Some(Self::Structured { text, pid })
            }
            Value::Number(n) => Some(Self::Name(n.to_string())),
            _ => None,
        }
    }

    /// Returns None when the entry has no usable display name.
    pub fn into_mention(self) -> Option<AuthorMention> {
        let mention = match self {
            Self::Name(name) => AuthorMention::new(&name, None),
            Self::Structured { text, pid } => AuthorMention::new(&text, pid.as_deref()),
        };
        if mention.name.is_empty() {
            None
        } else {
            Some(mention)
        }
    }
}

/// Pulls `result.hits.hit`, which dblp returns as an object for a single hit.
pub fn extract_hits(document: &Value) -> Vec<Value> {
    match document.pointer("/result/hits/hit") {
        Some(Value::Array(arr)) => arr.clone(),
        Some(hit @ Value::Object(_)) => vec![hit.clone()],
        _ => Vec::new(),
    }
}

/// Normalizes an `info.authors` node in source order, dropping nameless entries.
pub fn parse_authors(authors_node: &Value) -> Vec<AuthorMention> {
    let entries: Vec<&Value> = match authors_node.get("author") {
        Some(Value::Array(arr)) => arr.iter().collect(),
        Some(Value::Null) | None => return Vec::new(),
        Some(single) => vec![single],
    };

    entries
        .into_iter()
        .filter_map(RawAuthor::from_value)
        .filter_map(RawAuthor::into_mention)
        .collect()
}

pub fn info_str(info: &Value, field: &str) -> String {
    match info.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // venue is occasionally a list, e.g. ["SIGMETRICS", "Performance"]
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// `info.year` may be a number or a numeric string.
pub fn info_year(info: &Value) -> Option<i32> {
    match info.get("year") {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}
