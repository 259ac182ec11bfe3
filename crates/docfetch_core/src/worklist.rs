use serde_json::{Map, Value};

use crate::FailureKind;

/// A loosely-typed worklist entry as read from the input file.
pub type Record = Map<String, Value>;

/// Keys tried, in order, when resolving an item's code.
pub const CODE_ALIASES: &[&str] = &["product_code", "product", "code"];

/// Keys tried, in order, when resolving an item's source URL.
pub const URL_ALIASES: &[&str] = &["url", "link"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub code: String,
    pub url: String,
}

impl WorkItem {
    /// Resolve `code` and `url` through the alias tables.
    ///
    /// Fails with [`FailureKind::MissingFields`] when either one is absent or empty.
    pub fn from_record(record: &Record) -> Result<Self, FailureKind> {
        let code = resolve_field(record, CODE_ALIASES);
        let url = resolve_field(record, URL_ALIASES);
        match (code, url) {
            (Some(code), Some(url)) => Ok(Self { code, url }),
            _ => Err(FailureKind::MissingFields),
        }
    }
}

/// First non-empty value among `aliases`. Numbers are stringified; other
/// non-string values count as absent.
pub fn resolve_field(record: &Record, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(value_as_text)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
