//! Value normalization shared by every extractor.
//!
//! Strings are trimmed, other scalars pass through untouched, `//host/path`
//! asset URLs get an `https:` scheme, booleans become `"true"`/`"false"`, and
//! list-valued fields are flattened with [`LIST_SEPARATOR`].

use serde_json::Value;

pub const LIST_SEPARATOR: &str = " | ";

/// Trims string scalars; every other value is returned unchanged.
#[must_use]
pub fn normalize_scalar(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// Completes a protocol-relative URL with `https:`.
#[must_use]
pub fn complete_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// Prefixes a site-relative path with `origin`. Absolute and
/// protocol-relative URLs are completed instead; empty stays empty.
#[must_use]
pub fn absolutize(origin: &str, path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//") {
        return complete_url(path);
    }
    let origin = origin.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}

/// Lowercase `"true"`/`"false"` for booleans and boolean-like strings.
#[must_use]
pub fn flag(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::String(b.to_string()),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => {
            Value::String("true".to_string())
        }
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => {
            Value::String("false".to_string())
        }
        other => normalize_scalar(other),
    }
}

/// Flattens list items into one delimited string, completing asset URLs.
/// Empty items are dropped.
#[must_use]
pub fn join_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items
        .into_iter()
        .map(complete_url)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Scalar text of a value for list flattening; containers yield `None`.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
