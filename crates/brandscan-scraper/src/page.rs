//! Decoded page payloads.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::ScraperError;

/// Raw decoded content of one fetched page.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Html(String),
}

/// One fetched page and the URL it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub url: String,
    pub payload: Payload,
}

impl PageResult {
    #[must_use]
    pub fn new(url: impl Into<String>, payload: Payload) -> Self {
        Self {
            url: url.into(),
            payload,
        }
    }

    /// The JSON payload, or `UnexpectedPayload` if the page decoded as HTML.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnexpectedPayload`] for HTML pages.
    pub fn json(&self) -> Result<&Value, ScraperError> {
        match &self.payload {
            Payload::Json(value) => Ok(value),
            Payload::Html(_) => Err(ScraperError::UnexpectedPayload {
                url: self.url.clone(),
            }),
        }
    }

    /// Looks up a JSON pointer; `None` for HTML pages or missing paths.
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        match &self.payload {
            Payload::Json(value) => value.pointer(pointer),
            Payload::Html(_) => None,
        }
    }
}

/// Decodes a response body or rendered document.
///
/// JSON bodies decode directly, including a JSON string that itself holds a
/// JSON document. A rendered document that wraps JSON in `<pre>` (a browser
/// JSON viewer) or as its whole body text also decodes as JSON. Anything else
/// stays HTML.
#[must_use]
pub fn decode_payload(text: &str) -> Payload {
    if let Some(value) = parse_json_document(text) {
        return Payload::Json(value);
    }

    let trimmed = text.trim_start();
    if trimmed.starts_with('<') {
        if let Some(value) = json_inside_html(trimmed) {
            return Payload::Json(value);
        }
    }

    Payload::Html(text.to_string())
}

fn parse_json_document(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed.starts_with('"')) {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed).ok()? {
        Value::String(inner) => {
            let inner = inner.trim();
            if inner.starts_with('{') || inner.starts_with('[') {
                serde_json::from_str(inner).ok()
            } else {
                None
            }
        }
        value => Some(value),
    }
}

fn json_inside_html(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);

    if let Ok(pre) = Selector::parse("pre") {
        if let Some(element) = document.select(&pre).next() {
            let text: String = element.text().collect();
            if let Some(value) = parse_json_document(&text) {
                return Some(value);
            }
        }
    }

    let body = Selector::parse("body").ok()?;
    let text: String = document.select(&body).next()?.text().collect();
    parse_json_document(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_decodes() {
        assert_eq!(
            decode_payload(r#"{"numberOfPages": 2}"#),
            Payload::Json(json!({"numberOfPages": 2}))
        );
    }

    #[test]
    fn json_encoded_as_string_decodes_twice() {
        let body = serde_json::to_string(r#"{"data": {"count": 3}}"#).unwrap();
        assert_eq!(
            decode_payload(&body),
            Payload::Json(json!({"data": {"count": 3}}))
        );
    }

    #[test]
    fn json_in_pre_tag_decodes() {
        let html = r#"<html><head></head><body><pre style="word-wrap: break-word;">{"products": {"items": []}}</pre></body></html>"#;
        assert_eq!(
            decode_payload(html),
            Payload::Json(json!({"products": {"items": []}}))
        );
    }

    #[test]
    fn json_as_body_text_decodes() {
        let html = r#"<html><body>{"data": {"count": 0, "products": []}}</body></html>"#;
        assert_eq!(
            decode_payload(html),
            Payload::Json(json!({"data": {"count": 0, "products": []}}))
        );
    }

    #[test]
    fn ordinary_html_stays_html() {
        let html = "<html><body><article class=\"item\">Bag</article></body></html>";
        assert!(matches!(decode_payload(html), Payload::Html(_)));
    }

    #[test]
    fn json_accessor_rejects_html() {
        let page = PageResult::new("https://x", Payload::Html("<p>".to_string()));
        assert!(matches!(
            page.json(),
            Err(ScraperError::UnexpectedPayload { .. })
        ));
        assert!(page.pointer("/a").is_none());
    }
}
