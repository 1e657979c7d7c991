//! Page → product row extraction.
//!
//! Extractors are declared per brand as an ordered field list. Every field
//! missing from the source is written as an empty string.

use brandscan_core::LocaleDescriptor;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::dataset::ProductRow;
use crate::error::ScraperError;
use crate::normalize::{absolutize, complete_url, flag, join_list, normalize_scalar, scalar_text};
use crate::page::{PageResult, Payload};

/// Category and locale the page was fetched for.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub category: &'a str,
    pub locale: &'a LocaleDescriptor,
}

pub trait Extractor: Send + Sync {
    /// Maps one page to zero or more rows.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the page has the wrong payload kind or the
    /// extractor itself is misconfigured.
    fn extract(&self, page: &PageResult, scope: &Scope<'_>) -> Result<Vec<ProductRow>, ScraperError>;
}

fn empty() -> Value {
    Value::String(String::new())
}

fn context_value(field: &ContextField, scope: &Scope<'_>) -> Value {
    match field {
        ContextField::Category => Value::String(scope.category.to_string()),
        ContextField::Locale(key) => {
            Value::String(scope.locale.get(key).unwrap_or_default().to_string())
        }
    }
}

/// Values taken from the job rather than the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextField {
    Category,
    Locale(String),
}

// ---------------------------------------------------------------------------
// JSON items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonFieldKind {
    /// Scalar at a pointer; strings trimmed.
    Text(String),
    /// Boolean at a pointer as `"true"`/`"false"`.
    Flag(String),
    /// Asset URL at a pointer, `//` completed.
    Url(String),
    /// Site-relative link at a pointer, prefixed with an origin.
    Link { pointer: String, origin: String },
    /// Array at `pointer`; each element's `item` pointer (or the element
    /// itself when empty) joined with `" | "`.
    List { pointer: String, item: String },
    /// Value at a pointer without normalization; containers stay JSON.
    Raw(String),
    /// A string holding a JSON document, decoded. Undecodable text is kept.
    EmbeddedJson(String),
    /// Scalar at `pointer` inside the element of a sibling array (`items`,
    /// from the page root) with the same index as the current item.
    Parallel { items: String, pointer: String },
    Context(ContextField),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonField {
    pub name: String,
    pub kind: JsonFieldKind,
}

impl JsonField {
    /// Text field read from `/{name}`.
    #[must_use]
    pub fn text(name: &str) -> Self {
        Self::text_at(name, &format!("/{name}"))
    }

    #[must_use]
    pub fn text_at(name: &str, pointer: &str) -> Self {
        Self::new(name, JsonFieldKind::Text(pointer.to_string()))
    }

    /// Flag field read from `/{name}`.
    #[must_use]
    pub fn flag(name: &str) -> Self {
        Self::flag_at(name, &format!("/{name}"))
    }

    #[must_use]
    pub fn flag_at(name: &str, pointer: &str) -> Self {
        Self::new(name, JsonFieldKind::Flag(pointer.to_string()))
    }

    #[must_use]
    pub fn url_at(name: &str, pointer: &str) -> Self {
        Self::new(name, JsonFieldKind::Url(pointer.to_string()))
    }

    #[must_use]
    pub fn link_at(name: &str, pointer: &str, origin: &str) -> Self {
        Self::new(
            name,
            JsonFieldKind::Link {
                pointer: pointer.to_string(),
                origin: origin.to_string(),
            },
        )
    }

    #[must_use]
    pub fn list_at(name: &str, pointer: &str, item: &str) -> Self {
        Self::new(
            name,
            JsonFieldKind::List {
                pointer: pointer.to_string(),
                item: item.to_string(),
            },
        )
    }

    /// Raw field read from `/{name}`.
    #[must_use]
    pub fn raw(name: &str) -> Self {
        Self::raw_at(name, &format!("/{name}"))
    }

    #[must_use]
    pub fn raw_at(name: &str, pointer: &str) -> Self {
        Self::new(name, JsonFieldKind::Raw(pointer.to_string()))
    }

    #[must_use]
    pub fn embedded_json(name: &str) -> Self {
        Self::new(name, JsonFieldKind::EmbeddedJson(format!("/{name}")))
    }

    #[must_use]
    pub fn parallel(name: &str, items: &str, pointer: &str) -> Self {
        Self::new(
            name,
            JsonFieldKind::Parallel {
                items: items.to_string(),
                pointer: pointer.to_string(),
            },
        )
    }

    #[must_use]
    pub fn category(name: &str) -> Self {
        Self::new(name, JsonFieldKind::Context(ContextField::Category))
    }

    #[must_use]
    pub fn locale(name: &str, key: &str) -> Self {
        Self::new(
            name,
            JsonFieldKind::Context(ContextField::Locale(key.to_string())),
        )
    }

    fn new(name: &str, kind: JsonFieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    fn value(&self, item: &Value, root: &Value, index: usize, scope: &Scope<'_>) -> Value {
        match &self.kind {
            JsonFieldKind::Text(pointer) => item
                .pointer(pointer)
                .filter(|v| !v.is_null())
                .map_or_else(empty, normalize_scalar),
            JsonFieldKind::Flag(pointer) => item
                .pointer(pointer)
                .filter(|v| !v.is_null())
                .map_or_else(empty, flag),
            JsonFieldKind::Url(pointer) => item
                .pointer(pointer)
                .and_then(Value::as_str)
                .map_or_else(empty, |s| Value::String(complete_url(s))),
            JsonFieldKind::Link { pointer, origin } => item
                .pointer(pointer)
                .and_then(Value::as_str)
                .map_or_else(empty, |s| Value::String(absolutize(origin, s))),
            JsonFieldKind::List { pointer, item: sub } => {
                let Some(Value::Array(elements)) = item.pointer(pointer) else {
                    return empty();
                };
                let texts: Vec<String> = elements
                    .iter()
                    .filter_map(|element| {
                        let value = if sub.is_empty() {
                            Some(element)
                        } else {
                            element.pointer(sub)
                        };
                        value.and_then(scalar_text)
                    })
                    .collect();
                Value::String(join_list(texts.iter().map(String::as_str)))
            }
            JsonFieldKind::Raw(pointer) => item
                .pointer(pointer)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(empty),
            JsonFieldKind::EmbeddedJson(pointer) => match item.pointer(pointer) {
                Some(Value::String(s)) => {
                    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.trim().to_string()))
                }
                Some(Value::Null) | None => empty(),
                Some(other) => other.clone(),
            },
            JsonFieldKind::Parallel { items, pointer } => root
                .pointer(items)
                .and_then(|siblings| siblings.get(index))
                .and_then(|sibling| sibling.pointer(pointer))
                .filter(|v| !v.is_null())
                .map_or_else(empty, normalize_scalar),
            JsonFieldKind::Context(field) => context_value(field, scope),
        }
    }
}

/// Rows from a JSON array of items at `items` (a JSON pointer).
#[derive(Debug, Clone)]
pub struct JsonItemsExtractor {
    pub items: String,
    pub fields: Vec<JsonField>,
}

impl JsonItemsExtractor {
    #[must_use]
    pub fn new(items: &str, fields: Vec<JsonField>) -> Self {
        Self {
            items: items.to_string(),
            fields,
        }
    }
}

impl Extractor for JsonItemsExtractor {
    fn extract(&self, page: &PageResult, scope: &Scope<'_>) -> Result<Vec<ProductRow>, ScraperError> {
        let root = page.json()?;
        let Some(Value::Array(items)) = root.pointer(&self.items) else {
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.fields
                    .iter()
                    .map(|field| (field.name.clone(), field.value(item, root, index, scope)))
                    .collect()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// HTML product cards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlFieldKind {
    /// Trimmed text of the first match.
    Text { selector: String },
    /// Attribute of the first match, or of the card itself when `selector`
    /// is `None`.
    Attr {
        selector: Option<String>,
        attr: String,
    },
    /// Like `Attr`, prefixed with an origin when site-relative.
    Link {
        selector: String,
        attr: String,
        origin: String,
    },
    /// Attribute of every match, joined with `" | "`.
    AttrList { selector: String, attr: String },
    /// Image URLs of every match: each `srcset` candidate, else `src`, else
    /// `data-src`.
    Images { selector: String },
    /// JSON document held in one of the card's attributes; value at `pointer`.
    AttrJson { attr: String, pointer: String },
    Context(ContextField),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlField {
    pub name: String,
    pub kind: HtmlFieldKind,
}

impl HtmlField {
    #[must_use]
    pub fn text(name: &str, selector: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::Text {
                selector: selector.to_string(),
            },
        )
    }

    #[must_use]
    pub fn card_attr(name: &str, attr: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::Attr {
                selector: None,
                attr: attr.to_string(),
            },
        )
    }

    #[must_use]
    pub fn attr(name: &str, selector: &str, attr: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::Attr {
                selector: Some(selector.to_string()),
                attr: attr.to_string(),
            },
        )
    }

    #[must_use]
    pub fn link(name: &str, selector: &str, attr: &str, origin: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::Link {
                selector: selector.to_string(),
                attr: attr.to_string(),
                origin: origin.to_string(),
            },
        )
    }

    #[must_use]
    pub fn attr_list(name: &str, selector: &str, attr: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::AttrList {
                selector: selector.to_string(),
                attr: attr.to_string(),
            },
        )
    }

    #[must_use]
    pub fn images(name: &str, selector: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::Images {
                selector: selector.to_string(),
            },
        )
    }

    #[must_use]
    pub fn attr_json(name: &str, attr: &str, pointer: &str) -> Self {
        Self::new(
            name,
            HtmlFieldKind::AttrJson {
                attr: attr.to_string(),
                pointer: pointer.to_string(),
            },
        )
    }

    #[must_use]
    pub fn category(name: &str) -> Self {
        Self::new(name, HtmlFieldKind::Context(ContextField::Category))
    }

    fn new(name: &str, kind: HtmlFieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    fn value(&self, card: ElementRef<'_>, scope: &Scope<'_>) -> Result<Value, ScraperError> {
        let value = match &self.kind {
            HtmlFieldKind::Text { selector } => first(card, selector)?.map_or_else(empty, |el| {
                Value::String(el.text().collect::<String>().trim().to_string())
            }),
            HtmlFieldKind::Attr { selector, attr } => {
                let target = match selector {
                    Some(selector) => first(card, selector)?,
                    None => Some(card),
                };
                target
                    .and_then(|el| el.value().attr(attr))
                    .map_or_else(empty, |v| Value::String(v.trim().to_string()))
            }
            HtmlFieldKind::Link {
                selector,
                attr,
                origin,
            } => first(card, selector)?
                .and_then(|el| el.value().attr(attr))
                .map_or_else(empty, |v| Value::String(absolutize(origin, v))),
            HtmlFieldKind::AttrList { selector, attr } => {
                let selector = parse_selector(selector)?;
                let values: Vec<&str> = card
                    .select(&selector)
                    .filter_map(|el| el.value().attr(attr))
                    .map(str::trim)
                    .collect();
                Value::String(join_list(values))
            }
            HtmlFieldKind::Images { selector } => {
                let selector = parse_selector(selector)?;
                let mut urls: Vec<String> = Vec::new();
                for img in card.select(&selector) {
                    let attrs = img.value();
                    if let Some(srcset) = attrs.attr("srcset") {
                        urls.extend(
                            srcset
                                .split(',')
                                .filter_map(|candidate| candidate.split_whitespace().next())
                                .map(str::to_string),
                        );
                    } else if let Some(src) = attrs.attr("src").or_else(|| attrs.attr("data-src"))
                    {
                        urls.push(src.to_string());
                    }
                }
                Value::String(join_list(urls.iter().map(String::as_str)))
            }
            HtmlFieldKind::AttrJson { attr, pointer } => card
                .value()
                .attr(attr)
                .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                .and_then(|doc| doc.pointer(pointer).cloned())
                .filter(|v| !v.is_null())
                .map_or_else(empty, |v| normalize_scalar(&v)),
            HtmlFieldKind::Context(field) => context_value(field, scope),
        };
        Ok(value)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::Extraction {
        reason: format!("invalid selector \"{selector}\": {e}"),
    })
}

fn first<'a>(card: ElementRef<'a>, selector: &str) -> Result<Option<ElementRef<'a>>, ScraperError> {
    let selector = parse_selector(selector)?;
    Ok(card.select(&selector).next())
}

/// Rows from repeated product cards in a rendered storefront page.
#[derive(Debug, Clone)]
pub struct HtmlCardExtractor {
    pub card: String,
    pub fields: Vec<HtmlField>,
}

impl HtmlCardExtractor {
    #[must_use]
    pub fn new(card: &str, fields: Vec<HtmlField>) -> Self {
        Self {
            card: card.to_string(),
            fields,
        }
    }
}

impl Extractor for HtmlCardExtractor {
    fn extract(&self, page: &PageResult, scope: &Scope<'_>) -> Result<Vec<ProductRow>, ScraperError> {
        let Payload::Html(html) = &page.payload else {
            return Err(ScraperError::Extraction {
                reason: format!("expected an HTML document from {}", page.url),
            });
        };

        let document = Html::parse_document(html);
        let card_selector = parse_selector(&self.card)?;

        let mut rows = Vec::new();
        for card in document.select(&card_selector) {
            let mut row = ProductRow::new();
            for field in &self.fields {
                row.set(field.name.clone(), field.value(card, scope)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
