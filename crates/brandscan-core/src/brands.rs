use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigError;

/// One category to scan, with the URL template that applies to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
    /// Template from a category group; `None` means the brand's base template.
    pub url_template: Option<String>,
}

/// Opaque locale key/value pairs, order preserved as written in settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocaleDescriptor(Vec<(String, String)>);

impl LocaleDescriptor {
    #[must_use]
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// A descriptor holding only `{ "locale": code }`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        Self(vec![("locale".to_string(), code.to_string())])
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Short human-readable label used in logs.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(code) = self.get("locale") {
            return code.to_string();
        }
        self.0
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Resolved settings for one brand, fetched fresh for every job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandConfig {
    pub brand_id: String,
    pub base_url_template: Option<String>,
    pub categories: Vec<Category>,
    pub locales: Vec<LocaleDescriptor>,
}

impl BrandConfig {
    /// URL template for `category`: the group override, else the base template.
    #[must_use]
    pub fn template_for<'a>(&'a self, category: &'a Category) -> Option<&'a str> {
        category
            .url_template
            .as_deref()
            .or(self.base_url_template.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct RawBrandEntry {
    #[serde(rename = "Base_URL", default)]
    base_url: Option<String>,
    #[serde(rename = "Categories", default)]
    categories: Vec<RawCategory>,
    #[serde(rename = "Locales", default)]
    locales: Vec<RawLocale>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCategory {
    Name(String),
    Group {
        category_list: Vec<String>,
        #[serde(default)]
        base_url: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLocale {
    Code(String),
    Fields(serde_json::Map<String, Value>),
}

/// Parse the raw text of a settings document.
///
/// `context` names the source (a path or URL) for error messages.
///
/// # Errors
///
/// Returns `ConfigError::SettingsParse` if the text is not a valid document
/// or the top level is not an object.
pub fn parse_settings_document(
    content: &str,
    context: &str,
    yaml: bool,
) -> Result<Value, ConfigError> {
    let parse_err = |reason: String| ConfigError::SettingsParse {
        context: context.to_string(),
        reason,
    };

    let doc: Value = if yaml {
        // Round-trip through serde_yaml's own value so integer brand keys
        // become strings.
        let raw: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
        serde_json::to_value(raw).map_err(|e| parse_err(e.to_string()))?
    } else {
        serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?
    };

    if !doc.is_object() {
        return Err(parse_err("top level must be an object keyed by brand_id".to_string()));
    }
    Ok(doc)
}

/// Read a settings document from disk; `.yaml`/`.yml` files are parsed as YAML,
/// everything else as JSON.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed.
pub fn load_settings_file(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SettingsIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    parse_settings_document(&content, &path.display().to_string(), yaml)
}

/// Resolve one brand's entry from a parsed settings document.
///
/// # Errors
///
/// Returns `ConfigError::UnknownBrand` if the document has no entry for
/// `brand_id`, `SettingsParse` if the entry is malformed, and `Validation`
/// if a category has no URL template to fetch from.
pub fn resolve_brand(doc: &Value, brand_id: &str) -> Result<BrandConfig, ConfigError> {
    let entry = doc
        .get(brand_id)
        .ok_or_else(|| ConfigError::UnknownBrand(brand_id.to_string()))?;

    let raw: RawBrandEntry =
        serde_json::from_value(entry.clone()).map_err(|e| ConfigError::SettingsParse {
            context: format!("brand {brand_id}"),
            reason: e.to_string(),
        })?;

    let base_url_template = raw.base_url.filter(|u| !u.trim().is_empty());

    let mut categories = Vec::new();
    for raw_category in raw.categories {
        match raw_category {
            RawCategory::Name(name) => categories.push(Category {
                name,
                url_template: None,
            }),
            RawCategory::Group {
                category_list,
                base_url,
            } => {
                let template = base_url.filter(|u| !u.trim().is_empty());
                categories.extend(category_list.into_iter().map(|name| Category {
                    name,
                    url_template: template.clone(),
                }));
            }
        }
    }

    if base_url_template.is_none() {
        if let Some(orphan) = categories.iter().find(|c| c.url_template.is_none()) {
            return Err(ConfigError::Validation(format!(
                "brand {brand_id}: category '{}' has no URL template and no Base_URL is set",
                orphan.name
            )));
        }
    }

    let locales = raw
        .locales
        .into_iter()
        .map(|raw_locale| match raw_locale {
            RawLocale::Code(code) => LocaleDescriptor::from_code(&code),
            RawLocale::Fields(fields) => LocaleDescriptor::new(
                fields
                    .into_iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::String(s) => s,
                            Value::Null => String::new(),
                            other => other.to_string(),
                        };
                        (k, v)
                    })
                    .collect(),
            ),
        })
        .collect();

    Ok(BrandConfig {
        brand_id: brand_id.to_string(),
        base_url_template,
        categories,
        locales,
    })
}

#[cfg(test)]
#[path = "brands_test.rs"]
mod tests;
