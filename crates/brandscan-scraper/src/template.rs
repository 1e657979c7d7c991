//! `{name}` URL templates from brand settings.

use std::collections::HashMap;
use std::sync::LazyLock;

use brandscan_core::LocaleDescriptor;
use regex::Regex;

use crate::error::ScraperError;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// Where the pager currently is; exposed to templates as `page`,
/// `page_number` (one-based), `offset`, `start`, `limit` and `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// Zero-based page index.
    pub index: usize,
    /// Zero-based item offset.
    pub offset: usize,
    /// Page size requested from the source.
    pub size: usize,
}

impl PageCursor {
    #[must_use]
    pub fn first(size: usize) -> Self {
        Self {
            index: 0,
            offset: 0,
            size,
        }
    }
}

/// Variables for one request.
///
/// Locale keys go in first; every cursor variable overrides a locale key of
/// the same name. Brands whose page size comes from the locale resolve it into
/// the cursor before paging, so a size probe can still shrink one request.
#[must_use]
pub fn template_vars(
    category_var: &str,
    category: &str,
    locale: &LocaleDescriptor,
    cursor: PageCursor,
) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = locale
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    vars.insert("category".to_string(), category.to_string());
    vars.insert(category_var.to_string(), category.to_string());
    vars.insert("page".to_string(), cursor.index.to_string());
    vars.insert("page_number".to_string(), (cursor.index + 1).to_string());
    vars.insert("offset".to_string(), cursor.offset.to_string());
    vars.insert("start".to_string(), cursor.offset.to_string());
    vars.insert("limit".to_string(), cursor.size.to_string());
    vars.insert("size".to_string(), cursor.size.to_string());
    vars
}

/// Substitutes every `{name}` in `template`.
///
/// # Errors
///
/// Returns [`ScraperError::UnresolvedTemplate`] naming the first placeholder
/// with no value; no partial URL is returned.
pub fn render_template(
    template: &str,
    vars: &HashMap<String, String>,
) -> Result<String, ScraperError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .get(name.as_str())
            .ok_or_else(|| ScraperError::UnresolvedTemplate {
                template: template.to_string(),
                variable: name.as_str().to_string(),
            })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale() -> LocaleDescriptor {
        LocaleDescriptor::new(vec![
            ("locale".to_string(), "en-us".to_string()),
            ("site_id".to_string(), "dg-us".to_string()),
            ("limit".to_string(), "60".to_string()),
        ])
    }

    #[test]
    fn substitutes_category_locale_and_cursor() {
        let vars = template_vars(
            "category",
            "bags",
            &locale(),
            PageCursor {
                index: 2,
                offset: 120,
                size: 60,
            },
        );
        let url = render_template(
            "https://api.example.com/{site_id}/{locale}/search?c={category}&offset={offset}&limit={limit}&page={page}",
            &vars,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.example.com/dg-us/en-us/search?c=bags&offset=120&limit=60&page=2"
        );
    }

    #[test]
    fn probe_size_overrides_locale_limit() {
        let vars = template_vars("category", "bags", &locale(), PageCursor::first(2));
        assert_eq!(vars["limit"], "2");
        assert_eq!(vars["size"], "2");
    }

    #[test]
    fn cursor_start_overrides_locale_start() {
        let locale = LocaleDescriptor::new(vec![("start".to_string(), "0".to_string())]);
        let vars = template_vars(
            "category",
            "coats",
            &locale,
            PageCursor {
                index: 1,
                offset: 48,
                size: 48,
            },
        );
        assert_eq!(vars["start"], "48");
        assert_eq!(vars["page_number"], "2");
    }

    #[test]
    fn custom_category_variable_is_also_bound() {
        let vars = template_vars(
            "clothing_category",
            "coats",
            &LocaleDescriptor::from_code("en"),
            PageCursor::first(24),
        );
        let url = render_template("https://x/{locale}/{clothing_category}", &vars).unwrap();
        assert_eq!(url, "https://x/en/coats");
    }

    #[test]
    fn unresolved_variable_is_an_error() {
        let vars = template_vars(
            "category",
            "bags",
            &LocaleDescriptor::from_code("en"),
            PageCursor::first(24),
        );
        let err = render_template("https://x/{country_code}/{category}", &vars).unwrap_err();
        assert!(matches!(
            err,
            ScraperError::UnresolvedTemplate { ref variable, .. } if variable == "country_code"
        ));
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        let url = render_template("https://x/static", &HashMap::new()).unwrap();
        assert_eq!(url, "https://x/static");
    }
}
