//! Page iteration for one (locale, category) pair.
//!
//! Each brand declares how its source reports the extent of a listing:
//!
//! - [`PaginationPolicy::SinglePage`]: one fetch, nothing else.
//! - [`PaginationPolicy::KnownPages`]: the first page carries a page count;
//!   exactly that many pages are fetched in total, page 0 included.
//! - [`PaginationPolicy::KnownTotal`]: the first page (or a small probe)
//!   carries an item total; offsets advance by the page size until the total
//!   is covered.
//! - [`PaginationPolicy::StopOnEmpty`]: pages are fetched until one comes
//!   back with no items.
//! - [`PaginationPolicy::RunningCount`]: like `KnownTotal`, but stops as soon
//!   as the rows collected so far reach the reported total. The total is
//!   latched from the first page that reports one.
//!
//! A zero or unparsable count on the first page means no further pages.
//! Every policy is capped at [`MAX_PAGES`] fetches.

use std::sync::LazyLock;

use async_trait::async_trait;
use brandscan_core::LocaleDescriptor;
use regex::Regex;
use serde_json::Value;

use crate::dataset::ProductRow;
use crate::error::ScraperError;
use crate::page::PageResult;
use crate::template::PageCursor;

/// Hard upper bound on fetches for one category to prevent infinite loops.
pub const MAX_PAGES: usize = 500;

static GROUPED_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:[,.]\d{3})+$").expect("valid regex"));

/// `1,234` and `1.234` read as thousands; `12.5` reads as 12.
fn parse_count(raw: &str) -> i64 {
    let trimmed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if GROUPED_DIGITS_RE.is_match(&trimmed) {
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        return digits.parse::<i64>().unwrap_or(0);
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            #[allow(clippy::cast_possible_truncation)]
            trimmed.parse::<f64>().ok().map(|f| f as i64)
        })
        .unwrap_or(0)
}

/// A numeric count read from a page by JSON pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalField {
    pub pointer: &'static str,
    /// Added to the raw value, for sources that report off-by-one counts.
    pub adjust: i64,
}

impl TotalField {
    #[must_use]
    pub const fn at(pointer: &'static str) -> Self {
        Self { pointer, adjust: 0 }
    }

    /// Reads the count. Numeric strings may carry thousands separators
    /// (`1,234` or `1.234`); decimals are truncated. Missing or unparsable
    /// values read as zero.
    #[must_use]
    pub fn read(&self, page: &PageResult) -> usize {
        let raw = match page.pointer(self.pointer) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    #[allow(clippy::cast_possible_truncation)]
                    n.as_f64().map(|f| f as i64)
                })
                .unwrap_or(0),
            Some(Value::String(s)) => parse_count(s),
            _ => 0,
        };
        usize::try_from(raw.saturating_add(self.adjust)).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPolicy {
    SinglePage,
    KnownPages {
        pages: TotalField,
    },
    KnownTotal {
        total: TotalField,
        /// Size of a throwaway request used only to read the total.
        probe: Option<usize>,
    },
    StopOnEmpty,
    RunningCount {
        total: TotalField,
    },
}

/// Items requested per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Fixed(usize),
    /// Read from a locale key, falling back to `default`.
    Locale {
        key: &'static str,
        default: usize,
    },
}

impl PageSize {
    #[must_use]
    pub fn resolve(&self, locale: &LocaleDescriptor) -> usize {
        match *self {
            PageSize::Fixed(n) => n.max(1),
            PageSize::Locale { key, default } => locale
                .get(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default.max(1)),
        }
    }
}

/// A fetched page and the rows extracted from it.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub page: PageResult,
    pub rows: Vec<ProductRow>,
}

/// Fetches and extracts one page for a given cursor.
#[async_trait]
pub trait PageSource: Send {
    async fn fetch_page(&mut self, cursor: PageCursor) -> Result<PageOutcome, ScraperError>;
}

#[derive(Debug, Default)]
pub struct PaginationReport {
    pub rows: Vec<ProductRow>,
    pub fetches: usize,
    pub empty_pages: usize,
}

struct Pager<'a, S: ?Sized> {
    source: &'a mut S,
    label: &'a str,
    report: PaginationReport,
}

impl<S: PageSource + ?Sized> Pager<'_, S> {
    async fn fetch(&mut self, cursor: PageCursor) -> Result<PageOutcome, ScraperError> {
        if self.report.fetches >= MAX_PAGES {
            return Err(ScraperError::PaginationLimit {
                url: self.label.to_string(),
                max_pages: MAX_PAGES,
            });
        }
        self.report.fetches += 1;
        self.source.fetch_page(cursor).await
    }

    /// Keeps the rows; returns `false` for an empty page.
    fn keep(&mut self, outcome: PageOutcome, cursor: PageCursor) -> bool {
        if outcome.rows.is_empty() {
            self.report.empty_pages += 1;
            tracing::debug!(
                label = %self.label,
                page = cursor.index,
                offset = cursor.offset,
                url = %outcome.page.url,
                "page returned no items"
            );
            return false;
        }
        self.report.rows.extend(outcome.rows);
        true
    }
}

/// Walks every page of one listing according to `policy`.
///
/// `label` identifies the listing in logs and in the pagination-limit error.
///
/// # Errors
///
/// Propagates any error from the source. Returns
/// [`ScraperError::PaginationLimit`] if more than [`MAX_PAGES`] fetches would
/// be needed.
pub async fn paginate<S: PageSource + ?Sized>(
    policy: &PaginationPolicy,
    page_size: usize,
    source: &mut S,
    label: &str,
) -> Result<PaginationReport, ScraperError> {
    let size = page_size.max(1);
    let mut pager = Pager {
        source,
        label,
        report: PaginationReport::default(),
    };

    match *policy {
        PaginationPolicy::SinglePage => {
            let cursor = PageCursor::first(size);
            let outcome = pager.fetch(cursor).await?;
            pager.keep(outcome, cursor);
        }
        PaginationPolicy::KnownPages { pages } => {
            let cursor = PageCursor::first(size);
            let first = pager.fetch(cursor).await?;
            let page_count = pages.read(&first.page);
            pager.keep(first, cursor);

            for index in 1..page_count {
                let cursor = PageCursor {
                    index,
                    offset: index * size,
                    size,
                };
                let outcome = pager.fetch(cursor).await?;
                pager.keep(outcome, cursor);
            }
        }
        PaginationPolicy::KnownTotal { total, probe } => {
            let mut offset = 0;
            let total_items = if let Some(probe_size) = probe {
                let outcome = pager.fetch(PageCursor::first(probe_size)).await?;
                total.read(&outcome.page)
            } else {
                let cursor = PageCursor::first(size);
                let first = pager.fetch(cursor).await?;
                let total_items = total.read(&first.page);
                pager.keep(first, cursor);
                offset = size;
                total_items
            };

            while offset < total_items {
                let cursor = PageCursor {
                    index: offset / size,
                    offset,
                    size,
                };
                let outcome = pager.fetch(cursor).await?;
                pager.keep(outcome, cursor);
                offset += size;
            }
        }
        PaginationPolicy::StopOnEmpty => {
            let mut index = 0;
            loop {
                let cursor = PageCursor {
                    index,
                    offset: index * size,
                    size,
                };
                let outcome = pager.fetch(cursor).await?;
                if !pager.keep(outcome, cursor) {
                    break;
                }
                index += 1;
            }
        }
        PaginationPolicy::RunningCount { total } => {
            let mut index = 0;
            let mut total_items = 0;
            loop {
                let cursor = PageCursor {
                    index,
                    offset: index * size,
                    size,
                };
                let outcome = pager.fetch(cursor).await?;
                let reported = total.read(&outcome.page);
                if reported > 0 {
                    total_items = reported;
                }
                if !pager.keep(outcome, cursor) || pager.report.rows.len() >= total_items {
                    break;
                }
                index += 1;
            }
        }
    }

    if pager.report.empty_pages > 0 {
        tracing::info!(
            label = %label,
            fetches = pager.report.fetches,
            empty_pages = pager.report.empty_pages,
            "listing had empty pages"
        );
    }

    Ok(pager.report)
}

#[cfg(test)]
#[path = "pagination_test.rs"]
mod tests;
