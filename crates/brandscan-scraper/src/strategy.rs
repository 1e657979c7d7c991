//! Brand strategy: how one brand's catalog is fetched, paged and extracted.
//!
//! A strategy is data plus a shared driver. The driver walks every locale,
//! then every category within it, in the order given by the brand settings.
//! A failing category is logged and skipped; it never aborts its siblings.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use brandscan_core::{BrandConfig, Category, LocaleDescriptor};

use crate::dataset::{Dataset, ProductRow};
use crate::error::ScraperError;
use crate::extract::{Extractor, Scope};
use crate::fetch::{FetchRequest, HttpFetcher};
use crate::page::PageResult;
use crate::pagination::{paginate, PageOutcome, PageSize, PageSource, PaginationPolicy};
use crate::render::{
    capture_credential, CredentialSource, Interaction, RenderRequest, RenderedPageProvider,
};
use crate::template::{render_template, template_vars, PageCursor};

/// How pages are retrieved for a brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Plain `GET` of the templated URL.
    Http,
    /// Page rendered by the provider, with optional interactions.
    Rendered { interactions: Vec<Interaction> },
    /// Plain `GET` authorized by a bearer token captured from a rendered
    /// landing page. `landing_url` may use the same template variables as
    /// the listing URL.
    CredentialHttp(CredentialSource),
}

pub struct BrandStrategy {
    pub brand_id: &'static str,
    /// Used in artifact names and logs.
    pub name: &'static str,
    pub fetch: FetchMode,
    pub pagination: PaginationPolicy,
    pub page_size: PageSize,
    /// Extra template variable bound to the category name, besides `category`.
    pub category_var: &'static str,
    /// Extra template variable bound to a plain locale code when the locale
    /// descriptor has no key of that name.
    pub locale_var: &'static str,
    pub headers: Vec<(String, String)>,
    pub extractor: Box<dyn Extractor>,
}

impl std::fmt::Debug for BrandStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrandStrategy")
            .field("brand_id", &self.brand_id)
            .field("name", &self.name)
            .field("fetch", &self.fetch)
            .field("pagination", &self.pagination)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Per-job collaborators handed to a strategy run. Nothing here outlives the job.
pub struct ScanSession<'a> {
    pub fetcher: &'a HttpFetcher,
    pub renderer: &'a dyn RenderedPageProvider,
    pub credential_attempts: u32,
    pub inter_request_delay: Duration,
}

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub dataset: Dataset,
    pub fetches: usize,
    pub categories_scanned: usize,
    pub categories_failed: usize,
}

impl BrandStrategy {
    fn vars(
        &self,
        category: &str,
        locale: &LocaleDescriptor,
        cursor: PageCursor,
    ) -> HashMap<String, String> {
        let mut vars = template_vars(self.category_var, category, locale, cursor);
        if let Some(code) = locale.get("locale") {
            vars.entry(self.locale_var.to_string())
                .or_insert_with(|| code.to_string());
        }
        vars
    }

    /// Runs the locale × category loop and accumulates every row.
    pub async fn collect(&self, config: &BrandConfig, session: &ScanSession<'_>) -> ScanSummary {
        let mut summary = ScanSummary::default();

        if config.locales.is_empty() || config.categories.is_empty() {
            tracing::warn!(
                brand_id = %config.brand_id,
                locales = config.locales.len(),
                categories = config.categories.len(),
                "nothing to scan"
            );
            return summary;
        }

        for locale in &config.locales {
            for category in &config.categories {
                let label = format!("{}/{}", locale.label(), category.name);
                let mut fetches = 0;
                match self
                    .collect_category(config, category, locale, session, &mut fetches)
                    .await
                {
                    Ok(rows) => {
                        tracing::info!(
                            category = %label,
                            rows = rows.len(),
                            fetches,
                            "category scanned"
                        );
                        summary.categories_scanned += 1;
                        summary.dataset.extend(rows);
                    }
                    Err(e) => {
                        tracing::error!(
                            category = %label,
                            error = %e,
                            "category failed and was skipped"
                        );
                        summary.categories_failed += 1;
                    }
                }
                summary.fetches += fetches;
            }
        }

        summary
    }

    async fn collect_category(
        &self,
        config: &BrandConfig,
        category: &Category,
        locale: &LocaleDescriptor,
        session: &ScanSession<'_>,
        fetches: &mut usize,
    ) -> Result<Vec<ProductRow>, ScraperError> {
        let template = config
            .template_for(category)
            .ok_or_else(|| ScraperError::Extraction {
                reason: format!("no URL template for category {}", category.name),
            })?;
        let size = self.page_size.resolve(locale);

        let bearer = match &self.fetch {
            FetchMode::CredentialHttp(source) => {
                let vars = self.vars(&category.name, locale, PageCursor::first(size));
                let landing = CredentialSource {
                    landing_url: render_template(&source.landing_url, &vars)?,
                    interactions: source.interactions.clone(),
                };
                let token =
                    capture_credential(session.renderer, &landing, session.credential_attempts)
                        .await?;
                Some(token)
            }
            FetchMode::Http | FetchMode::Rendered { .. } => None,
        };

        let mut source = CategorySource {
            strategy: self,
            session,
            template,
            category: &category.name,
            locale,
            bearer,
            fetched: 0,
        };
        let label = format!("{} {}/{}", self.name, locale.label(), category.name);
        let result = paginate(&self.pagination, size, &mut source, &label).await;
        *fetches = source.fetched;

        Ok(result?.rows)
    }
}

/// Page source for one (locale, category) pair.
struct CategorySource<'a> {
    strategy: &'a BrandStrategy,
    session: &'a ScanSession<'a>,
    template: &'a str,
    category: &'a str,
    locale: &'a LocaleDescriptor,
    bearer: Option<String>,
    fetched: usize,
}

impl CategorySource<'_> {
    async fn fetch(&self, url: String) -> Result<PageResult, ScraperError> {
        match &self.strategy.fetch {
            FetchMode::Rendered { interactions } => {
                let request = RenderRequest {
                    url: url.clone(),
                    interactions: interactions.clone(),
                    capture_network: false,
                };
                let page = self.session.renderer.render(&request).await?;
                Ok(page.into_page_result(url))
            }
            FetchMode::Http | FetchMode::CredentialHttp(_) => {
                let request = FetchRequest {
                    url,
                    headers: self.strategy.headers.clone(),
                    bearer: self.bearer.clone(),
                };
                self.session.fetcher.fetch(&request).await
            }
        }
    }
}

#[async_trait]
impl PageSource for CategorySource<'_> {
    async fn fetch_page(&mut self, cursor: PageCursor) -> Result<PageOutcome, ScraperError> {
        if self.fetched > 0 && !self.session.inter_request_delay.is_zero() {
            tokio::time::sleep(self.session.inter_request_delay).await;
        }
        self.fetched += 1;

        let vars = self.strategy.vars(self.category, self.locale, cursor);
        let url = render_template(self.template, &vars)?;
        tracing::info!(
            brand = self.strategy.name,
            category = %self.category,
            page = cursor.index,
            offset = cursor.offset,
            url = %url,
            "fetching page"
        );

        let page = self.fetch(url).await?;
        let scope = Scope {
            category: self.category,
            locale: self.locale,
        };
        let rows = self.strategy.extractor.extract(&page, &scope)?;
        Ok(PageOutcome { page, rows })
    }
}
