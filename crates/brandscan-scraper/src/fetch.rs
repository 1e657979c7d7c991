//! Plain HTTP fetcher for catalog pages.

use std::time::Duration;

use reqwest::Client;

use crate::error::ScraperError;
use crate::page::{decode_payload, PageResult};
use crate::retry::{is_retriable_status, retry_with_backoff, RetryPolicy};

/// A fully substituted URL plus transport hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Sent as `Authorization: Bearer <token>`.
    pub bearer: Option<String>,
}

impl FetchRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// `GET`-only HTTP fetcher with bounded retries.
///
/// One fetcher (and so one connection pool) is built per job and dropped
/// when the job ends.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, policy })
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches and decodes one page.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RetriableStatus`] or [`ScraperError::Http`] once the
    ///   retry budget is spent.
    /// - [`ScraperError::NotFound`] for 404 and [`ScraperError::UnexpectedStatus`]
    ///   for any other non-2xx status; neither is retried.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<PageResult, ScraperError> {
        let body = self.get_text(request).await?;
        Ok(PageResult::new(request.url.clone(), decode_payload(&body)))
    }

    /// Fetches the raw response body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch`].
    pub async fn get_text(&self, request: &FetchRequest) -> Result<String, ScraperError> {
        retry_with_backoff(self.policy, || async move {
            let mut builder = self
                .client
                .get(&request.url)
                .header(
                    reqwest::header::ACCEPT,
                    "application/json,text/html;q=0.9,*/*;q=0.8",
                )
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token);
            }

            let response = builder.send().await?;
            let status = response.status();

            if is_retriable_status(status.as_u16()) {
                return Err(ScraperError::RetriableStatus {
                    status: status.as_u16(),
                    url: request.url.clone(),
                });
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScraperError::NotFound {
                    url: request.url.clone(),
                });
            }
            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: request.url.clone(),
                });
            }

            Ok(response.text().await?)
        })
        .await
    }
}
