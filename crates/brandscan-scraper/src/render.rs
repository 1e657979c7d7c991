//! Rendered page provider seam and bearer credential capture.
//!
//! Script-heavy storefronts are rendered by an external service; the agent
//! only sees `{content, captured_requests}`. The provider is owned by one job
//! and never shared across jobs.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;
use crate::page::{decode_payload, PageResult};
use crate::retry::{is_retriable_status, retry_with_backoff, RetryPolicy};

/// A UI interaction the provider performs after the page loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    ClickSelector { selector: String },
    ScrollToBottom,
    Wait { ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRequest {
    pub url: String,
    pub interactions: Vec<Interaction>,
    pub capture_network: bool,
}

impl RenderRequest {
    #[must_use]
    pub fn page(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interactions: Vec::new(),
            capture_network: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CapturedRequest {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RenderedPage {
    pub content: String,
    #[serde(default)]
    pub captured_requests: Vec<CapturedRequest>,
}

impl RenderedPage {
    /// Decodes the rendered content the same way a plain response is decoded.
    #[must_use]
    pub fn into_page_result(self, url: impl Into<String>) -> PageResult {
        PageResult::new(url, decode_payload(&self.content))
    }
}

#[async_trait]
pub trait RenderedPageProvider: Send + Sync {
    /// Renders one page.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the page cannot be rendered.
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, ScraperError>;
}

/// Headless render service reached over HTTP.
///
/// The request is POSTed as JSON; the service answers with a [`RenderedPage`].
/// Rendering has no side effects on the target site, so it is retried like a
/// plain `GET`.
#[derive(Debug, Clone)]
pub struct HttpRenderService {
    client: Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl HttpRenderService {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub fn new(
        endpoint: impl Into<String>,
        timeout_secs: u64,
        policy: RetryPolicy,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            policy,
        })
    }
}

#[async_trait]
impl RenderedPageProvider for HttpRenderService {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, ScraperError> {
        retry_with_backoff(self.policy, || async move {
            let response = self.client.post(&self.endpoint).json(request).send().await?;
            let status = response.status();

            if is_retriable_status(status.as_u16()) {
                return Err(ScraperError::RetriableStatus {
                    status: status.as_u16(),
                    url: request.url.clone(),
                });
            }
            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: request.url.clone(),
                });
            }

            let body = response.text().await?;
            serde_json::from_str::<RenderedPage>(&body).map_err(|e| ScraperError::Deserialize {
                context: format!("render service response for {}", request.url),
                source: e,
            })
        })
        .await
    }
}

/// Used when no render service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

#[async_trait]
impl RenderedPageProvider for NoRenderer {
    async fn render(&self, _request: &RenderRequest) -> Result<RenderedPage, ScraperError> {
        Err(ScraperError::RendererUnavailable)
    }
}

/// Landing page whose network traffic carries a bearer credential, and the
/// interactions that make the storefront issue an authorized request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    pub landing_url: String,
    pub interactions: Vec<Interaction>,
}

/// First `Authorization: Bearer <token>` value found in captured requests.
/// Header names and the scheme are matched case-insensitively.
#[must_use]
pub fn extract_bearer_token(requests: &[CapturedRequest]) -> Option<String> {
    requests.iter().find_map(|request| {
        request.headers.iter().find_map(|(name, value)| {
            if !name.eq_ignore_ascii_case("authorization") {
                return None;
            }
            let value = value.trim();
            let (scheme, token) = value.split_once(' ')?;
            let token = token.trim();
            (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty())
                .then(|| token.to_string())
        })
    })
}

/// Renders the landing page up to `attempts` rounds until a bearer token
/// shows up in its traffic.
///
/// # Errors
///
/// Returns [`ScraperError::CredentialNotFound`] when no round yields a token,
/// or the provider's own error if rendering fails.
pub async fn capture_credential(
    provider: &dyn RenderedPageProvider,
    source: &CredentialSource,
    attempts: u32,
) -> Result<String, ScraperError> {
    let request = RenderRequest {
        url: source.landing_url.clone(),
        interactions: source.interactions.clone(),
        capture_network: true,
    };

    let attempts = attempts.max(1);
    for round in 1..=attempts {
        let page = provider.render(&request).await?;
        if let Some(token) = extract_bearer_token(&page.captured_requests) {
            tracing::debug!(url = %source.landing_url, round, "captured bearer credential");
            return Ok(token);
        }
        tracing::warn!(
            url = %source.landing_url,
            round,
            attempts,
            captured = page.captured_requests.len(),
            "no bearer credential in captured traffic"
        );
    }

    Err(ScraperError::CredentialNotFound {
        url: source.landing_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn captured(headers: &[(&str, &str)]) -> CapturedRequest {
        CapturedRequest {
            url: "https://api.example.com/search".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn bearer_token_is_found_case_insensitively() {
        let requests = vec![
            captured(&[("accept", "application/json")]),
            captured(&[("AUTHORIZATION", "bearer abc.def")]),
        ];
        assert_eq!(extract_bearer_token(&requests).as_deref(), Some("abc.def"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let requests = vec![captured(&[("Authorization", "Basic dXNlcjpwYXNz")])];
        assert!(extract_bearer_token(&requests).is_none());
    }

    #[test]
    fn interactions_serialize_with_type_tag() {
        let value = serde_json::to_value(Interaction::ClickSelector {
            selector: "button.load-more".to_string(),
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "click_selector", "selector": "button.load-more"})
        );
        assert_eq!(
            serde_json::to_value(Interaction::ScrollToBottom).unwrap(),
            serde_json::json!({"type": "scroll_to_bottom"})
        );
    }

    struct CountingRenderer {
        calls: AtomicU32,
        token_on_round: u32,
    }

    #[async_trait]
    impl RenderedPageProvider for CountingRenderer {
        async fn render(&self, _request: &RenderRequest) -> Result<RenderedPage, ScraperError> {
            let round = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let captured_requests = if round == self.token_on_round {
                vec![captured(&[("Authorization", "Bearer t0k3n")])]
            } else {
                Vec::new()
            };
            Ok(RenderedPage {
                content: "<html></html>".to_string(),
                captured_requests,
            })
        }
    }

    fn source() -> CredentialSource {
        CredentialSource {
            landing_url: "https://www.example.com/en-us/bags".to_string(),
            interactions: vec![Interaction::ClickSelector {
                selector: "button.load-more".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn credential_found_on_second_round() {
        let renderer = CountingRenderer {
            calls: AtomicU32::new(0),
            token_on_round: 2,
        };
        let token = capture_credential(&renderer, &source(), 2).await.unwrap();
        assert_eq!(token, "t0k3n");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn credential_not_found_after_all_rounds() {
        let renderer = CountingRenderer {
            calls: AtomicU32::new(0),
            token_on_round: 0,
        };
        let err = capture_credential(&renderer, &source(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::CredentialNotFound { .. }));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_renderer_is_unavailable() {
        let err = NoRenderer
            .render(&RenderRequest::page("https://x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::RendererUnavailable));
    }
}
