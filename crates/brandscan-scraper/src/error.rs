use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transient HTTP status {status} from {url}")]
    RetriableStatus { status: u16, url: String },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON payload from {url}, got HTML")]
    UnexpectedPayload { url: String },

    #[error("template \"{template}\" has unresolved variable {{{variable}}}")]
    UnresolvedTemplate { template: String, variable: String },

    #[error("pagination limit reached for {url}: exceeded {max_pages} pages")]
    PaginationLimit { url: String, max_pages: usize },

    #[error("no bearer credential found in network traffic of {url}")]
    CredentialNotFound { url: String },

    #[error("no rendered page provider is configured")]
    RendererUnavailable,

    #[error("extraction failed: {reason}")]
    Extraction { reason: String },
}

impl ScraperError {
    /// Timeouts, connection failures, failures while sending, and 429/5xx
    /// responses. Builder and body-decode errors are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ScraperError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ScraperError::RetriableStatus { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_url_is_not_retried() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .expect_err("builder rejects a relative URL");
        let err = ScraperError::from(err);
        assert!(!err.is_transient());
    }

    #[test]
    fn retriable_status_is_transient_and_not_found_is_not() {
        assert!(ScraperError::RetriableStatus {
            status: 429,
            url: "https://shop.invalid".to_string(),
        }
        .is_transient());
        assert!(!ScraperError::NotFound {
            url: "https://shop.invalid".to_string(),
        }
        .is_transient());
    }
}
