//! Operator alerting for dispatch and persistence failures.
//!
//! Alerts go out by email through the `SendGrid` v3 API when an API key and a
//! recipient are configured; otherwise they are only logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brandscan_core::ManagerConfig;
use serde_json::json;
use thiserror::Error;

pub const DISPATCH_ALERT_SUBJECT: &str = "Error - HTML Step";

const SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert delivery failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("alert rejected with HTTP {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait Alerter: Send + Sync {
    async fn send(&self, subject: &str, message: &str) -> Result<(), AlertError>;
}

/// Wraps a plain-text message in the alert email body; newlines become `<br>`.
#[must_use]
pub fn alert_html(message: &str) -> String {
    let message = message.replace('\n', "<br>");
    format!(
        "<html><body><div class=\"container\"><p>Message details:<br>{message}</p></div></body></html>"
    )
}

/// Body of the alert sent when the Agent does not accept a dispatch.
#[must_use]
pub fn dispatch_failure_message(job_id: i64, status: &str) -> String {
    format!("Request with job id {job_id} failed to send, Status: {status}")
}

#[derive(Debug, Clone)]
pub struct SendGridAlerter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
    to: String,
    cc: Option<String>,
}

impl SendGridAlerter {
    /// # Errors
    ///
    /// Returns [`AlertError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: String,
        from: String,
        to: String,
        cc: Option<String>,
    ) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: SENDGRID_BASE_URL.to_string(),
            api_key,
            from,
            to,
            cc,
        })
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn payload(&self, subject: &str, message: &str) -> serde_json::Value {
        let mut personalization = json!({ "to": [{ "email": self.to }] });
        if let Some(cc) = &self.cc {
            personalization["cc"] = json!([{ "email": cc }]);
        }
        json!({
            "personalizations": [personalization],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/html", "value": alert_html(message) }]
        })
    }
}

#[async_trait]
impl Alerter for SendGridAlerter {
    async fn send(&self, subject: &str, message: &str) -> Result<(), AlertError> {
        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.payload(subject, message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Rejected {
                status: status.as_u16(),
            });
        }
        tracing::info!(subject, to = %self.to, "alert email sent");
        Ok(())
    }
}

/// Used when email alerting is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn send(&self, subject: &str, message: &str) -> Result<(), AlertError> {
        tracing::error!(subject, message, "alert (email alerting not configured)");
        Ok(())
    }
}

/// Picks `SendGrid` when both an API key and a recipient are configured.
///
/// # Errors
///
/// Returns [`AlertError`] if the `SendGrid` client cannot be built.
pub fn alerter_from_config(config: &ManagerConfig) -> Result<Arc<dyn Alerter>, AlertError> {
    match (&config.sendgrid_api_key, &config.alert_to) {
        (Some(key), Some(to)) => Ok(Arc::new(SendGridAlerter::new(
            key.clone(),
            config.alert_from.clone(),
            to.clone(),
            config.alert_cc.clone(),
        )?)),
        _ => {
            tracing::warn!("SENDGRID_API_KEY or BRANDSCAN_ALERT_TO not set; alerts are logged only");
            Ok(Arc::new(LogAlerter))
        }
    }
}

/// Sends an alert, logging instead of failing when delivery does not work.
pub async fn send_best_effort(alerter: &dyn Alerter, subject: &str, message: &str) {
    if let Err(e) = alerter.send(subject, message).await {
        tracing::error!(error = %e, subject, message, "failed to deliver alert");
    }
}
