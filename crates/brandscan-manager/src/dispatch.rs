//! Forwards submitted jobs to the Agent.
//!
//! A job is marked `dispatched` before the Agent is called so that a fast
//! completion callback always finds it in the state it expects. Any failure
//! after that point marks the job `failed` and alerts an operator.

use std::sync::Arc;
use std::time::Duration;

use brandscan_core::{ManagerConfig, ScanJob};
use brandscan_db::DbError;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::alert::{dispatch_failure_message, send_best_effort, Alerter, DISPATCH_ALERT_SUBJECT};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("agent rejected job {job_id} with HTTP {status}")]
    Rejected { job_id: i64, status: u16 },

    #[error("agent request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DispatchError {
    /// Status text used in the operator alert.
    fn status_text(&self) -> String {
        match self {
            DispatchError::Rejected { status, .. } => status.to_string(),
            DispatchError::Transport(e) if e.is_timeout() => "timeout".to_string(),
            DispatchError::Transport(_) => "unreachable".to_string(),
            DispatchError::Db(DbError::NotFound) => "endpoint not configured".to_string(),
            DispatchError::Db(_) => "database error".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AgentDispatchQuery<'a> {
    job_id: i64,
    brand_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_url: Option<&'a str>,
    send_out_endpoint_local: &'a str,
}

pub struct Dispatcher {
    pool: PgPool,
    client: reqwest::Client,
    dispatch_endpoint_id: i32,
    callback_endpoint_id: i32,
    alerter: Arc<dyn Alerter>,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(
        pool: PgPool,
        config: &ManagerConfig,
        alerter: Arc<dyn Alerter>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.dispatch_timeout_secs))
            .build()?;
        Ok(Self {
            pool,
            client,
            dispatch_endpoint_id: config.dispatch_endpoint_id,
            callback_endpoint_id: config.callback_endpoint_id,
            alerter,
        })
    }

    pub fn alerter(&self) -> &dyn Alerter {
        self.alerter.as_ref()
    }

    /// Runs [`Dispatcher::dispatch`] as a background task, in a span that is
    /// a child of the caller's.
    pub fn spawn(self: &Arc<Self>, job_id: i64) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        let span = tracing::info_span!("dispatch", job_id);
        tokio::spawn(
            async move {
                if let Err(e) = dispatcher.dispatch(job_id).await {
                    tracing::error!(error = %e, "dispatch failed");
                }
            }
            .instrument(span),
        )
    }

    /// Moves the job to `submitted`, then hands it to the Agent.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the job cannot be (re)submitted or the
    /// Agent does not accept it. In the second case the job is already marked
    /// `failed` and an alert has been sent.
    pub async fn dispatch(&self, job_id: i64) -> Result<(), DispatchError> {
        // A job that is already dispatched keeps running; nothing is failed here.
        let job = brandscan_db::mark_job_submitted(&self.pool, job_id).await?;

        match self.forward(&job).await {
            Ok(()) => {
                tracing::info!(job_id, brand_id = %job.brand_id, "job dispatched to agent");
                Ok(())
            }
            Err(err) => {
                self.record_failure(job_id, &err).await;
                Err(err)
            }
        }
    }

    async fn forward(&self, job: &ScanJob) -> Result<(), DispatchError> {
        let agent = brandscan_db::fetch_endpoint(&self.pool, self.dispatch_endpoint_id).await?;
        let callback = brandscan_db::fetch_endpoint(&self.pool, self.callback_endpoint_id).await?;

        brandscan_db::mark_job_dispatched(&self.pool, job.job_id).await?;

        let query = AgentDispatchQuery {
            job_id: job.job_id,
            brand_id: &job.brand_id,
            scan_url: job.scan_url.as_deref(),
            send_out_endpoint_local: &callback,
        };
        let response = self
            .client
            .post(format!("{agent}/run_html"))
            .query(&query)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                job_id: job.job_id,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn record_failure(&self, job_id: i64, err: &DispatchError) {
        if let Err(e) = brandscan_db::fail_scan_job(&self.pool, job_id, &err.to_string()).await {
            tracing::warn!(job_id, error = %e, "could not mark job failed");
        }
        send_best_effort(
            self.alerter.as_ref(),
            DISPATCH_ALERT_SUBJECT,
            &dispatch_failure_message(job_id, &err.status_text()),
        )
        .await;
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
