//! Agent-side job runtime: one dispatch in, one terminal [`JobResult`] out.
//!
//! Every job gets its own HTTP session, render client, job log and run code.
//! Nothing mutable is shared between concurrently running jobs; the callback
//! endpoint travels with the dispatch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use brandscan_core::{
    AgentConfig, BlobTarget, BrandConfig, ConfigError, JobDispatch, JobResult,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ScraperError;
use crate::fetch::HttpFetcher;
use crate::joblog::job_log_span;
use crate::publish::{
    dataset_file_name, log_file_name, BlobStore, DirectoryBlobStore, HttpBlobStore, HttpNotifier,
    PublishError, PublishRequest, Publisher,
};
use crate::render::{HttpRenderService, NoRenderer, RenderedPageProvider};
use crate::retry::RetryPolicy;
use crate::settings::{settings_source, SettingsSource};
use crate::strategies::StrategyRegistry;
use crate::strategy::{BrandStrategy, ScanSession};

/// Job-level failures. Category-level fetch errors never surface here; they
/// are logged and the scan moves on.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to prepare job workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build job session: {0}")]
    Session(#[from] ScraperError),

    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),
}

/// Identity of one run, fixed before anything is fetched.
struct JobRun {
    run_code: String,
    started_at: DateTime<Utc>,
    log_path: PathBuf,
}

pub struct JobRuntime {
    config: AgentConfig,
    registry: StrategyRegistry,
    settings: Arc<dyn SettingsSource>,
    publisher: Publisher,
}

impl JobRuntime {
    /// Wires the runtime from the Agent configuration with the built-in
    /// strategies.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] if the settings source, blob store or notifier
    /// cannot be constructed.
    pub fn from_config(config: AgentConfig) -> Result<Self, JobError> {
        let settings = settings_source(&config.settings, config.fetch_timeout_secs)?;
        let blobs: Arc<dyn BlobStore> = match &config.blob {
            BlobTarget::Http {
                endpoint,
                public_base,
                token,
            } => Arc::new(HttpBlobStore::new(
                endpoint,
                public_base,
                token.clone(),
                config.fetch_timeout_secs,
            )?),
            BlobTarget::Directory(dir) => Arc::new(DirectoryBlobStore::new(dir.clone())),
        };
        let notifier = Arc::new(HttpNotifier::new(config.fetch_timeout_secs)?);

        Ok(Self {
            config,
            registry: StrategyRegistry::builtin(),
            settings,
            publisher: Publisher::new(blobs, notifier),
        })
    }

    #[must_use]
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = publisher;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Runs one job to completion.
    ///
    /// The strategy and brand settings are resolved before anything is
    /// fetched; either failing aborts the job with no artifact.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Configuration`] for an unregistered brand or
    /// unusable settings, and [`JobError::Publish`] when any publishing step
    /// failed (cleanup and notification were still attempted).
    pub async fn run(&self, dispatch: &JobDispatch) -> Result<JobResult, JobError> {
        let started_at = Utc::now();
        let run_code = Uuid::new_v4().simple().to_string();
        let brand_id = dispatch.brand_id.trim();

        let strategy = self
            .registry
            .lookup(brand_id)
            .ok_or_else(|| ConfigError::UnregisteredBrand(brand_id.to_string()))?;
        let brand = self.settings.load(brand_id).await?;

        let work_dir = &self.config.work_dir;
        let log_path = work_dir.join(log_file_name(strategy.name, &run_code, started_at));
        std::fs::create_dir_all(work_dir)
            .and_then(|()| std::fs::File::create(&log_path))
            .map_err(|source| JobError::Workspace {
                path: work_dir.clone(),
                source,
            })?;

        let span = job_log_span(&log_path, strategy.name, &dispatch.job_id, &run_code);
        let run = JobRun {
            run_code,
            started_at,
            log_path,
        };
        self.scan_and_publish(dispatch, &strategy, &brand, run)
            .instrument(span)
            .await
    }

    async fn scan_and_publish(
        &self,
        dispatch: &JobDispatch,
        strategy: &BrandStrategy,
        brand: &BrandConfig,
        run: JobRun,
    ) -> Result<JobResult, JobError> {
        let JobRun {
            run_code,
            started_at,
            log_path,
        } = run;
        tracing::info!(
            categories = brand.categories.len(),
            locales = brand.locales.len(),
            "starting {} scan",
            strategy.name
        );
        if let Some(scan_url) = dispatch.scan_url.as_deref().filter(|u| !u.is_empty()) {
            tracing::info!(scan_url, "scan url on record");
        }

        let policy = RetryPolicy::new(
            self.config.fetch_max_attempts,
            self.config.fetch_backoff_factor_ms,
        );
        let fetcher = HttpFetcher::new(
            self.config.fetch_timeout_secs,
            &self.config.user_agent,
            policy,
        )?;
        let renderer: Box<dyn RenderedPageProvider> = match &self.config.render_service_url {
            Some(url) => Box::new(HttpRenderService::new(
                url.clone(),
                self.config.fetch_timeout_secs,
                policy,
            )?),
            None => Box::new(NoRenderer),
        };

        let session = ScanSession {
            fetcher: &fetcher,
            renderer: renderer.as_ref(),
            credential_attempts: self.config.credential_attempts,
            inter_request_delay: Duration::from_millis(self.config.inter_request_delay_ms),
        };
        let summary = strategy.collect(brand, &session).await;
        tracing::info!(
            rows = summary.dataset.len(),
            fetches = summary.fetches,
            categories_ok = summary.categories_scanned,
            categories_failed = summary.categories_failed,
            "scan finished"
        );

        let row_count = summary.dataset.len();
        let reported_count = self.config.count_convention.apply(row_count);
        let csv_path = self
            .config
            .work_dir
            .join(dataset_file_name(strategy.name, &run_code, started_at));

        let outcome = self
            .publisher
            .publish(PublishRequest {
                dataset: &summary.dataset,
                csv_path,
                log_path,
                callback_endpoint: dispatch.callback_endpoint.as_deref(),
                job_id: &dispatch.job_id,
                run_code: &run_code,
                started_at,
                reported_count,
            })
            .await?;

        Ok(JobResult {
            job_id: dispatch.job_id.clone(),
            run_code,
            result_url: outcome.artifact.remote_url,
            log_url: outcome.log_url,
            row_count,
            reported_count,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Starts `dispatch` as an independent background task. The task logs its
    /// terminal outcome; callers may await the handle or drop it.
    pub fn spawn(self: &Arc<Self>, dispatch: JobDispatch) -> JoinHandle<Result<JobResult, JobError>> {
        let runtime = Arc::clone(self);
        let span = tracing::info_span!(
            "job",
            job_id = %dispatch.job_id,
            brand_id = %dispatch.brand_id
        );
        tokio::spawn(
            async move {
                let result = runtime.run(&dispatch).await;
                match &result {
                    Ok(done) => tracing::info!(
                        run_code = %done.run_code,
                        rows = done.row_count,
                        count = done.reported_count,
                        result_url = %done.result_url,
                        "job completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "job failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}
