//! Output publishing: dataset artifact, blob upload, log upload, local
//! cleanup and the completion notification, in that order.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::{QuoteStyle, WriterBuilder};
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::dataset::{cell_text, Dataset};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("completion notification to {endpoint} failed: {reason}")]
    Notify { endpoint: String, reason: String },
}

/// The published dataset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub local_path: PathBuf,
    /// Empty when the upload failed.
    pub remote_url: String,
    pub row_count: usize,
    pub sha256: String,
}

/// `{brand}_output_{%m_%d_%Y}_{run_code}.csv`
#[must_use]
pub fn dataset_file_name(brand: &str, run_code: &str, at: DateTime<Utc>) -> String {
    format!("{brand}_output_{}_{run_code}.csv", at.format("%m_%d_%Y"))
}

/// `{brand}_{run_code}_{%d_%m_%Y}.log`
#[must_use]
pub fn log_file_name(brand: &str, run_code: &str, at: DateTime<Utc>) -> String {
    format!("{brand}_{run_code}_{}.log", at.format("%d_%m_%Y"))
}

/// Writes `dataset` as a fully quoted CSV with the union of all columns in
/// first-seen order. Missing cells are empty. An empty dataset produces an
/// empty file. Returns the file's SHA-256 as lowercase hex.
///
/// # Errors
///
/// Returns [`PublishError`] if the file cannot be created or written.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<String, PublishError> {
    let columns = dataset.columns();
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)?;

    if !columns.is_empty() {
        writer.write_record(&columns)?;
        for row in dataset.rows() {
            writer.write_record(
                columns
                    .iter()
                    .map(|column| row.get(column).map(cell_text).unwrap_or_default()),
            )?;
        }
    }
    writer.flush().map_err(|e| PublishError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    drop(writer);

    let bytes = std::fs::read(path).map_err(|e| PublishError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Removes a local artifact. A file that is already gone is not an error.
///
/// # Errors
///
/// Returns any other I/O error from the removal.
pub fn remove_local(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Blob stores
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads the file at `local` under `key` and returns its public URL.
    async fn upload(&self, local: &Path, key: &str, content_type: &str)
        -> Result<String, PublishError>;
}

/// Path-addressable HTTP object store: `PUT {endpoint}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    public_base: String,
    token: Option<String>,
}

impl HttpBlobStore {
    /// # Errors
    ///
    /// Returns [`PublishError::Upload`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        public_base: &str,
        token: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PublishError::Upload {
                key: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(
        &self,
        local: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<String, PublishError> {
        let body = tokio::fs::read(local).await.map_err(|e| PublishError::Io {
            path: local.to_path_buf(),
            source: e,
        })?;
        let digest = format!("{:x}", Sha256::digest(&body));

        let mut request = self
            .client
            .put(format!("{}/{key}", self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-amz-acl", "public-read")
            .header("x-content-sha256", digest)
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| PublishError::Upload {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Upload {
                key: key.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        Ok(format!("{}/{key}", self.public_base))
    }
}

/// Copies artifacts into a local directory; used in development and tests.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    dir: PathBuf,
}

impl DirectoryBlobStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl BlobStore for DirectoryBlobStore {
    async fn upload(
        &self,
        local: &Path,
        key: &str,
        _content_type: &str,
    ) -> Result<String, PublishError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| PublishError::Io { path, source }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;
        let target = self.dir.join(key);
        tokio::fs::copy(local, &target)
            .await
            .map_err(io_err(&target))?;
        let absolute = tokio::fs::canonicalize(&target)
            .await
            .map_err(io_err(&target))?;
        Ok(format!("file://{}", absolute.display()))
    }
}

// ---------------------------------------------------------------------------
// Completion notification
// ---------------------------------------------------------------------------

/// What the Manager is told when a job finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub job_id: String,
    pub result_url: String,
    pub log_url: String,
    pub count: i64,
    pub started_at: DateTime<Utc>,
    pub run_code: String,
}

#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Reports `completion` to the Manager at `endpoint` (its base URL).
    async fn notify(&self, endpoint: &str, completion: &Completion) -> Result<(), PublishError>;
}

/// `POST {endpoint}/job_complete` with form-encoded query parameters.
///
/// Sent once and never retried: the Manager records the completion on receipt.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    /// # Errors
    ///
    /// Returns [`PublishError::Notify`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: u64) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PublishError::Notify {
                endpoint: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CompletionNotifier for HttpNotifier {
    async fn notify(&self, endpoint: &str, completion: &Completion) -> Result<(), PublishError> {
        let url = format!("{}/job_complete", endpoint.trim_end_matches('/'));
        let count = completion.count.to_string();
        let started = completion.started_at.to_rfc3339();
        let params = [
            ("job_id", completion.job_id.as_str()),
            ("resultUrl", completion.result_url.as_str()),
            ("logUrl", completion.log_url.as_str()),
            ("count", count.as_str()),
            ("startTime", started.as_str()),
            ("runCode", completion.run_code.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .query(&params)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .send()
            .await
            .map_err(|e| PublishError::Notify {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Notify {
                endpoint: url,
                reason: format!("HTTP {status}"),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Everything the publisher needs from a finished job.
pub struct PublishRequest<'a> {
    pub dataset: &'a Dataset,
    pub csv_path: PathBuf,
    /// Job log written while the job ran; uploaded, then removed.
    pub log_path: PathBuf,
    /// Manager base URL; `None` skips the notification.
    pub callback_endpoint: Option<&'a str>,
    pub job_id: &'a str,
    pub run_code: &'a str,
    pub started_at: DateTime<Utc>,
    /// Count reported to the Manager, after the count convention.
    pub reported_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub artifact: OutputArtifact,
    /// Empty when the log upload failed.
    pub log_url: String,
    pub notified: bool,
}

#[derive(Clone)]
pub struct Publisher {
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn CompletionNotifier>,
}

impl Publisher {
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, notifier: Arc<dyn CompletionNotifier>) -> Self {
        Self { blobs, notifier }
    }

    /// Runs every publishing step in order. A failed step does not skip the
    /// later ones: cleanup always runs and the Manager is notified once, with
    /// an empty URL for any artifact that did not upload.
    ///
    /// # Errors
    ///
    /// Returns the first [`PublishError`] encountered, after all steps ran.
    pub async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishOutcome, PublishError> {
        let mut first_error: Option<PublishError> = None;
        let csv_key = file_key(&request.csv_path);

        let sha256 = match write_csv(request.dataset, &request.csv_path) {
            Ok(sha) => {
                tracing::info!(
                    rows = request.dataset.len(),
                    path = %request.csv_path.display(),
                    "wrote dataset artifact"
                );
                sha
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to write dataset artifact");
                first_error.get_or_insert(e);
                String::new()
            }
        };

        let result_url = if sha256.is_empty() {
            String::new()
        } else {
            match self.blobs.upload(&request.csv_path, &csv_key, "text/csv").await {
                Ok(url) => {
                    tracing::info!(url = %url, "uploaded dataset");
                    url
                }
                Err(e) => {
                    tracing::error!(error = %e, "dataset upload failed");
                    first_error.get_or_insert(e);
                    String::new()
                }
            }
        };

        tracing::info!("uploading job log");
        let log_path = request.log_path;
        let log_url = match self
            .blobs
            .upload(&log_path, &file_key(&log_path), "text/plain")
            .await
        {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(job_id = %request.job_id, error = %e, "job log upload failed");
                first_error.get_or_insert(e);
                String::new()
            }
        };

        for path in [&request.csv_path, &log_path] {
            if let Err(e) = remove_local(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove local artifact");
            }
        }

        let mut notified = false;
        if let Some(endpoint) = request.callback_endpoint {
            let completion = Completion {
                job_id: request.job_id.to_string(),
                result_url: result_url.clone(),
                log_url: log_url.clone(),
                count: request.reported_count,
                started_at: request.started_at,
                run_code: request.run_code.to_string(),
            };
            match self.notifier.notify(endpoint, &completion).await {
                Ok(()) => {
                    notified = true;
                    tracing::info!(
                        job_id = %request.job_id,
                        count = request.reported_count,
                        "completion notification sent"
                    );
                }
                Err(e) => {
                    tracing::error!(job_id = %request.job_id, error = %e, "completion notification failed");
                    first_error.get_or_insert(e);
                }
            }
        } else {
            tracing::info!(job_id = %request.job_id, "no callback endpoint, notification skipped");
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(PublishOutcome {
            artifact: OutputArtifact {
                local_path: request.csv_path,
                remote_url: result_url,
                row_count: request.dataset.len(),
                sha256,
            },
            log_url,
            notified,
        })
    }
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "publish_test.rs"]
mod tests;
