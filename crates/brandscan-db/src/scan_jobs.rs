//! Database operations for `brand_scan_jobs`.
//!
//! Every state change is a single guarded `UPDATE ... WHERE status = ANY(..)`
//! whose allowed source states come from [`JobState::can_transition_to`].
//! Zero affected rows means either the job is unknown or it is in the wrong
//! state, and the two are told apart with a follow-up lookup.

use brandscan_core::{JobState, ScanJob};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const SCAN_JOB_COLUMNS: &str = "id, brand_id, scan_url, status, run_code, parsing_result_url, \
     parsing_log_url, parsing_count, parsing_start, parsing_end, dispatched_at, error_message, \
     created_at, updated_at";

/// A row from the `brand_scan_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanJobRow {
    pub id: i64,
    pub brand_id: String,
    pub scan_url: Option<String>,
    pub status: String,
    pub run_code: Option<String>,
    pub parsing_result_url: Option<String>,
    pub parsing_log_url: Option<String>,
    pub parsing_count: Option<i64>,
    pub parsing_start: Option<DateTime<Utc>>,
    pub parsing_end: Option<DateTime<Utc>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanJobRow {
    /// Parsed `status`; `None` only if the column holds a value outside the
    /// CHECK constraint.
    #[must_use]
    pub fn state(&self) -> Option<JobState> {
        self.status.parse().ok()
    }

    #[must_use]
    pub fn to_scan_job(&self) -> Option<ScanJob> {
        Some(ScanJob {
            job_id: self.id,
            brand_id: self.brand_id.clone(),
            scan_url: self.scan_url.clone(),
            state: self.state()?,
        })
    }
}

/// Status values `target` may be entered from, bound as a `text[]` guard.
fn guard(target: JobState) -> Vec<String> {
    JobState::sources(target)
        .map(|state| state.as_str().to_string())
        .collect()
}

/// Values recorded when the Agent reports a finished job.
#[derive(Debug, Clone, Default)]
pub struct ScanCompletion {
    pub result_url: String,
    pub log_url: String,
    pub count: i64,
    /// When the Agent started parsing; falls back to `dispatched_at`.
    pub started_at: Option<DateTime<Utc>>,
    pub run_code: Option<String>,
}

/// Inserts a job row in `submitted` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate `id`).
pub async fn insert_scan_job(
    pool: &PgPool,
    id: i64,
    brand_id: &str,
    scan_url: Option<&str>,
) -> Result<ScanJobRow, DbError> {
    let row = sqlx::query_as::<_, ScanJobRow>(&format!(
        "INSERT INTO brand_scan_jobs (id, brand_id, scan_url, status) \
         VALUES ($1, $2, $3, 'submitted') \
         RETURNING {SCAN_JOB_COLUMNS}"
    ))
    .bind(id)
    .bind(brand_id)
    .bind(scan_url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a job by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scan_job(pool: &PgPool, id: i64) -> Result<ScanJobRow, DbError> {
    sqlx::query_as::<_, ScanJobRow>(&format!(
        "SELECT {SCAN_JOB_COLUMNS} FROM brand_scan_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Moves a job back to `submitted`, clearing the previous run's error.
///
/// Allowed from any state except `dispatched`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id and
/// [`DbError::InvalidJobTransition`] if the job is currently dispatched.
pub async fn mark_job_submitted(pool: &PgPool, id: i64) -> Result<ScanJob, DbError> {
    let row = sqlx::query_as::<_, ScanJobRow>(&format!(
        "UPDATE brand_scan_jobs \
         SET status = 'submitted', error_message = NULL, updated_at = NOW() \
         WHERE id = $1 AND status = ANY($2) \
         RETURNING {SCAN_JOB_COLUMNS}"
    ))
    .bind(id)
    .bind(guard(JobState::Submitted))
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => row.to_scan_job().ok_or(DbError::UnknownJobState {
            id,
            status: row.status,
        }),
        None => Err(transition_error(pool, id, JobState::Submitted).await),
    }
}

/// Marks a `submitted` job as `dispatched` and stamps `dispatched_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id and
/// [`DbError::InvalidJobTransition`] if the job is not `submitted`.
pub async fn mark_job_dispatched(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE brand_scan_jobs \
         SET status = 'dispatched', dispatched_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status = ANY($2)",
    )
    .bind(id)
    .bind(guard(JobState::Dispatched))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_error(pool, id, JobState::Dispatched).await);
    }
    Ok(())
}

/// Records the Agent's result on a `dispatched` job and marks it `completed`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id and
/// [`DbError::InvalidJobTransition`] if the job is not `dispatched`.
pub async fn complete_scan_job(
    pool: &PgPool,
    id: i64,
    completion: &ScanCompletion,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE brand_scan_jobs \
         SET status = 'completed', parsing_result_url = $1, parsing_log_url = $2, \
             parsing_count = $3, parsing_start = COALESCE($4, dispatched_at), \
             parsing_end = NOW(), run_code = COALESCE($5, run_code), updated_at = NOW() \
         WHERE id = $6 AND status = ANY($7)",
    )
    .bind(&completion.result_url)
    .bind(&completion.log_url)
    .bind(completion.count)
    .bind(completion.started_at)
    .bind(completion.run_code.as_deref())
    .bind(id)
    .bind(guard(JobState::Completed))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_error(pool, id, JobState::Completed).await);
    }
    Ok(())
}

/// Marks a `submitted` or `dispatched` job as `failed` with a message.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id and
/// [`DbError::InvalidJobTransition`] if the job has already finished.
pub async fn fail_scan_job(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE brand_scan_jobs \
         SET status = 'failed', error_message = $1, updated_at = NOW() \
         WHERE id = $2 AND status = ANY($3)",
    )
    .bind(error_message)
    .bind(id)
    .bind(guard(JobState::Failed))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_error(pool, id, JobState::Failed).await);
    }
    Ok(())
}

async fn transition_error(pool: &PgPool, id: i64, to: JobState) -> DbError {
    match get_scan_job(pool, id).await {
        Ok(row) => match row.state() {
            Some(from) => DbError::InvalidJobTransition { id, from, to },
            None => DbError::UnknownJobState {
                id,
                status: row.status,
            },
        },
        Err(err) => err,
    }
}
