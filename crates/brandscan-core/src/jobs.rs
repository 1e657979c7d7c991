use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Manager-side lifecycle of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Submitted,
    Dispatched,
    Completed,
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 4] = [
        JobState::Submitted,
        JobState::Dispatched,
        JobState::Completed,
        JobState::Failed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Dispatched => "dispatched",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Resubmitting a finished job is allowed; each run gets its own run code.
    #[must_use]
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (
                JobState::Submitted | JobState::Completed | JobState::Failed,
                JobState::Submitted
            ) | (JobState::Submitted, JobState::Dispatched)
                | (JobState::Dispatched, JobState::Completed | JobState::Failed)
                | (JobState::Submitted, JobState::Failed)
        )
    }

    /// Every state `target` may be entered from.
    pub fn sources(target: JobState) -> impl Iterator<Item = JobState> {
        Self::ALL
            .into_iter()
            .filter(move |state| state.can_transition_to(target))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(JobState::Submitted),
            "dispatched" => Ok(JobState::Dispatched),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

/// A job as the Manager knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanJob {
    pub job_id: i64,
    pub brand_id: String,
    pub scan_url: Option<String>,
    pub state: JobState,
}

/// The Agent's transient copy of a job, plus where to report completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDispatch {
    pub job_id: String,
    pub brand_id: String,
    pub scan_url: Option<String>,
    /// Base URL of the Manager; `None` skips the completion notification.
    pub callback_endpoint: Option<String>,
}

/// Terminal outcome of one job execution, sent back to the Manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub run_code: String,
    pub result_url: String,
    pub log_url: String,
    /// True dataset length at publish time.
    pub row_count: usize,
    /// `row_count` after the configured count convention; this is what the
    /// completion notification carries.
    pub reported_count: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
