//! Job records as tracked by the queue and persisted by the job store.

use crate::error::ApiError;
use crate::generation::{JobResult, PROGRESS_DONE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Queue-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        JobId(Uuid::from_bytes(bytes))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(JobId)
            .map_err(|_| ApiError::JobNotFound(s.to_string()))
    }
}

/// What the submitter asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub prompt: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job failed. `code` and `message` are safe to show to the submitter;
/// `reason` keeps the full internal error for logs and operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: String,
    pub message: String,
    pub reason: String,
}

impl From<&ApiError> for JobFailure {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.public_code().to_string(),
            message: err.public_message(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub payload: JobPayload,
    pub state: JobState,
    /// 0-100, never decreases
    pub progress: u8,
    /// Present once Completed
    pub result: Option<JobResult>,
    /// Present once Failed; on a retried job, the error of the last attempt
    pub failure: Option<JobFailure>,
    /// Attempts started so far
    pub attempts_made: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: JobId::new(),
            payload,
            state: JobState::Waiting,
            progress: 0,
            result: None,
            failure: None,
            attempts_made: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_active(&mut self) {
        self.state = JobState::Active;
        self.attempts_made += 1;
        self.started_at = Some(Utc::now());
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(PROGRESS_DONE));
    }

    pub fn complete(&mut self, result: JobResult) {
        self.state = JobState::Completed;
        self.set_progress(PROGRESS_DONE);
        self.result = Some(result);
        self.failure = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, err: &ApiError) {
        self.state = JobState::Failed;
        self.failure = Some(JobFailure::from(err));
        self.finished_at = Some(Utc::now());
    }

    /// Put the job back in line for another attempt.
    pub fn requeue(&mut self, err: &ApiError) {
        self.state = JobState::Waiting;
        self.failure = Some(JobFailure::from(err));
    }
}
