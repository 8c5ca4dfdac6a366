//! Generation Service
//!
//! Submission, status, cancellation, and health over the job queue. This is
//! the surface callers (the CLI, or an HTTP layer) talk to; it owns prompt
//! validation and the public shape of job status.

use crate::agent::{LlmFileGenerator, LlmPlanner};
use crate::config::{JobStoreKind, LimitsConfig, ProviderConfig, StackgenConfig};
use crate::error::ApiError;
use crate::generation::{JobResult, Orchestrator, Plan};
use crate::jobs::{JobId, JobPayload, JobQueue, JobRecord, JobState, QueueStats};
use crate::store::{InMemoryJobStore, JobStore, SledJobStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

pub const SUBMISSION_MESSAGE: &str = "Job queued";

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub message: String,
    pub job_id: String,
    pub request_id: String,
    pub status_url: String,
}

/// Public error shape: never carries internal detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

/// Public view of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub state: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorView>,
    /// RFC 3339
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultView {
    pub success: bool,
    pub message: String,
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub duration: u64,
}

impl From<&JobResult> for JobResultView {
    fn from(result: &JobResult) -> Self {
        Self {
            success: result.success,
            message: result.message.clone(),
            files: result.files.clone(),
            errors: result.errors.clone(),
            duration: result.duration_ms,
        }
    }
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        let error = match (record.state, &record.failure) {
            (JobState::Failed, Some(failure)) => Some(ErrorView {
                code: failure.code.clone(),
                message: failure.message.clone(),
                request_id: record.payload.request_id.clone(),
            }),
            _ => None,
        };
        let result = match record.state {
            JobState::Completed => record.result.as_ref().map(JobResultView::from),
            _ => None,
        };
        Self {
            job_id: record.id.to_string(),
            state: record.state,
            progress: record.progress,
            result,
            error,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// "ok" when jobs can run, otherwise "degraded"
    pub status: String,
    pub provider_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
    pub queue_running: bool,
    pub stats: QueueStats,
}

/// Heuristics for prompts that try to steer the model away from the task.
fn contains_suspicious_pattern(prompt: &str) -> bool {
    let collapsed = prompt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let overrides = ["previous", "all", "above"]
        .iter()
        .any(|scope| collapsed.contains(&format!("ignore {} instructions", scope)));
    let role_marker = collapsed.contains("system:") || collapsed.contains("system :");
    let template = collapsed
        .find("{{")
        .is_some_and(|start| collapsed[start + 2..].contains("}}"));
    let script = collapsed.contains("<script");

    overrides || role_marker || template || script
}

/// Validate a prompt against the configured bounds. Returns the trimmed prompt.
pub fn validate_prompt<'a>(prompt: &'a str, limits: &LimitsConfig) -> Result<&'a str, ApiError> {
    let prompt = prompt.trim();
    let length = prompt.chars().count();
    if length < limits.min_prompt_length {
        return Err(ApiError::InvalidPrompt(format!(
            "Prompt must be at least {} characters",
            limits.min_prompt_length
        )));
    }
    if length > limits.max_prompt_length {
        return Err(ApiError::InvalidPrompt(format!(
            "Prompt must not exceed {} characters",
            limits.max_prompt_length
        )));
    }
    if contains_suspicious_pattern(prompt) {
        return Err(ApiError::InvalidPrompt(
            "Prompt contains potentially harmful patterns".to_string(),
        ));
    }
    Ok(prompt)
}

pub struct GenerationService {
    queue: Arc<JobQueue>,
    orchestrator: Arc<Orchestrator>,
    limits: LimitsConfig,
    provider: ProviderConfig,
}

impl GenerationService {
    pub fn new(
        queue: Arc<JobQueue>,
        orchestrator: Arc<Orchestrator>,
        limits: LimitsConfig,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            limits,
            provider,
        }
    }

    /// Wire the provider, orchestrator, job store, and queue from configuration.
    /// Workers are not started.
    pub fn from_config(config: &StackgenConfig) -> Result<Self, ApiError> {
        let client = config.provider.create_client()?;
        let options = config.provider.default_options.clone();
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(LlmPlanner::new(
                client.clone(),
                options.clone(),
                config.limits.max_files_per_job,
            )),
            Arc::new(LlmFileGenerator::new(client, options)),
            config.generation.retry,
            config.orchestrator_config(),
        ));

        let store: Arc<dyn JobStore> = match config.storage.job_store {
            JobStoreKind::Memory => Arc::new(InMemoryJobStore::new()),
            JobStoreKind::Sled => {
                Arc::new(SledJobStore::new(config.storage.resolved_job_store_path())?)
            }
        };
        let queue = Arc::new(JobQueue::new(
            store,
            orchestrator.clone(),
            config.queue_config(),
        ));

        Ok(Self::new(
            queue,
            orchestrator,
            config.limits,
            config.provider.clone(),
        ))
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub async fn start(&self) -> Result<(), ApiError> {
        self.queue.start().await
    }

    pub async fn stop(&self) -> Result<(), ApiError> {
        self.queue.stop().await
    }

    pub async fn submit(&self, prompt: &str) -> Result<Submission, ApiError> {
        let prompt = validate_prompt(prompt, &self.limits)?;
        let request_id = Uuid::new_v4().to_string();
        let job_id = self
            .queue
            .enqueue(JobPayload {
                prompt: prompt.to_string(),
                request_id: request_id.clone(),
            })
            .await?;

        info!(job_id = %job_id, request_id = %request_id, "Generation request accepted");
        Ok(Submission {
            message: SUBMISSION_MESSAGE.to_string(),
            job_id: job_id.to_string(),
            request_id,
            status_url: format!("/jobs/{}", job_id),
        })
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusView, ApiError> {
        let id: JobId = job_id.parse()?;
        self.queue
            .get_job(&id)?
            .map(|record| JobStatusView::from(&record))
            .ok_or_else(|| ApiError::JobNotFound(job_id.to_string()))
    }

    /// Best-effort: a waiting job never runs; an active job is signalled.
    pub async fn cancel(&self, job_id: &str) -> Result<(), ApiError> {
        let id: JobId = job_id.parse()?;
        if self.queue.remove(&id).await? {
            Ok(())
        } else {
            Err(ApiError::JobNotFound(job_id.to_string()))
        }
    }

    /// Poll until the job finishes.
    pub async fn wait(&self, job_id: &str, poll_interval: Duration) -> Result<JobStatusView, ApiError> {
        let id: JobId = job_id.parse()?;
        let record = self.queue.wait_for_terminal(&id, poll_interval).await?;
        Ok(JobStatusView::from(&record))
    }

    /// Plan and validate without writing anything.
    pub async fn plan(&self, prompt: &str) -> Result<Plan, ApiError> {
        let prompt = validate_prompt(prompt, &self.limits)?;
        let request_id = Uuid::new_v4().to_string();
        self.orchestrator
            .plan(prompt, &request_id, &CancellationToken::new())
            .await
    }

    pub fn health(&self) -> Result<HealthReport, ApiError> {
        let provider_error = self.provider.validate().err();
        let queue_running = self.queue.is_running();
        let ready = provider_error.is_none() && queue_running;
        Ok(HealthReport {
            status: if ready { "ok" } else { "degraded" }.to_string(),
            provider_ready: provider_error.is_none(),
            provider_error,
            queue_running,
            stats: self.queue.stats()?,
        })
    }
}
