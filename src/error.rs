//! Error types for the stackgen generation pipeline.
//!
//! `ApiError` carries every failure the pipeline can raise: fatal job-level
//! errors, per-file errors that are folded into a `JobResult`, provider
//! failures, and submission/queue errors. Each variant maps to a stable code
//! that is safe to expose through the status view.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Failed to prepare workspace: {0}")]
    WorkspaceError(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Plan exceeds maximum file limit ({count} > {max})")]
    PlanTooLarge { count: usize, max: usize },

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    #[error("Generated empty content for {0}")]
    EmptyContent(String),

    #[error("Path traversal attempt detected: {0}")]
    PathTraversal(String),

    #[error("Failed to write file {path}: {message}")]
    FileWriteError { path: String, message: String },

    #[error("{context} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        context: String,
        attempts: usize,
        last_error: Box<ApiError>,
    },

    #[error("Job cancelled: {0}")]
    Cancelled(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job queue is full ({0} waiting jobs)")]
    QueueFull(usize),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// Stable, machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::WorkspaceError(_) => "WORKSPACE_ERROR",
            ApiError::InvalidPlan(_) => "INVALID_PLAN",
            ApiError::PlanTooLarge { .. } => "PLAN_TOO_LARGE",
            ApiError::InvalidPath(_) => "INVALID_PATH",
            ApiError::EmptyContent(_) => "EMPTY_CONTENT",
            ApiError::PathTraversal(_) => "PATH_TRAVERSAL",
            ApiError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            ApiError::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            ApiError::Cancelled(_) => "JOB_CANCELLED",
            ApiError::GenerationFailed(_) => "GENERATION_FAILED",
            ApiError::InvalidPrompt(_) => "INVALID_PROMPT",
            ApiError::JobNotFound(_) => "NOT_FOUND",
            ApiError::QueueFull(_) => "QUEUE_FULL",
            ApiError::ProviderError(_)
            | ApiError::ProviderRequestFailed(_)
            | ApiError::InvalidResponse(_) => "AI_SERVICE_ERROR",
            ApiError::ProviderNotConfigured(_) => "PROVIDER_NOT_CONFIGURED",
            ApiError::ProviderAuthFailed(_) => "PROVIDER_AUTH_FAILED",
            ApiError::ProviderRateLimit(_) => "RATE_LIMIT_EXCEEDED",
            ApiError::ProviderModelNotFound(_) => "PROVIDER_MODEL_NOT_FOUND",
            ApiError::StorageError(_) => "STORAGE_ERROR",
            ApiError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Code exposed to callers polling job status.
    ///
    /// Exhausted retries surface as a generic unavailability so the status
    /// view never leaks provider detail.
    pub fn public_code(&self) -> &'static str {
        match self {
            ApiError::RetryExhausted { .. } => "SERVICE_UNAVAILABLE",
            ApiError::StorageError(_) | ApiError::ConfigError(_) => "INTERNAL_ERROR",
            other => other.code(),
        }
    }

    /// Message exposed to callers polling job status.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::RetryExhausted { .. } => {
                "Service temporarily unavailable. Please try again later.".to_string()
            }
            ApiError::StorageError(_) | ApiError::ConfigError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Errors another attempt cannot fix. Looks through `RetryExhausted`
    /// at the error that ended the retries.
    pub fn is_permanent(&self) -> bool {
        match self {
            ApiError::RetryExhausted { last_error, .. } => last_error.is_permanent(),
            ApiError::Cancelled(_)
            | ApiError::InvalidPrompt(_)
            | ApiError::ConfigError(_)
            | ApiError::ProviderNotConfigured(_)
            | ApiError::ProviderAuthFailed(_)
            | ApiError::ProviderModelNotFound(_) => true,
            _ => false,
        }
    }

    /// Whether the job-level retry policy should restart a job that failed with this error.
    pub fn is_job_retryable(&self) -> bool {
        !self.is_permanent()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::JobNotFound(id) => ApiError::JobNotFound(id),
            other => ApiError::StorageError(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
