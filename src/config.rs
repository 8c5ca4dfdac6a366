//! Configuration System
//!
//! Layered configuration: built-in defaults, the global file, workspace files,
//! then `STACKGEN__*` environment overrides. `OPENAI_API_KEY` and
//! `OPENAI_MODEL` are honoured for the OpenAI provider.

use crate::generation::OrchestratorConfig;
use crate::jobs::{JobQueueConfig, RetentionPolicy};
use crate::logging::LoggingConfig;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
pub mod paths;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackgenConfig {
    /// Directory under which each job gets its own subdirectory
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./workspace")
}

impl Default for StackgenConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            provider: ProviderConfig::default(),
            limits: LimitsConfig::default(),
            generation: GenerationConfig::default(),
            worker: WorkerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Submission and plan limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_files_per_job")]
    pub max_files_per_job: usize,
    /// Characters, after trimming
    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,
    #[serde(default = "default_min_prompt_length")]
    pub min_prompt_length: usize,
}

fn default_max_files_per_job() -> usize {
    20
}

fn default_max_prompt_length() -> usize {
    5000
}

fn default_min_prompt_length() -> usize {
    10
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files_per_job: default_max_files_per_job(),
            max_prompt_length: default_max_prompt_length(),
            min_prompt_length: default_min_prompt_length(),
        }
    }
}

/// Per-job generation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Files generated concurrently within one job
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Schedule for each planner and generator call
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_batch_size() -> usize {
    3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Whole-job attempts, including the first
    #[serde(default = "default_job_attempts")]
    pub job_attempts: usize,
    /// Delay before the first job retry; doubles per retry
    #[serde(default = "default_job_backoff_ms")]
    pub job_backoff_ms: u64,
    #[serde(default = "default_max_waiting")]
    pub max_waiting: usize,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

fn default_concurrency() -> usize {
    2
}

fn default_job_attempts() -> usize {
    3
}

fn default_job_backoff_ms() -> u64 {
    5000
}

fn default_max_waiting() -> usize {
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            job_attempts: default_job_attempts(),
            job_backoff_ms: default_job_backoff_ms(),
            max_waiting: default_max_waiting(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl WorkerConfig {
    pub fn job_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.job_attempts,
            base_delay_ms: self.job_backoff_ms,
            max_delay_ms: self.job_backoff_ms.saturating_mul(4),
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStoreKind {
    Memory,
    Sled,
}

/// Job store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_job_store")]
    pub job_store: JobStoreKind,
    /// Sled database directory; defaults to the per-user data directory
    #[serde(default)]
    pub job_store_path: Option<PathBuf>,
}

fn default_job_store() -> JobStoreKind {
    JobStoreKind::Sled
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            job_store: default_job_store(),
            job_store_path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_job_store_path(&self) -> PathBuf {
        self.job_store_path
            .clone()
            .unwrap_or_else(paths::default_job_store_path)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Limits(String),
    Generation(String),
    Worker(String),
    Storage(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Limits(msg) => write!(f, "Limits: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Worker(msg) => write!(f, "Worker: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StackgenConfig {
    /// Validate everything except provider readiness, which only matters
    /// once a job actually calls the model (see `GenerationService::health`).
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.workspace_root.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Workspace root cannot be empty".to_string(),
            ));
        }

        if self.provider.model.trim().is_empty() {
            errors.push(ValidationError::Provider(
                "Model name cannot be empty".to_string(),
            ));
        }

        let limits = &self.limits;
        if limits.max_files_per_job == 0 {
            errors.push(ValidationError::Limits(
                "max_files_per_job must be at least 1".to_string(),
            ));
        }
        if limits.min_prompt_length > limits.max_prompt_length {
            errors.push(ValidationError::Limits(format!(
                "min_prompt_length ({}) exceeds max_prompt_length ({})",
                limits.min_prompt_length, limits.max_prompt_length
            )));
        }

        if self.generation.batch_size == 0 {
            errors.push(ValidationError::Generation(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if let Err(e) = self.generation.retry.validate() {
            errors.push(ValidationError::Generation(e));
        }

        if self.worker.concurrency == 0 {
            errors.push(ValidationError::Worker(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if let Err(e) = self.worker.job_retry().validate() {
            errors.push(ValidationError::Worker(e));
        }

        if let Some(path) = &self.storage.job_store_path {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::Storage(
                    "job_store_path cannot be empty".to_string(),
                ));
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_files_per_job: self.limits.max_files_per_job,
            batch_size: self.generation.batch_size,
        }
    }

    pub fn queue_config(&self) -> JobQueueConfig {
        JobQueueConfig {
            concurrency: self.worker.concurrency,
            job_retry: self.worker.job_retry(),
            retention: self.worker.retention,
            workspace_root: self.workspace_root.clone(),
            max_waiting: self.worker.max_waiting,
        }
    }
}
