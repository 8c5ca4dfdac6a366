//! Per-job state machine:
//! `WorkspacePrep -> Planning -> PlanValidation -> ParallelGeneration -> Aggregation`.
//!
//! Any error before `ParallelGeneration` is fatal and yields no `JobResult`.
//! Per-file failures are folded into the result and never abort the job.

use super::fanout::generate_batch;
use super::plan::Plan;
use super::result::{FileGenerationResult, JobResult};
use crate::agent::{ContentGenerator, GeneratorAdapter, PlanGenerator, PlannerAdapter};
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::workspace::prepare_workspace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress reported before any work starts.
pub const PROGRESS_STARTED: u8 = 10;
/// Progress reported once the job has a result.
pub const PROGRESS_DONE: u8 = 100;
const PROGRESS_GENERATION_SPAN: usize = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_files_per_job")]
    pub max_files_per_job: usize,
    /// Concurrent file generations per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_max_files_per_job() -> usize {
    20
}

fn default_batch_size() -> usize {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_files_per_job: default_max_files_per_job(),
            batch_size: default_batch_size(),
        }
    }
}

/// Everything one run needs to know about its job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub request_id: String,
    pub prompt: String,
    /// Job-private directory; recreated at the start of every run
    pub workspace: PathBuf,
    pub cancel: CancellationToken,
}

/// Receives progress updates (0-100) during a run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: u8);
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: u8) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    WorkspacePrep,
    Planning,
    PlanValidation,
    ParallelGeneration,
    Aggregation,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::WorkspacePrep => "workspace_prep",
            JobPhase::Planning => "planning",
            JobPhase::PlanValidation => "plan_validation",
            JobPhase::ParallelGeneration => "parallel_generation",
            JobPhase::Aggregation => "aggregation",
        };
        f.write_str(name)
    }
}

/// Progress after `done` of `total` files have settled.
pub fn generation_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_STARTED;
    }
    let span = PROGRESS_GENERATION_SPAN * done.min(total) / total;
    PROGRESS_STARTED + span as u8
}

pub struct Orchestrator {
    planner: PlannerAdapter,
    generator: GeneratorAdapter,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn PlanGenerator>,
        generator: Arc<dyn ContentGenerator>,
        retry: RetryPolicy,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            planner: PlannerAdapter::new(planner, retry),
            generator: GeneratorAdapter::new(generator, retry),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Planning and validation only; nothing is written.
    pub async fn plan(
        &self,
        prompt: &str,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Plan, ApiError> {
        let plan = self.planner.plan(prompt, request_id, cancel).await?;
        plan.validate(self.config.max_files_per_job)?;
        Ok(plan)
    }

    pub async fn run(&self, ctx: &JobContext, progress: &dyn ProgressSink) -> Result<JobResult, ApiError> {
        let started = Instant::now();
        let job_id = ctx.job_id.as_str();
        let request_id = ctx.request_id.as_str();

        enter(job_id, request_id, JobPhase::WorkspacePrep);
        prepare_workspace(&ctx.workspace).await?;

        enter(job_id, request_id, JobPhase::Planning);
        check_cancelled(ctx, JobPhase::Planning)?;
        let plan = self
            .planner
            .plan(&ctx.prompt, request_id, &ctx.cancel)
            .await?;

        enter(job_id, request_id, JobPhase::PlanValidation);
        plan.validate(self.config.max_files_per_job)?;

        enter(job_id, request_id, JobPhase::ParallelGeneration);
        let results = self.generate_all(ctx, &plan, progress).await?;

        enter(job_id, request_id, JobPhase::Aggregation);
        let result = JobResult::aggregate(&results, started.elapsed());
        info!(
            job_id,
            request_id,
            success = result.success,
            files = result.files.len(),
            errors = result.errors.as_ref().map_or(0, Vec::len),
            duration_ms = result.duration_ms,
            "{}",
            result.message
        );
        Ok(result)
    }

    async fn generate_all(
        &self,
        ctx: &JobContext,
        plan: &Plan,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<FileGenerationResult>, ApiError> {
        let total = plan.files.len();
        let batch_count = plan.batch_count(self.config.batch_size);
        let mut results = Vec::with_capacity(total);

        for (batch_index, batch) in plan.batches(self.config.batch_size).enumerate() {
            check_cancelled(ctx, JobPhase::ParallelGeneration)?;
            debug!(
                job_id = %ctx.job_id,
                batch_index,
                batch_count,
                batch_size = batch.len(),
                "Generating batch"
            );

            let settled = generate_batch(
                &self.generator,
                batch,
                plan,
                &ctx.workspace,
                &ctx.cancel,
                batch_index,
            )
            .await;
            results.extend(settled);
            progress.report(generation_progress(results.len(), total));
        }

        check_cancelled(ctx, JobPhase::ParallelGeneration)?;
        Ok(results)
    }
}

fn enter(job_id: &str, request_id: &str, phase: JobPhase) {
    info!(job_id, request_id, phase = %phase, "Entering phase");
}

fn check_cancelled(ctx: &JobContext, phase: JobPhase) -> Result<(), ApiError> {
    if ctx.cancel.is_cancelled() {
        warn!(job_id = %ctx.job_id, phase = %phase, "Job cancelled");
        return Err(ApiError::Cancelled(ctx.job_id.clone()));
    }
    Ok(())
}
