//! Job execution seam between the worker pool and the generation pipeline.

use crate::error::ApiError;
use crate::generation::{JobContext, JobResult, Orchestrator, ProgressSink};
use async_trait::async_trait;

/// Runs one attempt of a job. The queue owns claiming, retries, and state.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, ctx: &JobContext, progress: &dyn ProgressSink) -> Result<JobResult, ApiError>;
}

#[async_trait]
impl JobExecutor for Orchestrator {
    async fn execute(&self, ctx: &JobContext, progress: &dyn ProgressSink) -> Result<JobResult, ApiError> {
        self.run(ctx, progress).await
    }
}
