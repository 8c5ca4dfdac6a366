//! One generation job: plan, validate, fan out file generation in batches,
//! aggregate.

pub mod fanout;
pub mod orchestrator;
pub mod plan;
pub mod result;

pub use fanout::generate_batch;
pub use orchestrator::{
    generation_progress, JobContext, JobPhase, NoProgress, Orchestrator, OrchestratorConfig,
    ProgressSink, PROGRESS_DONE, PROGRESS_STARTED,
};
pub use plan::{FileSpec, GeneratedFile, PackageManager, Plan, Stack};
pub use result::{
    FileGenerationResult, JobResult, MESSAGE_ALL_FAILED, MESSAGE_ALL_SUCCEEDED, MESSAGE_PARTIAL,
};
