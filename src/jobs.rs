//! Generation jobs: records, the worker-pool queue, and retention.

pub mod executor;
pub mod model;
pub mod queue;
pub mod retention;

pub use executor::JobExecutor;
pub use model::{JobFailure, JobId, JobPayload, JobRecord, JobState};
pub use queue::{JobQueue, JobQueueConfig, QueueStats};
pub use retention::RetentionPolicy;
