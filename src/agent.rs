//! Collaborators that turn a prompt into a plan and a plan entry into file content.
//!
//! `PlanGenerator` and `ContentGenerator` are the seams to the external model.
//! The adapters in `planner` and `generator` wrap them with the retry schedule,
//! content checks, and the workspace write.

use crate::error::ApiError;
use crate::generation::{FileSpec, GeneratedFile, Plan};
use async_trait::async_trait;

pub mod generator;
pub mod planner;
pub mod prompt;
pub mod structured;

pub use generator::{GeneratorAdapter, LlmFileGenerator};
pub use planner::{LlmPlanner, PlannerAdapter};

/// Produces a plan from a user prompt. The plan is validated by the caller.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_plan(&self, prompt: &str) -> Result<Plan, ApiError>;
}

/// Produces the content of one planned file.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_file(&self, spec: &FileSpec, plan: &Plan) -> Result<GeneratedFile, ApiError>;
}
