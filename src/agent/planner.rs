use super::prompt::{build_planner_prompt, PLANNER_SYSTEM_PROMPT};
use super::structured::parse_structured;
use super::PlanGenerator;
use crate::error::ApiError;
use crate::generation::Plan;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use crate::retry::{RetryExecutor, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const PLANNER_RETRY_CONTEXT: &str = "planner-generation";

/// Planner backed by a chat-completions provider in JSON mode.
pub struct LlmPlanner {
    client: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
    max_files: usize,
}

impl LlmPlanner {
    pub fn new(client: Arc<dyn ModelProviderClient>, options: CompletionOptions, max_files: usize) -> Self {
        Self {
            client,
            options,
            max_files,
        }
    }
}

#[async_trait]
impl PlanGenerator for LlmPlanner {
    async fn generate_plan(&self, prompt: &str) -> Result<Plan, ApiError> {
        let messages = vec![
            ChatMessage::system(PLANNER_SYSTEM_PROMPT),
            ChatMessage::user(build_planner_prompt(prompt, self.max_files)),
        ];
        let options = CompletionOptions {
            json_mode: true,
            ..self.options.clone()
        };

        let response = self.client.complete(messages, options).await?;
        debug!(
            provider = self.client.provider_name(),
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Planner response received"
        );
        parse_structured(&response.content, "plan")
    }
}

/// Prompt to plan, with the planner call retried on the configured schedule.
/// Exhaustion is returned as `RetryExhausted` and is fatal for the job.
pub struct PlannerAdapter {
    planner: Arc<dyn PlanGenerator>,
    policy: RetryPolicy,
}

impl PlannerAdapter {
    pub fn new(planner: Arc<dyn PlanGenerator>, policy: RetryPolicy) -> Self {
        Self { planner, policy }
    }

    pub async fn plan(
        &self,
        prompt: &str,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Plan, ApiError> {
        info!(request_id, component = "planner", "Starting planning phase");

        let executor = RetryExecutor::new(self.policy).with_cancellation(cancel.clone());
        let plan = executor
            .execute(PLANNER_RETRY_CONTEXT, |_| self.planner.generate_plan(prompt))
            .await?;

        info!(
            request_id,
            component = "planner",
            file_count = plan.files.len(),
            stack = plan.stack.as_str(),
            "Planning complete"
        );
        Ok(plan)
    }
}
