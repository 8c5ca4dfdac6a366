//! CLI route: single route table and run context. Dispatches to the
//! generation service and presentation.

use crate::api::{GenerationService, JobStatusView};
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_config, format_drain_summary, format_health_json, format_health_text, format_plan_json,
    format_plan_text, format_status_json, format_status_text, format_submission_json,
    format_submission_text,
};
use crate::config::{ConfigLoader, StackgenConfig};
use crate::error::ApiError;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Runtime context for CLI execution: the effective configuration with the
/// workspace root resolved against `--workspace`.
pub struct RunContext {
    config: StackgenConfig,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Create run context from workspace directory and optional config path.
    /// Uses ConfigLoader only.
    pub fn new(workspace: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace)?
        };
        config.workspace_root = resolve_against(&workspace, &config.workspace_root);

        if let Err(errors) = config.validate() {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::ConfigError(joined));
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &StackgenConfig {
        &self.config
    }

    /// Execute a command and return the text to print.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = match command {
            Commands::Generate {
                prompt,
                wait,
                format,
                poll_ms,
            } => self.handle_generate(prompt, *wait, *format, *poll_ms).await,
            Commands::Plan { prompt, format } => self.handle_plan(prompt, *format).await,
            Commands::Work { poll_ms } => self.handle_work(*poll_ms).await,
            Commands::Config => format_config(&self.config),
            Commands::Health { format } => self.handle_health(*format),
        };
        info!(
            command = name,
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn handle_generate(
        &self,
        prompt: &str,
        wait: bool,
        format: OutputFormat,
        poll_ms: u64,
    ) -> Result<String, ApiError> {
        let service = GenerationService::from_config(&self.config)?;
        if !wait {
            let submission = service.submit(prompt).await?;
            return match format {
                OutputFormat::Text => Ok(format_submission_text(&submission)),
                OutputFormat::Json => format_submission_json(&submission),
            };
        }

        service.start().await?;
        let outcome: Result<JobStatusView, ApiError> = async {
            let submission = service.submit(prompt).await?;
            service
                .wait(&submission.job_id, Duration::from_millis(poll_ms))
                .await
        }
        .await;
        service.stop().await?;

        let view = outcome?;
        match format {
            OutputFormat::Text => Ok(format_status_text(&view)),
            OutputFormat::Json => format_status_json(&view),
        }
    }

    async fn handle_plan(&self, prompt: &str, format: OutputFormat) -> Result<String, ApiError> {
        let service = GenerationService::from_config(&self.config)?;
        let plan = service.plan(prompt).await?;
        match format {
            OutputFormat::Text => Ok(format_plan_text(&plan)),
            OutputFormat::Json => format_plan_json(&plan),
        }
    }

    /// Start workers, let them drain everything waiting (including jobs
    /// resumed from the store), then stop.
    async fn handle_work(&self, poll_ms: u64) -> Result<String, ApiError> {
        let service = GenerationService::from_config(&self.config)?;
        service.start().await?;
        let poll = Duration::from_millis(poll_ms);
        loop {
            let stats = service.queue().stats()?;
            if stats.waiting == 0 && stats.active == 0 {
                break;
            }
            tokio::time::sleep(poll).await;
        }
        service.stop().await?;
        let removed = service.queue().prune()?;
        Ok(format_drain_summary(&service.queue().stats()?, removed))
    }

    /// Workers are not started here, so `queue_running` reports false.
    fn handle_health(&self, format: OutputFormat) -> Result<String, ApiError> {
        let service = GenerationService::from_config(&self.config)?;
        let report = service.health()?;
        match format {
            OutputFormat::Text => Ok(format_health_text(&report)),
            OutputFormat::Json => format_health_json(&report),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn resolve_against(workspace: &Path, root: &Path) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        workspace.join(root)
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Generate { .. } => "generate",
        Commands::Plan { .. } => "plan",
        Commands::Work { .. } => "work",
        Commands::Config => "config",
        Commands::Health { .. } => "health",
    }
}
