//! CLI presentation: text and JSON renderings of job status, plans, and
//! configuration. Pure formatting; no service calls.

use crate::api::{HealthReport, JobStatusView, Submission};
use crate::config::StackgenConfig;
use crate::error::ApiError;
use crate::generation::Plan;
use crate::jobs::{JobState, QueueStats};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Table};
use owo_colors::OwoColorize;
use serde::Serialize;

const REDACTED: &str = "<redacted>";

/// Format section heading (bold, underlined).
fn section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to serialize output: {}", e)))
}

pub fn format_submission_text(submission: &Submission) -> String {
    format!(
        "{}\n  job:     {}\n  request: {}\n  status:  {}\n\nRun `stackgen work` to process queued jobs.",
        submission.message, submission.job_id, submission.request_id, submission.status_url
    )
}

pub fn format_submission_json(submission: &Submission) -> Result<String, ApiError> {
    to_json(submission)
}

fn state_label(state: JobState) -> String {
    match state {
        JobState::Completed => format!("{}", state.as_str().green()),
        JobState::Failed => format!("{}", state.as_str().red()),
        JobState::Active | JobState::Waiting => format!("{}", state.as_str().yellow()),
    }
}

pub fn format_status_text(view: &JobStatusView) -> String {
    let mut out = String::new();
    out.push_str(&section_heading("Job"));
    out.push('\n');
    out.push_str(&format!("  id:       {}\n", view.job_id));
    out.push_str(&format!("  state:    {}\n", state_label(view.state)));
    out.push_str(&format!("  progress: {}%\n", view.progress));
    out.push_str(&format!("  created:  {}\n", view.created_at));

    if let Some(ref result) = view.result {
        out.push('\n');
        out.push_str(&section_heading("Result"));
        out.push('\n');
        out.push_str(&format!("  {} ({} ms)\n\n", result.message, result.duration));

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["File", "Status"]);
        for file in &result.files {
            table.add_row(vec![file.clone(), "written".to_string()]);
        }
        for error in result.errors.iter().flatten() {
            let (path, message) = error.split_once(": ").unwrap_or(("", error.as_str()));
            table.add_row(vec![path.to_string(), format!("failed: {}", message)]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }

    if let Some(ref error) = view.error {
        out.push('\n');
        out.push_str(&section_heading("Error"));
        out.push('\n');
        out.push_str(&format!("  [{}] {}\n", error.code, error.message.red()));
        out.push_str(&format!("  request: {}\n", error.request_id));
    }

    out
}

pub fn format_status_json(view: &JobStatusView) -> Result<String, ApiError> {
    to_json(view)
}

pub fn format_plan_text(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str(&section_heading("Plan"));
    out.push('\n');
    out.push_str(&format!("  stack:           {}\n", plan.stack.as_str()));
    out.push_str(&format!(
        "  package manager: {}\n",
        plan.package_manager.as_str()
    ));
    if !plan.modules.is_empty() {
        out.push_str(&format!("  dependencies:    {}\n", plan.modules.join(", ")));
    }
    out.push('\n');

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["File", "Purpose"]);
    for file in &plan.files {
        table.add_row(vec![file.path.clone(), file.purpose.clone()]);
    }
    out.push_str(&table.to_string());
    out.push('\n');
    out
}

pub fn format_plan_json(plan: &Plan) -> Result<String, ApiError> {
    to_json(plan)
}

/// Effective configuration as TOML, with the API key masked.
pub fn format_config(config: &StackgenConfig) -> Result<String, ApiError> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
}

pub fn format_health_text(report: &HealthReport) -> String {
    let status = if report.status == "ok" {
        format!("{}", report.status.green())
    } else {
        format!("{}", report.status.yellow())
    };
    let mut out = format!("{}\n  status:   {}\n", section_heading("Health"), status);
    match report.provider_error {
        Some(ref err) => out.push_str(&format!("  provider: {}\n", err.red())),
        None => out.push_str("  provider: ready\n"),
    }
    out.push_str(&format!(
        "  workers:  {}\n",
        if report.queue_running { "running" } else { "stopped" }
    ));
    out.push_str(&format!(
        "  jobs:     {} waiting, {} active, {} completed, {} failed",
        report.stats.waiting, report.stats.active, report.stats.completed, report.stats.failed
    ));
    out
}

pub fn format_health_json(report: &HealthReport) -> Result<String, ApiError> {
    to_json(report)
}

pub fn format_drain_summary(stats: &QueueStats, pruned: usize) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Waiting", "Active", "Completed", "Failed"]);
    table.add_row(vec![
        stats.waiting.to_string(),
        stats.active.to_string(),
        stats.completed.to_string(),
        stats.failed.to_string(),
    ]);
    format!(
        "{}\n{}\nPruned {} expired job(s).",
        section_heading("Queue drained"),
        table,
        pruned
    )
}
