//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; the route table dispatches to `GenerationService`.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_config, format_drain_summary, format_health_json, format_health_text, format_plan_json,
    format_plan_text, format_status_json, format_status_text, format_submission_json,
    format_submission_text,
};
pub use route::RunContext;
