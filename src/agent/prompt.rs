//! Prompt text for the planner and the per-file generator.

use crate::generation::{FileSpec, Plan};

pub const PLANNER_SYSTEM_PROMPT: &str = "You are a senior backend architect. \
Respond with a single JSON object and nothing else.";

pub const GENERATOR_SYSTEM_PROMPT: &str = "You are a backend code generator. \
Respond with a single JSON object of the form {\"path\": string, \"content\": string} and nothing else.";

const PLAN_SCHEMA: &str = r#"{
  "stack": "node-express-ts",
  "packageManager": "npm" | "pnpm" | "yarn",
  "modules": [string],
  "files": [{ "path": string, "purpose": string }]
}"#;

pub fn build_planner_prompt(user_prompt: &str, max_files: usize) -> String {
    format!(
        "Task:\n\
Generate a deterministic file structure for a backend project.\n\
\n\
Rules:\n\
- Stack: Node.js + Express + TypeScript\n\
- No extra frameworks\n\
- No explanations\n\
- Only essential files (between 1 and {max_files})\n\
- File paths are relative to the project root and never contain \"..\"\n\
- Include proper error handling patterns\n\
- Include a health check endpoint\n\
- Use environment variables for configuration\n\
\n\
Output schema:\n\
{PLAN_SCHEMA}\n\
\n\
User request:\n\
\"{user_prompt}\""
    )
}

pub fn build_file_prompt(spec: &FileSpec, plan: &Plan) -> String {
    let other_files = plan
        .other_files(&spec.path)
        .map(|f| format!("- {}: {}", f.path, f.purpose))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Stack:\n\
- Node.js\n\
- Express\n\
- TypeScript\n\
\n\
Project Context:\n\
Package Manager: {package_manager}\n\
Dependencies: {modules}\n\
Other files in project:\n\
{other_files}\n\
\n\
File to generate:\n\
{path}\n\
\n\
Purpose:\n\
{purpose}\n\
\n\
Rules:\n\
- Generate ONLY this file's content\n\
- Valid TypeScript or JSON\n\
- No markdown code blocks\n\
- No explanations or comments about the code\n\
- Use ES module imports (import/export)\n\
- Follow best practices for production code\n\
- Include proper error handling where appropriate\n\
- Use environment variables for sensitive data\n\
- Set \"path\" to exactly {path}",
        package_manager = plan.package_manager.as_str(),
        modules = if plan.modules.is_empty() {
            "(none)".to_string()
        } else {
            plan.modules.join(", ")
        },
        other_files = other_files,
        path = spec.path,
        purpose = spec.purpose,
    )
}
