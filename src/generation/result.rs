use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MESSAGE_ALL_SUCCEEDED: &str = "Backend generated successfully";
pub const MESSAGE_PARTIAL: &str = "Backend generated with some errors";
pub const MESSAGE_ALL_FAILED: &str = "All file generations failed";

/// Outcome of generating one planned file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileGenerationResult {
    pub path: String,
    pub success: bool,
    pub error: Option<String>,
}

impl FileGenerationResult {
    pub fn succeeded(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregated outcome of one job run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    /// True when at least one file was written
    pub success: bool,
    pub message: String,
    /// Paths written successfully, in plan order
    pub files: Vec<String>,
    /// "path: error" per failed file; absent when every file succeeded
    pub errors: Option<Vec<String>>,
    /// Wall-clock milliseconds from job start to aggregation
    pub duration_ms: u64,
}

impl JobResult {
    pub fn aggregate(results: &[FileGenerationResult], duration: Duration) -> Self {
        let files: Vec<String> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.path.clone())
            .collect();
        let errors: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.path,
                    r.error.as_deref().unwrap_or("Unknown error")
                )
            })
            .collect();

        let message = if errors.is_empty() {
            MESSAGE_ALL_SUCCEEDED
        } else if files.is_empty() {
            MESSAGE_ALL_FAILED
        } else {
            MESSAGE_PARTIAL
        };

        Self {
            success: !files.is_empty(),
            message: message.to_string(),
            files,
            errors: if errors.is_empty() { None } else { Some(errors) },
            duration_ms: duration.as_millis() as u64,
        }
    }
}
