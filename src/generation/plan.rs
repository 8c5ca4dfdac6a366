use crate::error::ApiError;
use crate::workspace::check_relative_path;
use serde::{Deserialize, Serialize};

/// Target technology combination. Only one stack is generated today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Stack {
    #[serde(rename = "node-express-ts")]
    NodeExpressTs,
}

impl Stack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stack::NodeExpressTs => "node-express-ts",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
        }
    }
}

/// One file the plan asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    /// Relative file path from the project root
    pub path: String,
    /// What this file does; passed verbatim to the content generator
    pub purpose: String,
}

impl FileSpec {
    pub fn new(path: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            purpose: purpose.into(),
        }
    }
}

/// File-generation plan produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub stack: Stack,
    pub package_manager: PackageManager,
    /// Dependencies required by the generated project
    #[serde(default)]
    pub modules: Vec<String>,
    pub files: Vec<FileSpec>,
}

impl Plan {
    /// Plan-acceptance gate. Runs before any write: non-empty, at most
    /// `max_files` entries, every path syntactically safe.
    pub fn validate(&self, max_files: usize) -> Result<(), ApiError> {
        if self.files.is_empty() {
            return Err(ApiError::InvalidPlan(
                "Planner returned no files".to_string(),
            ));
        }
        if self.files.len() > max_files {
            return Err(ApiError::PlanTooLarge {
                count: self.files.len(),
                max: max_files,
            });
        }
        for file in &self.files {
            check_relative_path(&file.path)?;
        }
        Ok(())
    }

    /// Files partitioned into batches of `batch_size`, in plan order.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, FileSpec> {
        self.files.chunks(batch_size.max(1))
    }

    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.files.len().div_ceil(batch_size.max(1))
    }

    /// Every file except `path`, for cross-file context in prompts.
    pub fn other_files<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FileSpec> + 'a {
        self.files.iter().filter(move |f| f.path != path)
    }
}

/// Content returned by the generator for one file. Written to disk, then dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}
