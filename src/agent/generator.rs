use super::prompt::{build_file_prompt, GENERATOR_SYSTEM_PROMPT};
use super::structured::parse_structured;
use super::ContentGenerator;
use crate::error::ApiError;
use crate::generation::{FileSpec, GeneratedFile, Plan};
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::workspace::assert_safe;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry context for one file's generation call.
pub fn file_retry_context(path: &str) -> String {
    format!("file-generation:{}", path)
}

/// Per-file generator backed by a chat-completions provider in JSON mode.
pub struct LlmFileGenerator {
    client: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl LlmFileGenerator {
    pub fn new(client: Arc<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl ContentGenerator for LlmFileGenerator {
    async fn generate_file(&self, spec: &FileSpec, plan: &Plan) -> Result<GeneratedFile, ApiError> {
        let messages = vec![
            ChatMessage::system(GENERATOR_SYSTEM_PROMPT),
            ChatMessage::user(build_file_prompt(spec, plan)),
        ];
        let options = CompletionOptions {
            json_mode: true,
            ..self.options.clone()
        };

        let response = self.client.complete(messages, options).await?;
        debug!(
            path = %spec.path,
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Generator response received"
        );
        parse_structured(&response.content, "file")
    }
}

/// Generates one planned file and writes it under the job workspace.
pub struct GeneratorAdapter {
    generator: Arc<dyn ContentGenerator>,
    policy: RetryPolicy,
}

impl GeneratorAdapter {
    pub fn new(generator: Arc<dyn ContentGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Returns the absolute path written.
    ///
    /// Only the collaborator call is retried. Empty content, an unsafe
    /// returned path, and write failures fail the file immediately.
    pub async fn generate_file(
        &self,
        spec: &FileSpec,
        plan: &Plan,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ApiError> {
        debug!(path = %spec.path, component = "code-generator", "Generating file");

        let executor = RetryExecutor::new(self.policy).with_cancellation(cancel.clone());
        let generated = executor
            .execute(&file_retry_context(&spec.path), |_| {
                self.generator.generate_file(spec, plan)
            })
            .await?;

        if generated.content.trim().is_empty() {
            return Err(ApiError::EmptyContent(spec.path.clone()));
        }
        if generated.path != spec.path {
            warn!(
                planned = %spec.path,
                returned = %generated.path,
                "Generator returned a different path than planned"
            );
        }

        let target = assert_safe(workspace, &generated.path)?;
        write_file(workspace, &target, &generated).await?;

        info!(path = %generated.path, component = "code-generator", "File generated successfully");
        Ok(target)
    }
}

async fn write_file(workspace: &Path, target: &Path, file: &GeneratedFile) -> Result<(), ApiError> {
    let write_error = |e: std::io::Error| ApiError::FileWriteError {
        path: file.path.clone(),
        message: e.to_string(),
    };
    let real_root = dunce::canonicalize(workspace).map_err(write_error)?;

    if let Some(parent) = target.parent() {
        // Nothing may be created through a symlink that leaves the workspace.
        let existing = nearest_existing_ancestor(parent).await;
        ensure_real_inside(&real_root, &existing, &file.path)?;
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        ensure_real_inside(&real_root, parent, &file.path)?;
    }
    tokio::fs::write(target, file.content.as_bytes())
        .await
        .map_err(write_error)
}

/// First component of `path`, walking upwards, that is present on disk.
/// Dangling symlinks count as present so that canonicalizing them fails.
async fn nearest_existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path;
    loop {
        if tokio::fs::symlink_metadata(current).await.is_ok() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return current.to_path_buf(),
        }
    }
}

/// The lexical check cannot see symlinks; the real location of `dir` must
/// still be under the canonical workspace root.
fn ensure_real_inside(real_root: &Path, dir: &Path, path: &str) -> Result<(), ApiError> {
    let real_dir = dunce::canonicalize(dir).map_err(|e| ApiError::FileWriteError {
        path: path.to_string(),
        message: format!("cannot resolve {}: {}", dir.display(), e),
    })?;
    if real_dir.starts_with(real_root) {
        Ok(())
    } else {
        Err(ApiError::PathTraversal(path.to_string()))
    }
}
