//! Bounded fan-out for one batch of planned files.
//!
//! Every task in the batch is driven to completion and yields exactly one
//! `FileGenerationResult` carrying its own planned path. A panicking task is
//! caught and reported as a failure for that path; it never takes down the
//! batch or the job.

use super::plan::{FileSpec, Plan};
use super::result::FileGenerationResult;
use crate::agent::GeneratorAdapter;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("generation task panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("generation task panicked: {}", message)
    } else {
        "generation task panicked".to_string()
    }
}

/// Generate every file in `batch` concurrently and wait for all of them.
/// Results come back in batch order.
pub async fn generate_batch(
    generator: &GeneratorAdapter,
    batch: &[FileSpec],
    plan: &Plan,
    workspace: &Path,
    cancel: &CancellationToken,
    batch_index: usize,
) -> Vec<FileGenerationResult> {
    let mut tasks = FuturesUnordered::new();
    for (index, spec) in batch.iter().enumerate() {
        let task = AssertUnwindSafe(generator.generate_file(spec, plan, workspace, cancel))
            .catch_unwind()
            .map(move |outcome| (index, spec, outcome));
        tasks.push(task);
    }

    let mut settled: Vec<(usize, FileGenerationResult)> = Vec::with_capacity(batch.len());
    while let Some((index, spec, outcome)) = tasks.next().await {
        let result = match outcome {
            Ok(Ok(_)) => FileGenerationResult::succeeded(&spec.path),
            Ok(Err(err)) => {
                warn!(
                    batch_index,
                    path = %spec.path,
                    code = err.code(),
                    error = %err,
                    "File generation failed"
                );
                FileGenerationResult::failed(&spec.path, err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(batch_index, path = %spec.path, "{}", message);
                FileGenerationResult::failed(&spec.path, message)
            }
        };
        settled.push((index, result));
    }

    settled.sort_by_key(|(index, _)| *index);
    settled.into_iter().map(|(_, result)| result).collect()
}
