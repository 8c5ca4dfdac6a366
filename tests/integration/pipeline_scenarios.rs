//! End-to-end runs of the generation pipeline against scripted model output.

use crate::integration::test_utils::{
    orchestrator, plan_with, todo_api_plan, CallEvent, ScriptedGenerator, ScriptedPlanner,
    TracingGenerator,
};
use parking_lot::Mutex;
use stackgen::generation::{
    JobContext, NoProgress, ProgressSink, MESSAGE_ALL_FAILED, MESSAGE_ALL_SUCCEEDED,
    MESSAGE_PARTIAL,
};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

fn context(workspace: &Path) -> JobContext {
    JobContext {
        job_id: "job-1".to_string(),
        request_id: "req-1".to_string(),
        prompt: "Build a todo API with CRUD endpoints".to_string(),
        workspace: workspace.to_path_buf(),
        cancel: CancellationToken::new(),
    }
}

fn written_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[derive(Default)]
struct Recorded(Mutex<Vec<u8>>);

impl ProgressSink for Recorded {
    fn report(&self, progress: u8) {
        self.0.lock().push(progress);
    }
}

#[tokio::test]
async fn todo_api_generates_every_file_in_two_batches() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("job-1");
    let orchestrator = orchestrator(ScriptedPlanner::new(todo_api_plan()), ScriptedGenerator::new());
    let progress = Recorded::default();

    let result = orchestrator.run(&context(&workspace), &progress).await.unwrap();

    assert!(result.success);
    assert_eq!(result.message, MESSAGE_ALL_SUCCEEDED);
    assert_eq!(
        result.files,
        vec![
            "package.json",
            "tsconfig.json",
            "src/index.ts",
            "src/routes/todos.ts",
            "src/models/todo.ts",
        ]
    );
    assert!(result.errors.is_none());
    // two batches, each at least one 2ms generator call
    assert!(result.duration_ms >= 4);

    // 3 of 5 files after the first batch, all 5 after the second
    assert_eq!(*progress.0.lock(), vec![61, 95]);

    assert_eq!(
        written_files(&workspace),
        vec![
            "package.json",
            "src/index.ts",
            "src/models/todo.ts",
            "src/routes/todos.ts",
            "tsconfig.json",
        ]
    );
    let index = std::fs::read_to_string(workspace.join("src/index.ts")).unwrap();
    assert_eq!(index, "// src/index.ts\n");
}

#[tokio::test]
async fn one_failing_file_yields_partial_success() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("job-1");
    let generator = ScriptedGenerator::failing(&["src/models/todo.ts"]);
    let orchestrator = orchestrator(ScriptedPlanner::new(todo_api_plan()), generator.clone());

    let result = orchestrator.run(&context(&workspace), &NoProgress).await.unwrap();

    assert!(result.success);
    assert_eq!(result.message, MESSAGE_PARTIAL);
    assert_eq!(result.files.len(), 4);
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("src/models/todo.ts: "));
    assert!(!workspace.join("src/models/todo.ts").exists());
    // The failing file went through the full per-file retry schedule
    assert_eq!(generator.calls_for("src/models/todo.ts"), 3);
    assert_eq!(generator.calls_for("src/index.ts"), 1);
}

#[tokio::test]
async fn traversal_in_plan_rejects_job_before_any_write() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("job-1");
    let plan = plan_with(&["package.json", "../outside.ts", "src/index.ts"]);
    let generator = ScriptedGenerator::new();
    let orchestrator = orchestrator(ScriptedPlanner::new(plan), generator.clone());

    let err = orchestrator
        .run(&context(&workspace), &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_PATH");
    assert!(written_files(&workspace).is_empty());
    assert!(!dir.path().join("outside.ts").exists());
    assert_eq!(generator.calls_for("package.json"), 0);
}

#[tokio::test]
async fn every_file_failing_is_reported_not_raised() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("job-1");
    let plan = plan_with(&["package.json", "src/index.ts"]);
    let orchestrator = orchestrator(
        ScriptedPlanner::new(plan),
        ScriptedGenerator::failing(&["package.json", "src/index.ts"]),
    );

    let result = orchestrator.run(&context(&workspace), &NoProgress).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.message, MESSAGE_ALL_FAILED);
    assert!(result.files.is_empty());
    assert_eq!(result.errors.unwrap().len(), 2);
}

#[tokio::test]
async fn rerun_starts_from_a_clean_workspace() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("job-1");
    std::fs::create_dir_all(workspace.join("stale")).unwrap();
    std::fs::write(workspace.join("stale/leftover.ts"), "old").unwrap();

    let planner = ScriptedPlanner::new(plan_with(&["package.json"]));
    let orchestrator = orchestrator(planner.clone(), ScriptedGenerator::new());
    orchestrator.run(&context(&workspace), &NoProgress).await.unwrap();

    assert_eq!(written_files(&workspace), vec!["package.json"]);
    assert_eq!(planner.calls(), 1);
}

#[tokio::test]
async fn seven_files_run_in_batches_of_three_three_one() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("job-1");
    let paths = ["f0.ts", "f1.ts", "f2.ts", "f3.ts", "f4.ts", "f5.ts", "f6.ts"];
    let generator = TracingGenerator::new();
    let orchestrator = orchestrator(ScriptedPlanner::new(plan_with(&paths)), generator.clone());

    let result = orchestrator.run(&context(&workspace), &NoProgress).await.unwrap();
    assert_eq!(result.message, MESSAGE_ALL_SUCCEEDED);
    assert_eq!(result.files.len(), 7);

    assert!(generator.peak() <= 3, "peak in flight was {}", generator.peak());

    let events = generator.events();
    assert_eq!(events.len(), 14);
    let position = |event: CallEvent| events.iter().position(|e| *e == event).unwrap();

    let batches: Vec<&[&str]> = paths.chunks(3).collect();
    assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![3, 3, 1]);

    for pair in batches.windows(2) {
        let last_finish = pair[0]
            .iter()
            .map(|p| position(CallEvent::Finished(p.to_string())))
            .max()
            .unwrap();
        let first_start = pair[1]
            .iter()
            .map(|p| position(CallEvent::Started(p.to_string())))
            .min()
            .unwrap();
        assert!(
            last_finish < first_start,
            "batch {:?} started before {:?} finished",
            pair[1],
            pair[0]
        );
    }

    // the starts themselves come in groups of 3, 3 and 1
    let starts: Vec<&CallEvent> = events
        .iter()
        .filter(|e| matches!(e, CallEvent::Started(_)))
        .collect();
    for (batch, chunk) in batches.iter().zip(starts.chunks(3)) {
        let mut started: Vec<String> = chunk
            .iter()
            .map(|e| match e {
                CallEvent::Started(path) => path.clone(),
                CallEvent::Finished(path) => path.clone(),
            })
            .collect();
        started.sort();
        assert_eq!(started, batch.iter().map(|p| p.to_string()).collect::<Vec<_>>());
    }
}
