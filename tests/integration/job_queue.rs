//! Job queue driving the real orchestrator: submission through completion,
//! whole-job retry, and resumption from a persistent store.

use crate::integration::test_utils::{
    fast_retry, orchestrator, plan_with, todo_api_plan, RejectingPlanner, ScriptedGenerator,
    ScriptedPlanner,
};
use stackgen::api::GenerationService;
use stackgen::config::{LimitsConfig, ProviderConfig, ProviderType};
use stackgen::jobs::{JobPayload, JobQueue, JobQueueConfig, JobRecord, JobState};
use stackgen::store::{InMemoryJobStore, JobStore, SledJobStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const POLL: Duration = Duration::from_millis(10);

fn queue_config(dir: &TempDir) -> JobQueueConfig {
    JobQueueConfig {
        concurrency: 2,
        job_retry: fast_retry(),
        workspace_root: dir.path().join("workspace"),
        ..JobQueueConfig::default()
    }
}

fn payload(request_id: &str) -> JobPayload {
    JobPayload {
        prompt: "Build a todo API with CRUD endpoints".to_string(),
        request_id: request_id.to_string(),
    }
}

#[tokio::test]
async fn submitted_job_completes_with_files_in_its_own_workspace() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(ScriptedPlanner::new(todo_api_plan()), ScriptedGenerator::new());
    let queue = Arc::new(JobQueue::new(
        Arc::new(InMemoryJobStore::new()),
        orchestrator.clone(),
        queue_config(&dir),
    ));
    let provider = ProviderConfig {
        provider_type: ProviderType::Ollama,
        model: "llama3".to_string(),
        ..ProviderConfig::default()
    };
    let service = GenerationService::new(queue, orchestrator, LimitsConfig::default(), provider);

    assert_eq!(service.health().unwrap().status, "degraded");
    service.start().await.unwrap();
    let health = service.health().unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.provider_ready);
    assert!(health.queue_running);

    let submission = service
        .submit("Build a todo API with CRUD endpoints")
        .await
        .unwrap();
    assert_eq!(submission.status_url, format!("/jobs/{}", submission.job_id));

    let view = service.wait(&submission.job_id, POLL).await.unwrap();
    service.stop().await.unwrap();

    assert_eq!(view.state, JobState::Completed);
    assert_eq!(view.progress, 100);
    let result = view.result.unwrap();
    assert!(result.success);
    assert_eq!(result.files.len(), 5);

    let job_dir = dir.path().join("workspace").join(&submission.job_id);
    assert!(job_dir.join("src/routes/todos.ts").is_file());
}

#[tokio::test]
async fn oversized_plan_fails_after_every_job_attempt() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<String> = (0..25).map(|i| format!("src/file{}.ts", i)).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let planner = ScriptedPlanner::new(plan_with(&refs));
    let orchestrator = orchestrator(planner.clone(), ScriptedGenerator::new());
    let queue = JobQueue::new(
        Arc::new(InMemoryJobStore::new()),
        orchestrator,
        queue_config(&dir),
    );

    queue.start().await.unwrap();
    let id = queue.enqueue(payload("req-big")).await.unwrap();
    let record = queue.wait_for_terminal(&id, POLL).await.unwrap();
    queue.stop().await.unwrap();

    assert_eq!(record.state, JobState::Failed);
    assert_eq!(record.attempts_made, 3);
    assert_eq!(planner.calls(), 3);
    let failure = record.failure.unwrap();
    assert_eq!(failure.code, "PLAN_TOO_LARGE");
}

#[tokio::test]
async fn rejected_credentials_fail_the_job_after_one_planner_call() {
    let dir = TempDir::new().unwrap();
    let planner = RejectingPlanner::new();
    let generator = ScriptedGenerator::new();
    let queue = JobQueue::new(
        Arc::new(InMemoryJobStore::new()),
        orchestrator(planner.clone(), generator.clone()),
        queue_config(&dir),
    );

    queue.start().await.unwrap();
    let id = queue.enqueue(payload("req-auth")).await.unwrap();
    let record = queue.wait_for_terminal(&id, POLL).await.unwrap();
    queue.stop().await.unwrap();

    assert_eq!(planner.calls(), 1);
    assert_eq!(record.state, JobState::Failed);
    assert_eq!(record.attempts_made, 1);
    let failure = record.failure.unwrap();
    assert_eq!(failure.code, "SERVICE_UNAVAILABLE");
    assert!(failure.reason.contains("planner-generation failed after 1 attempts"));
    assert!(failure.reason.contains("Provider authentication failed"));
    assert_eq!(generator.calls_for("package.json"), 0);
}

#[tokio::test]
async fn interrupted_jobs_resume_from_sled_store() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("jobs");

    let (waiting_id, active_id, done_id) = {
        let store = SledJobStore::new(&store_path).unwrap();

        let waiting = JobRecord::new(payload("req-waiting"));
        store.put(&waiting).unwrap();

        let mut active = JobRecord::new(payload("req-active"));
        active.mark_active();
        active.set_progress(40);
        store.put(&active).unwrap();

        let mut done = JobRecord::new(payload("req-done"));
        done.mark_active();
        done.fail(&stackgen::error::ApiError::InvalidPlan("no files".to_string()));
        store.put(&done).unwrap();

        store.flush().unwrap();
        (waiting.id, active.id, done.id)
    };

    let planner = ScriptedPlanner::new(plan_with(&["package.json", "src/index.ts"]));
    let queue = JobQueue::new(
        Arc::new(SledJobStore::new(&store_path).unwrap()),
        orchestrator(planner.clone(), ScriptedGenerator::new()),
        queue_config(&dir),
    );
    queue.start().await.unwrap();

    let waiting = queue.wait_for_terminal(&waiting_id, POLL).await.unwrap();
    let active = queue.wait_for_terminal(&active_id, POLL).await.unwrap();
    queue.stop().await.unwrap();

    assert_eq!(waiting.state, JobState::Completed);
    assert_eq!(active.state, JobState::Completed);
    assert_eq!(active.attempts_made, 2);
    assert_eq!(active.progress, 100);
    // Terminal records are left alone
    assert_eq!(planner.calls(), 2);
    let done = queue.get_job(&done_id).unwrap().unwrap();
    assert_eq!(done.state, JobState::Failed);
    assert_eq!(done.attempts_made, 1);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(ScriptedPlanner::new(todo_api_plan()), ScriptedGenerator::new());
    let queue = Arc::new(JobQueue::new(
        Arc::new(InMemoryJobStore::new()),
        orchestrator.clone(),
        queue_config(&dir),
    ));
    let service = GenerationService::new(
        queue,
        orchestrator,
        LimitsConfig::default(),
        ProviderConfig::default(),
    );

    let missing = uuid::Uuid::new_v4().to_string();
    assert_eq!(service.status(&missing).unwrap_err().code(), "NOT_FOUND");
    assert_eq!(service.status("not-a-job").unwrap_err().code(), "NOT_FOUND");
    assert_eq!(service.cancel(&missing).await.unwrap_err().code(), "NOT_FOUND");
}
