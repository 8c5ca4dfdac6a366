//! Shared test utilities for integration tests
//!
//! Scripted planner and content generator standing in for the model provider,
//! plus isolation of the configuration environment variables.

use async_trait::async_trait;
use parking_lot::Mutex as PlMutex;
use stackgen::agent::{ContentGenerator, PlanGenerator};
use stackgen::error::ApiError;
use stackgen::generation::{
    FileSpec, GeneratedFile, Orchestrator, OrchestratorConfig, PackageManager, Plan, Stack,
};
use stackgen::retry::RetryPolicy;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ISOLATED_VARS: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "XDG_DATA_HOME",
    "STACKGEN_ENV",
    "STACKGEN__WORKSPACE_ROOT",
    "STACKGEN__PROVIDER__MODEL",
    "STACKGEN__GENERATION__BATCH_SIZE",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: ISOLATED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(v) => std::env::set_var(name, v),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`, every
/// stackgen/OpenAI variable cleared, then `vars` applied. The original
/// environment is restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();

    for name in ISOLATED_VARS {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    env_state.restore();

    result
}

/// Millisecond backoff so retry paths stay fast under the real clock.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 4,
        backoff_multiplier: 2.0,
    }
}

pub fn plan_with(paths: &[&str]) -> Plan {
    Plan {
        stack: Stack::NodeExpressTs,
        package_manager: PackageManager::Npm,
        modules: vec!["express".to_string(), "typescript".to_string()],
        files: paths
            .iter()
            .map(|p| FileSpec::new(*p, format!("implements {}", p)))
            .collect(),
    }
}

/// Five-file todo API used across scenarios.
pub fn todo_api_plan() -> Plan {
    plan_with(&[
        "package.json",
        "tsconfig.json",
        "src/index.ts",
        "src/routes/todos.ts",
        "src/models/todo.ts",
    ])
}

/// Returns the same plan every call.
pub struct ScriptedPlanner {
    plan: Plan,
    calls: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn new(plan: Plan) -> Arc<Self> {
        Arc::new(Self {
            plan,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanGenerator for ScriptedPlanner {
    async fn generate_plan(&self, _prompt: &str) -> Result<Plan, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.plan.clone())
    }
}

/// Rejects every call as if the API key were wrong.
#[derive(Default)]
pub struct RejectingPlanner {
    calls: AtomicUsize,
}

impl RejectingPlanner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanGenerator for RejectingPlanner {
    async fn generate_plan(&self, _prompt: &str) -> Result<Plan, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::ProviderAuthFailed("invalid api key".to_string()))
    }
}

/// Writes `// <path>` for every file except the ones told to fail.
#[derive(Default)]
pub struct ScriptedGenerator {
    failing: HashSet<String>,
    seen: PlMutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(paths: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            seen: PlMutex::new(Vec::new()),
        })
    }

    /// Every call made, including retries.
    pub fn calls_for(&self, path: &str) -> usize {
        self.seen.lock().iter().filter(|p| p.as_str() == path).count()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_file(&self, spec: &FileSpec, _plan: &Plan) -> Result<GeneratedFile, ApiError> {
        self.seen.lock().push(spec.path.clone());
        tokio::time::sleep(Duration::from_millis(2)).await;
        if self.failing.contains(&spec.path) {
            return Err(ApiError::ProviderRequestFailed(format!(
                "upstream error for {}",
                spec.path
            )));
        }
        Ok(GeneratedFile {
            path: spec.path.clone(),
            content: format!("// {}\n", spec.path),
        })
    }
}

pub fn orchestrator(
    planner: Arc<dyn PlanGenerator>,
    generator: Arc<dyn ContentGenerator>,
) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        planner,
        generator,
        fast_retry(),
        OrchestratorConfig {
            max_files_per_job: 20,
            batch_size: 3,
        },
    ))
}

/// Start or end of one generation call, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Started(String),
    Finished(String),
}

/// Records call order and the highest number of calls in flight at once.
#[derive(Default)]
pub struct TracingGenerator {
    events: PlMutex<Vec<CallEvent>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TracingGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for TracingGenerator {
    async fn generate_file(&self, spec: &FileSpec, _plan: &Plan) -> Result<GeneratedFile, ApiError> {
        self.events.lock().push(CallEvent::Started(spec.path.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(CallEvent::Finished(spec.path.clone()));
        Ok(GeneratedFile {
            path: spec.path.clone(),
            content: format!("// {}\n", spec.path),
        })
    }
}
