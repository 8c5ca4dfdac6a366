//! Integration tests for the configuration layers

use crate::integration::test_utils::with_isolated_env;
use stackgen::config::{ConfigLoader, JobStoreKind, ProviderType};
use std::path::PathBuf;
use tempfile::TempDir;

fn write(path: PathBuf, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

#[test]
fn test_config_file_overrides_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("stackgen.toml");
    write(
        config_file.clone(),
        r#"
workspace_root = "/srv/generated"

[provider]
provider_type = "ollama"
model = "llama3"

[generation]
batch_size = 5

[generation.retry]
max_retries = 4
base_delay_ms = 250

[worker]
concurrency = 4

[storage]
job_store = "memory"
"#,
    );

    let config = with_isolated_env(&temp_dir, &[], || {
        ConfigLoader::load_from_file(&config_file).unwrap()
    });

    assert!(config.validate().is_ok());
    assert_eq!(config.workspace_root, PathBuf::from("/srv/generated"));
    assert_eq!(config.provider.provider_type, ProviderType::Ollama);
    assert_eq!(config.provider.model, "llama3");
    assert_eq!(config.generation.batch_size, 5);
    assert_eq!(config.generation.retry.max_retries, 4);
    assert_eq!(config.generation.retry.base_delay_ms, 250);
    // Unset retry fields keep their defaults
    assert_eq!(config.generation.retry.max_delay_ms, 10_000);
    assert_eq!(config.worker.concurrency, 4);
    assert_eq!(config.storage.job_store, JobStoreKind::Memory);
    assert_eq!(config.limits.max_files_per_job, 20);

    let orchestrator = config.orchestrator_config();
    assert_eq!(orchestrator.batch_size, 5);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");
    assert!(ConfigLoader::load_from_file(&missing).is_err());
}

#[test]
fn test_layers_apply_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("project");

    write(
        temp_dir.path().join("stackgen").join("config.toml"),
        r#"
[generation]
batch_size = 2

[worker]
concurrency = 6
"#,
    );
    write(
        workspace.join("config").join("config.toml"),
        r#"
[generation]
batch_size = 4
"#,
    );
    write(
        workspace.join("config").join("production.toml"),
        r#"
[limits]
max_files_per_job = 12
"#,
    );

    let config = with_isolated_env(
        &temp_dir,
        &[
            ("STACKGEN_ENV", "production"),
            ("STACKGEN__WORKSPACE_ROOT", "/tmp/from-env"),
        ],
        || ConfigLoader::load(&workspace).unwrap(),
    );

    // global file
    assert_eq!(config.worker.concurrency, 6);
    // workspace file beats global
    assert_eq!(config.generation.batch_size, 4);
    // environment-specific workspace file
    assert_eq!(config.limits.max_files_per_job, 12);
    // environment beats every file
    assert_eq!(config.workspace_root, PathBuf::from("/tmp/from-env"));
}

#[test]
fn test_openai_variables_fill_provider() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("project");
    std::fs::create_dir_all(&workspace).unwrap();

    let config = with_isolated_env(
        &temp_dir,
        &[("OPENAI_API_KEY", "sk-from-env"), ("OPENAI_MODEL", "gpt-4o-mini")],
        || ConfigLoader::load(&workspace).unwrap(),
    );

    assert_eq!(config.provider.provider_type, ProviderType::OpenAI);
    assert_eq!(config.provider.effective_api_key(), Some("sk-from-env"));
    assert_eq!(config.provider.model, "gpt-4o-mini");
    assert!(config.provider.validate().is_ok());
}

#[test]
fn test_invalid_values_are_reported_per_section() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("stackgen.toml");
    write(
        config_file.clone(),
        r#"
[generation]
batch_size = 0

[worker]
concurrency = 0
"#,
    );

    let config = with_isolated_env(&temp_dir, &[], || {
        ConfigLoader::load_from_file(&config_file).unwrap()
    });
    let errors = config.validate().unwrap_err();
    assert!(errors.len() >= 2);
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(rendered.iter().any(|e| e.starts_with("Generation:")));
    assert!(rendered.iter().any(|e| e.starts_with("Worker:")));
}
