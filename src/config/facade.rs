//! Configuration loading entry point.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::StackgenConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace`: defaults, global file, workspace
    /// files, then environment.
    pub fn load(workspace: &Path) -> Result<StackgenConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace)?;
        let builder = environment::add_to_builder(builder);

        let mut config: StackgenConfig = builder.build()?.try_deserialize()?;
        environment::apply_provider_env(&mut config, |name| std::env::var(name).ok());
        debug!(workspace = %workspace.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults. The
    /// environment still applies.
    pub fn load_from_file(path: &Path) -> Result<StackgenConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);

        let mut config: StackgenConfig = builder.build()?.try_deserialize()?;
        environment::apply_provider_env(&mut config, |name| std::env::var(name).ok());
        debug!(config_path = %path.display(), "Configuration loaded from file");
        Ok(config)
    }
}
