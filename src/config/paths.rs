//! Per-user locations: XDG config home and the local data directory.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

pub const APP_NAME: &str = "stackgen";

/// `$XDG_CONFIG_HOME/stackgen`, falling back to `~/.config/stackgen`.
pub fn global_config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join(APP_NAME));
    }
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".config").join(APP_NAME))
}

pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Default sled directory for job records.
pub fn default_job_store_path() -> PathBuf {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_local_dir().join("jobs"))
        .unwrap_or_else(|| PathBuf::from(".stackgen").join("jobs"))
}
