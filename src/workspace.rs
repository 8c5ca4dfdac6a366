//! Workspace domain: per-job directory preparation and path safety for
//! generated output.

mod path_safety;
mod prep;

pub use path_safety::{assert_safe, check_relative_path, is_relative_path_safe, is_safe, resolve_within};
pub use prep::{job_workspace, prepare_workspace};
