//! Integration tests for stackgen

mod config_integration;
mod job_queue;
mod path_safety_props;
mod pipeline_scenarios;
mod test_utils;
