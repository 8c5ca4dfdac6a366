//! Stackgen: prompt-to-backend generation jobs
//!
//! A prompt is planned into a list of files by a language model, the files are
//! generated in bounded concurrent batches into a per-job workspace, and the
//! whole run is driven by a resumable job queue with retry and cancellation.

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod store;
pub mod workspace;
