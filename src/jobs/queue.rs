//! Job Queue
//!
//! FIFO queue of generation jobs drained by a fixed pool of workers. Job
//! records live in a `JobStore`; the in-memory deque only holds ids waiting
//! to be claimed. A failed attempt is retried with exponential backoff,
//! restarting the whole run, unless the error is not worth retrying.

use super::executor::JobExecutor;
use super::model::{JobId, JobPayload, JobRecord, JobState};
use super::retention::RetentionPolicy;
use crate::error::ApiError;
use crate::generation::{JobContext, JobResult, ProgressSink, PROGRESS_STARTED};
use crate::retry::RetryPolicy;
use crate::store::JobStore;
use crate::workspace::job_workspace;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Configuration for the job queue
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Number of workers, i.e. jobs processed at once
    pub concurrency: usize,
    /// Attempts and backoff for whole-job retries
    pub job_retry: RetryPolicy,
    pub retention: RetentionPolicy,
    /// Each job writes into `<workspace_root>/<job_id>`
    pub workspace_root: PathBuf,
    /// Upper bound on waiting jobs; `enqueue` fails with `QueueFull` beyond it
    pub max_waiting: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            job_retry: RetryPolicy::job_default(),
            retention: RetentionPolicy::default(),
            workspace_root: PathBuf::from("./workspace"),
            max_waiting: 1000,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

struct QueueShared {
    pending: Mutex<VecDeque<JobId>>,
    notify: Notify,
    store: Arc<dyn JobStore>,
    executor: Arc<dyn JobExecutor>,
    /// Serializes read-modify-write of records. Never held across an await.
    record_lock: parking_lot::Mutex<()>,
    active: parking_lot::Mutex<HashMap<JobId, CancellationToken>>,
    running: RwLock<bool>,
    /// Waiting jobs sleeping out a retry delay, not yet back in `pending`
    backing_off: AtomicUsize,
    config: JobQueueConfig,
}

impl QueueShared {
    /// Waiting -> Active. `None` when the job was removed or is not waiting.
    fn claim(&self, id: &JobId) -> Result<Option<JobRecord>, ApiError> {
        let _guard = self.record_lock.lock();
        let Some(mut record) = self.store.get(id)? else {
            return Ok(None);
        };
        if record.state != JobState::Waiting {
            return Ok(None);
        }
        record.mark_active();
        self.store.put(&record)?;
        Ok(Some(record))
    }

    /// Apply `f` to a stored record. `None` when the record no longer exists.
    fn modify<F>(&self, id: &JobId, f: F) -> Result<Option<JobRecord>, ApiError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let _guard = self.record_lock.lock();
        let Some(mut record) = self.store.get(id)? else {
            return Ok(None);
        };
        f(&mut record);
        self.store.put(&record)?;
        Ok(Some(record))
    }

    fn settle(
        self: &Arc<Self>,
        worker_id: usize,
        id: JobId,
        outcome: Result<JobResult, ApiError>,
        cancelled: bool,
    ) -> Result<(), ApiError> {
        match outcome {
            Ok(result) => match self.modify(&id, |record| record.complete(result))? {
                Some(record) => info!(
                    worker_id,
                    job_id = %id,
                    request_id = %record.payload.request_id,
                    attempt = record.attempts_made,
                    "Job completed"
                ),
                None => {
                    debug!(worker_id, job_id = %id, "Job removed while running, result dropped");
                    self.discard_workspace(&id);
                }
            },
            Err(err) => {
                let policy = self.config.job_retry;
                let mut retry_delay = None;
                let updated = self.modify(&id, |record| {
                    let retry = !cancelled
                        && err.is_job_retryable()
                        && record.attempts_made < policy.attempts();
                    if retry {
                        record.requeue(&err);
                        retry_delay = Some(policy.delay_for_attempt(record.attempts_made));
                    } else {
                        record.fail(&err);
                    }
                })?;

                let Some(record) = updated else {
                    debug!(worker_id, job_id = %id, "Job removed while running, error dropped");
                    self.discard_workspace(&id);
                    return Ok(());
                };
                match retry_delay {
                    Some(delay) => {
                        warn!(
                            worker_id,
                            job_id = %id,
                            attempt = record.attempts_made,
                            next_retry_ms = delay.as_millis() as u64,
                            code = err.code(),
                            error = %err,
                            "Job attempt failed, retrying"
                        );
                        self.schedule_retry(id, delay);
                    }
                    None => error!(
                        worker_id,
                        job_id = %id,
                        request_id = %record.payload.request_id,
                        attempt = record.attempts_made,
                        code = err.code(),
                        error = %err,
                        "Job failed permanently"
                    ),
                }
            }
        }
        Ok(())
    }

    fn schedule_retry(self: &Arc<Self>, id: JobId, delay: Duration) {
        let shared = Arc::clone(self);
        shared.backing_off.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            sleep(delay).await;
            match shared.store.get(&id) {
                Ok(Some(record)) if record.state == JobState::Waiting => {
                    let mut pending = shared.pending.lock().await;
                    pending.push_back(id);
                    shared.backing_off.fetch_sub(1, Ordering::SeqCst);
                    drop(pending);
                    shared.notify.notify_one();
                }
                Ok(_) => {
                    shared.backing_off.fetch_sub(1, Ordering::SeqCst);
                    debug!(job_id = %id, "Retry dropped, job no longer waiting");
                }
                Err(e) => {
                    shared.backing_off.fetch_sub(1, Ordering::SeqCst);
                    error!(job_id = %id, error = %e, "Failed to load job for retry");
                }
            }
        });
    }

    fn prune(&self) -> Result<usize, ApiError> {
        let expired = {
            let _guard = self.record_lock.lock();
            let records = self.store.list_all()?;
            let expired = self.config.retention.expired(&records, Utc::now());
            for id in &expired {
                self.store.delete(id)?;
            }
            expired
        };
        for id in &expired {
            self.discard_workspace(id);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "Pruned finished jobs");
        }
        Ok(expired.len())
    }

    /// Best-effort removal of a job's output directory.
    fn discard_workspace(&self, id: &JobId) {
        let dir = job_workspace(&self.config.workspace_root, &id.to_string());
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!(job_id = %id, path = %dir.display(), "Removed job workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %id,
                path = %dir.display(),
                error = %e,
                "Failed to remove job workspace"
            ),
        }
    }

    /// Waiting jobs, whether queued or sleeping out a retry delay.
    fn waiting_count(&self, pending: &VecDeque<JobId>) -> usize {
        pending.len() + self.backing_off.load(Ordering::SeqCst)
    }
}

/// Writes progress into the job record while the job is active.
struct RecordProgress {
    shared: Arc<QueueShared>,
    id: JobId,
}

impl ProgressSink for RecordProgress {
    fn report(&self, progress: u8) {
        let result = self.shared.modify(&self.id, |record| {
            if record.state == JobState::Active {
                record.set_progress(progress);
            }
        });
        if let Err(e) = result {
            warn!(job_id = %self.id, error = %e, "Failed to record job progress");
        }
    }
}

/// Job queue with a fixed worker pool
pub struct JobQueue {
    shared: Arc<QueueShared>,
    workers: RwLock<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<dyn JobExecutor>,
        config: JobQueueConfig,
    ) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                pending: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                store,
                executor,
                record_lock: parking_lot::Mutex::new(()),
                active: parking_lot::Mutex::new(HashMap::new()),
                running: RwLock::new(false),
                backing_off: AtomicUsize::new(0),
                config,
            }),
            workers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.shared.config
    }

    pub fn is_running(&self) -> bool {
        *self.shared.running.read()
    }

    /// Add a job in the Waiting state and wake a worker.
    pub async fn enqueue(&self, payload: JobPayload) -> Result<JobId, ApiError> {
        let mut pending = self.shared.pending.lock().await;
        let waiting = self.shared.waiting_count(&pending);
        if waiting >= self.shared.config.max_waiting {
            warn!(
                queue_size = waiting,
                max_size = self.shared.config.max_waiting,
                "Job queue is full, rejecting job"
            );
            return Err(ApiError::QueueFull(waiting));
        }

        let record = JobRecord::new(payload);
        {
            let _guard = self.shared.record_lock.lock();
            self.shared.store.put(&record)?;
        }
        pending.push_back(record.id);
        drop(pending);
        self.shared.notify.notify_one();

        info!(
            job_id = %record.id,
            request_id = %record.payload.request_id,
            "Job queued"
        );
        Ok(record.id)
    }

    /// Snapshot of a job, or `None` if unknown or pruned.
    pub fn get_job(&self, id: &JobId) -> Result<Option<JobRecord>, ApiError> {
        Ok(self.shared.store.get(id)?)
    }

    /// Remove a job. A waiting job never runs afterwards. An active job has
    /// its cancellation signal raised; work already in flight may still
    /// finish, but its outcome is discarded. The job's workspace directory
    /// goes with it, once no worker is writing into it.
    pub async fn remove(&self, id: &JobId) -> Result<bool, ApiError> {
        let removed = {
            let _guard = self.shared.record_lock.lock();
            let Some(record) = self.shared.store.get(id)? else {
                return Ok(false);
            };
            if record.state == JobState::Active {
                if let Some(token) = self.shared.active.lock().get(id) {
                    token.cancel();
                }
            }
            self.shared.store.delete(id)?;
            record
        };

        if removed.state != JobState::Active {
            self.shared.pending.lock().await.retain(|queued| queued != id);
            self.shared.discard_workspace(id);
        }
        info!(job_id = %id, state = %removed.state, "Job removed");
        Ok(true)
    }

    /// Start background workers. Jobs left Waiting or Active by a previous
    /// process are queued again first.
    pub async fn start(&self) -> Result<(), ApiError> {
        {
            let mut running = self.shared.running.write();
            if *running {
                return Ok(()); // Already running
            }
            *running = true;
        }

        let resumed = self.resume().await?;
        if resumed > 0 {
            info!(resumed, "Resumed unfinished jobs");
        }

        let worker_count = self.shared.config.concurrency.max(1);
        let mut workers = self.workers.write();
        for worker_id in 0..worker_count {
            let shared = Arc::clone(&self.shared);
            workers.push(tokio::spawn(Self::worker_loop(worker_id, shared)));
        }

        info!(worker_count = workers.len(), "Started job queue workers");
        Ok(())
    }

    /// Stop background workers (graceful: running jobs finish first).
    pub async fn stop(&self) -> Result<(), ApiError> {
        {
            let mut running = self.shared.running.write();
            if !*running {
                return Ok(()); // Already stopped
            }
            *running = false;
        }
        self.shared.notify.notify_waiters();

        let workers = std::mem::take(&mut *self.workers.write());
        for handle in workers {
            let _ = handle.await;
        }

        info!("Stopped job queue workers");
        Ok(())
    }

    /// Counts by state over every job still in the store.
    pub fn stats(&self) -> Result<QueueStats, ApiError> {
        let mut stats = QueueStats::default();
        for record in self.shared.store.list_all()? {
            match record.state {
                JobState::Waiting => stats.waiting += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Apply the retention policy now.
    pub fn prune(&self) -> Result<usize, ApiError> {
        self.shared.prune()
    }

    /// Poll until the job is Completed or Failed.
    pub async fn wait_for_terminal(
        &self,
        id: &JobId,
        poll_interval: Duration,
    ) -> Result<JobRecord, ApiError> {
        loop {
            match self.get_job(id)? {
                Some(record) if record.state.is_terminal() => return Ok(record),
                Some(_) => sleep(poll_interval).await,
                None => return Err(ApiError::JobNotFound(id.to_string())),
            }
        }
    }

    async fn resume(&self) -> Result<usize, ApiError> {
        let mut waiting = {
            let _guard = self.shared.record_lock.lock();
            let mut waiting = Vec::new();
            for mut record in self.shared.store.list_all()? {
                match record.state {
                    JobState::Active => {
                        // Interrupted mid-run; the next run starts from a clean workspace.
                        record.state = JobState::Waiting;
                        self.shared.store.put(&record)?;
                        waiting.push(record);
                    }
                    JobState::Waiting => waiting.push(record),
                    JobState::Completed | JobState::Failed => {}
                }
            }
            waiting
        };
        waiting.sort_by_key(|record| record.created_at);

        let mut pending = self.shared.pending.lock().await;
        let queued: HashSet<JobId> = pending.iter().copied().collect();
        let mut resumed = 0;
        for record in waiting {
            if !queued.contains(&record.id) {
                pending.push_back(record.id);
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    /// Worker loop for processing jobs
    async fn worker_loop(worker_id: usize, shared: Arc<QueueShared>) {
        debug!(worker_id, "Worker started");

        while *shared.running.read() {
            let next = {
                let mut pending = shared.pending.lock().await;
                pending.pop_front()
            };

            let Some(id) = next else {
                // Wake on enqueue, or periodically to notice a stop.
                tokio::select! {
                    _ = shared.notify.notified() => {
                        continue;
                    }
                    _ = sleep(IDLE_POLL) => {
                        continue;
                    }
                }
            };

            let record = match shared.claim(&id) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!(worker_id, job_id = %id, "Skipping job that is no longer waiting");
                    continue;
                }
                Err(e) => {
                    error!(worker_id, job_id = %id, error = %e, "Failed to claim job");
                    continue;
                }
            };

            Self::process(worker_id, &shared, record).await;
        }

        debug!(worker_id, "Worker stopped");
    }

    async fn process(worker_id: usize, shared: &Arc<QueueShared>, record: JobRecord) {
        let id = record.id;
        let cancel = CancellationToken::new();
        shared.active.lock().insert(id, cancel.clone());

        let ctx = JobContext {
            job_id: id.to_string(),
            request_id: record.payload.request_id.clone(),
            prompt: record.payload.prompt.clone(),
            workspace: job_workspace(&shared.config.workspace_root, &id.to_string()),
            cancel: cancel.clone(),
        };
        info!(
            worker_id,
            job_id = %id,
            request_id = %ctx.request_id,
            attempt = record.attempts_made,
            "Processing job"
        );

        let progress = RecordProgress {
            shared: Arc::clone(shared),
            id,
        };
        progress.report(PROGRESS_STARTED);

        let outcome = AssertUnwindSafe(shared.executor.execute(&ctx, &progress))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(ApiError::GenerationFailed("job execution panicked".to_string()))
            });

        shared.active.lock().remove(&id);

        if let Err(e) = shared.settle(worker_id, id, outcome, cancel.is_cancelled()) {
            error!(worker_id, job_id = %id, error = %e, "Failed to record job outcome");
        }
        if let Err(e) = shared.prune() {
            warn!(worker_id, error = %e, "Failed to prune finished jobs");
        }
    }
}
