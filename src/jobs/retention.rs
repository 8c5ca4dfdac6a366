//! How long finished jobs stay queryable.

use super::model::{JobId, JobRecord, JobState};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default = "default_completed_max_age_secs")]
    pub completed_max_age_secs: u64,
    /// Most recent completed jobs kept regardless of age limit
    #[serde(default = "default_completed_max_count")]
    pub completed_max_count: usize,
    #[serde(default = "default_failed_max_age_secs")]
    pub failed_max_age_secs: u64,
}

fn default_completed_max_age_secs() -> u64 {
    3600
}

fn default_completed_max_count() -> usize {
    100
}

fn default_failed_max_age_secs() -> u64 {
    86_400
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_age_secs: default_completed_max_age_secs(),
            completed_max_count: default_completed_max_count(),
            failed_max_age_secs: default_failed_max_age_secs(),
        }
    }
}

fn finished_at(record: &JobRecord) -> DateTime<Utc> {
    record.finished_at.unwrap_or(record.created_at)
}

fn older_than(record: &JobRecord, now: DateTime<Utc>, max_age_secs: u64) -> bool {
    let max_age = ChronoDuration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX));
    now.signed_duration_since(finished_at(record)) > max_age
}

impl RetentionPolicy {
    /// Jobs due for removal at `now`. Completed jobs go once they are older
    /// than the age limit or fall outside the newest `completed_max_count`;
    /// failed jobs go once older than their age limit. Waiting and active
    /// jobs are never selected.
    pub fn expired(&self, records: &[JobRecord], now: DateTime<Utc>) -> Vec<JobId> {
        let mut completed: Vec<&JobRecord> = records
            .iter()
            .filter(|r| r.state == JobState::Completed)
            .collect();
        completed.sort_by_key(|r| std::cmp::Reverse(finished_at(r)));

        let mut expired: Vec<JobId> = completed
            .iter()
            .enumerate()
            .filter(|(rank, record)| {
                *rank >= self.completed_max_count
                    || older_than(record, now, self.completed_max_age_secs)
            })
            .map(|(_, record)| record.id)
            .collect();

        expired.extend(
            records
                .iter()
                .filter(|r| r.state == JobState::Failed)
                .filter(|r| older_than(r, now, self.failed_max_age_secs))
                .map(|r| r.id),
        );
        expired
    }
}
