//! Job flow records.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// A request for a number of instances of a single type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub instance_type: String,
    pub count: u32,
}

/// One historical workload execution.
///
/// A job is immutable once constructed: the simulator and the optimizer only
/// ever read it. Its timestamps are timezone-aware instants, and `end` is
/// strictly after `start` (records violating this are dropped by the history
/// filter before they reach the core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub instance_groups: Vec<InstanceGroup>,
}

impl Job {
    /// Returns the job's wall-clock duration.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A job record as it appears on disk.
///
/// Recorded histories can contain entries for which the cluster never
/// reported a start or an end time. Both timestamps are therefore optional
/// here; `into_job` decides whether the record is simulatable.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    pub id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,
}

impl JobRecord {
    /// Converts the record into a simulatable job.
    ///
    /// Returns `None` when either timestamp is missing or the time range is
    /// empty or inverted.
    pub fn into_job(self) -> Option<Job> {
        let start = self.start?;
        let end = self.end?;

        if end <= start {
            return None;
        }

        Some(Job {
            id: self.id,
            start,
            end,
            instance_groups: self.instance_groups,
        })
    }
}

/// Returns the span from the earliest start to the latest end of `jobs`,
/// or `None` for an empty history.
pub fn history_interval(jobs: &[Job]) -> Option<Duration> {
    let begin = jobs.iter().map(|job| job.start).min()?;
    let end = jobs.iter().map(|job| job.end).max()?;

    Some(end - begin)
}
