//! Job record filtering.

use anyhow::{anyhow, Result};
use time::{macros::format_description, Date, OffsetDateTime};

use crate::job::{Job, JobRecord};

/// Turns raw records into a simulatable history.
///
/// Records missing either timestamp (or with an empty time range) cannot be
/// replayed and are dropped. Optional day bounds then cut the history: a job
/// starting before the minimum day or ending after the maximum day is
/// discarded. The surviving jobs are sorted ascending by start time, which
/// the simulator requires.
pub struct JobFilter {
    min_day: Option<OffsetDateTime>,
    max_day: Option<OffsetDateTime>,
}

impl JobFilter {
    pub fn new(min_day: Option<OffsetDateTime>, max_day: Option<OffsetDateTime>) -> Self {
        Self { min_day, max_day }
    }

    /// Filters and sorts `records`. Returns the jobs and the number of
    /// records dropped along the way.
    pub fn filter(&self, records: Vec<JobRecord>) -> (Vec<Job>, usize) {
        let total = records.len();

        let mut jobs: Vec<Job> = records
            .into_iter()
            .filter_map(JobRecord::into_job)
            .filter(|job| self.within_range(job))
            .collect();

        jobs.sort_by_key(|job| job.start);

        let dropped = total - jobs.len();
        (jobs, dropped)
    }

    fn within_range(&self, job: &Job) -> bool {
        if let Some(min_day) = self.min_day {
            if job.start < min_day {
                return false;
            }
        }

        if let Some(max_day) = self.max_day {
            if job.end > max_day {
                return false;
            }
        }

        true
    }
}

/// Parses a `YYYY/MM/DD` day bound into the UTC midnight starting that day.
pub fn parse_day(input: &str) -> Result<OffsetDateTime> {
    let format = format_description!("[year]/[month]/[day]");
    let date = Date::parse(input, &format)
        .map_err(|e| anyhow!("invalid day '{}' (expected YYYY/MM/DD): {}", input, e))?;

    Ok(date.midnight().assume_utc())
}
