//! Simulation events and the job event timeline.

use min_max_heap::MinMaxHeap;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::job::Job;

/// The kind of a billing event.
///
/// Declaration order is the processing order for events carrying the same
/// timestamp: an ending job must release its capacity before hourly-boundary
/// reshuffles run, and a starting job claims fresh capacity only after both.
/// The derived `Ord` encodes that rank, so do not reorder the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A job ends and releases its allocation.
    End,
    /// A running job crosses a whole-hour billing boundary.
    HourlyLog,
    /// A job starts and claims capacity.
    Start,
}

/// One entry of the simulation timeline.
///
/// Events are ordered by `(time, kind)` only; two events of the same kind at
/// the same instant compare equal and pop in unspecified relative order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JobEvent<'a> {
    pub time: OffsetDateTime,
    pub kind: EventKind,
    pub job: &'a Job,
}

impl PartialEq for JobEvent<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.kind == other.kind
    }
}

impl Eq for JobEvent<'_> {}

impl Ord for JobEvent<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.time, self.kind).cmp(&(other.time, other.kind))
    }
}

impl PartialOrd for JobEvent<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Builds the event timeline for a job history.
///
/// Each job contributes a start event, an end event, and one hourly-log
/// event per whole-hour boundary strictly between the two. The hourly
/// events exist because a reserved instance freed by one job mid-flight can
/// only be captured by another at its next billing boundary; start and end
/// events alone cannot express that.
pub(crate) fn build_timeline(jobs: &[Job]) -> MinMaxHeap<JobEvent<'_>> {
    let mut timeline = MinMaxHeap::new();

    for job in jobs {
        let mut boundary = job.start + Duration::HOUR;
        while boundary < job.end {
            timeline.push(JobEvent {
                time: boundary,
                kind: EventKind::HourlyLog,
                job,
            });
            boundary += Duration::HOUR;
        }

        timeline.push(JobEvent {
            time: job.start,
            kind: EventKind::Start,
            job,
        });
        timeline.push(JobEvent {
            time: job.end,
            kind: EventKind::End,
            job,
        });
    }

    timeline
}
