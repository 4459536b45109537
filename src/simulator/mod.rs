//! Event-driven billing simulator.
//!
//! The simulator replays a job history, sorted by start time, against a
//! reserved-capacity pool and reports how many instance-hours each
//! utilization class billed. Billing follows the reserved-instance
//! precedence: every allocation fills the highest-priority class with free
//! capacity first and falls through to on-demand, and the assignment of a
//! running job is re-evaluated at every whole-hour boundary so capacity
//! freed by an ending job is captured at the next billing hour.

use std::collections::HashMap;

use anyhow::{bail, Result};
use time::OffsetDateTime;

use crate::{
    job::Job,
    pool::{HourLog, InstancePool, UsedPool, UtilizationMap},
    pricing::PricingTable,
};

mod event;

pub use event::EventKind;

use event::build_timeline;

/// The simulator state handed to observers around each event.
///
/// Observers receive the snapshot once before and once after the event is
/// applied. All references are shared; observers read, never mutate.
pub struct EventSnapshot<'a> {
    pub time: OffsetDateTime,
    pub kind: EventKind,
    pub job: &'a Job,
    pub logged_hours: &'a HourLog,
    pub pool_used: &'a UsedPool,
}

/// Receives simulator state around every processed event.
pub trait SimulationObserver {
    fn update(&mut self, snapshot: &EventSnapshot<'_>);
}

/// How each running job's instance requests were split across utilization
/// classes at allocation time, so the split can be reversed exactly when the
/// job ends or is rearranged.
type RunningJobs<'a> = HashMap<&'a str, UtilizationMap<u32>>;

/// Replays a job history against a capacity pool.
///
/// `jobs` must be sorted ascending by start time. The pool may carry no
/// purchased units (the pure on-demand baseline) but must define its class
/// rows; a pool with no classes at all is a caller bug and is rejected.
pub struct Simulator<'a> {
    pricing: &'a PricingTable,
    jobs: &'a [Job],
    pool: &'a InstancePool,
    observers: Vec<&'a mut dyn SimulationObserver>,
}

impl<'a> Simulator<'a> {
    pub fn new(pricing: &'a PricingTable, jobs: &'a [Job], pool: &'a InstancePool) -> Self {
        Self {
            pricing,
            jobs,
            pool,
            observers: Vec::new(),
        }
    }

    /// Attaches an observer. Observers must be attached before `run`; the
    /// observer list is fixed for the whole replay.
    pub fn attach_observer(&mut self, observer: &'a mut dyn SimulationObserver) {
        self.observers.push(observer);
    }

    /// Replays the full history and returns the billed instance-hours per
    /// utilization class and instance type.
    pub fn run(&mut self) -> Result<HourLog> {
        if !self.pool.has_classes() {
            bail!("capacity pool defines no utilization classes; build it from the pricing table");
        }

        let mut timeline = build_timeline(self.jobs);
        let mut logged_hours = self.pricing.empty_hour_log();
        let mut pool_used = self.pricing.empty_used_pool();
        let mut running: RunningJobs<'a> = HashMap::new();

        while let Some(event) = timeline.pop_min() {
            let (time, kind, job) = (event.time, event.kind, event.job);

            self.notify(time, kind, job, &logged_hours, &pool_used);

            match kind {
                EventKind::Start => self.allocate_job(&mut running, &mut pool_used, job),
                EventKind::HourlyLog => {
                    Self::log_hours(&mut logged_hours, &running, &job.id);

                    // Billing switches to reserved capacity whenever some
                    // opens up, so the assignment must be redone each hour.
                    self.rearrange_instances(&mut running, &mut pool_used, job);
                }
                EventKind::End => {
                    Self::log_hours(&mut logged_hours, &running, &job.id);
                    Self::remove_job(&mut running, &mut pool_used, &job.id);
                }
            }

            self.notify(time, kind, job, &logged_hours, &pool_used);
        }

        Ok(logged_hours)
    }

    fn notify(
        &mut self,
        time: OffsetDateTime,
        kind: EventKind,
        job: &Job,
        logged_hours: &HourLog,
        pool_used: &UsedPool,
    ) {
        if self.observers.is_empty() {
            return;
        }

        let snapshot = EventSnapshot {
            time,
            kind,
            job,
            logged_hours,
            pool_used,
        };

        for observer in self.observers.iter_mut() {
            observer.update(&snapshot);
        }
    }

    /// Allocates a job's instance requests, walking the utilization classes
    /// in priority order and taking whatever free capacity each one has.
    /// On-demand comes last and always absorbs the remainder.
    fn allocate_job(
        &self,
        running: &mut RunningJobs<'a>,
        pool_used: &mut UsedPool,
        job: &'a Job,
    ) {
        let ledger = running.entry(job.id.as_str()).or_default();
        ledger.clear();

        for group in &job.instance_groups {
            let mut needed = group.count;

            for class in self.pricing.all_priorities() {
                if needed == 0 {
                    break;
                }

                let used = pool_used.count(class, &group.instance_type);
                let space = self.space_left(used, class, &group.instance_type);
                if space == 0 {
                    continue;
                }

                let taken = needed.min(space);
                pool_used.add(class, &group.instance_type, taken);
                ledger.add(class, &group.instance_type, taken);
                needed -= taken;
            }
        }
    }

    /// Free capacity of one class for one instance type. Reserve classes are
    /// bounded by the purchased pool; everything else is unbounded.
    fn space_left(&self, used: u32, class: &str, instance_type: &str) -> u32 {
        if self.pricing.is_reserve_class(class) {
            self.pool.count(class, instance_type).saturating_sub(used)
        } else {
            u32::MAX
        }
    }

    /// Adds one hour's worth of the job's current allocation to the log.
    fn log_hours(logged_hours: &mut HourLog, running: &RunningJobs<'_>, job_id: &str) {
        let ledger = running
            .get(job_id)
            .expect("hour logged for a job that is not running");

        for (class, instance_type, count) in ledger.entries() {
            logged_hours.add(class, instance_type, f64::from(*count));
        }
    }

    /// Returns the job's entire allocation to the used pool.
    fn release_job(running: &RunningJobs<'_>, pool_used: &mut UsedPool, job_id: &str) {
        let ledger = running
            .get(job_id)
            .expect("released a job that is not running");

        for (class, instance_type, count) in ledger.entries() {
            pool_used.release(class, instance_type, *count);
        }
    }

    /// Re-runs the allocation of a running job so it can pick up reserved
    /// capacity freed since its last billing boundary.
    fn rearrange_instances(
        &self,
        running: &mut RunningJobs<'a>,
        pool_used: &mut UsedPool,
        job: &'a Job,
    ) {
        Self::release_job(running, pool_used, &job.id);
        self.allocate_job(running, pool_used, job);
    }

    fn remove_job(running: &mut RunningJobs<'_>, pool_used: &mut UsedPool, job_id: &str) {
        Self::release_job(running, pool_used, job_id);
        running.remove(job_id);
    }
}
