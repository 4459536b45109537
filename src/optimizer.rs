//! Reserved-capacity purchase optimizer.
//!
//! The optimizer searches the integer space of per-class instance counts for
//! the pool with the lowest projected yearly cost. The search is a greedy
//! hill-climb, run independently for every instance type appearing in the
//! history: each round tentatively adds one unit to each reserve class in
//! turn, replays the full history through the simulator, normalizes the
//! resulting hour log to a yearly estimate, and keeps the cheapest candidate
//! as long as it does not cost more than the best known pool. Costs never
//! cross-subsidize between instance types, so the per-type searches do not
//! interact.

use std::collections::BTreeSet;

use anyhow::Result;
use time::Duration;

use crate::{
    job::{history_interval, Job},
    pool::{HourLog, InstancePool},
    pricing::PricingTable,
    simulator::Simulator,
};

/// Hill-climb round limit per instance type. The climb normally stops on the
/// first non-improving round; the cap bounds it when a degenerate pricing
/// table (zero upfront rates) lets ties repeat forever.
pub const DEFAULT_ITERATION_CAP: u32 = 10_000;

/// Searches for the cheapest mix of reserved purchases for a job history.
pub struct Optimizer<'a> {
    pricing: &'a PricingTable,
    jobs: &'a [Job],
    interval: Duration,
    iteration_cap: u32,
}

impl<'a> Optimizer<'a> {
    /// Creates an optimizer over `jobs`. The observation interval defaults
    /// to the span from the earliest start to the latest end; pass `window`
    /// to normalize against a different period.
    pub fn new(pricing: &'a PricingTable, jobs: &'a [Job], window: Option<Duration>) -> Self {
        let interval = window
            .or_else(|| history_interval(jobs))
            .unwrap_or(Duration::ZERO);

        Self {
            pricing,
            jobs,
            interval,
            iteration_cap: DEFAULT_ITERATION_CAP,
        }
    }

    pub fn with_iteration_cap(mut self, iteration_cap: u32) -> Self {
        self.iteration_cap = iteration_cap;
        self
    }

    /// Runs the search and returns the cost-minimizing pool.
    ///
    /// When `pre_existing` holds instances already owned, the search starts
    /// from those counts and only ever recommends additional purchases.
    pub fn run(&self, pre_existing: Option<InstancePool>) -> Result<InstancePool> {
        let mut pool = pre_existing.unwrap_or_else(|| self.pricing.empty_reserve_pool());
        for class in self.pricing.reserve_priorities() {
            pool.ensure_class(class);
        }

        let instance_types: BTreeSet<&str> = self
            .jobs
            .iter()
            .flat_map(|job| job.instance_groups.iter())
            .map(|group| group.instance_type.as_str())
            .collect();

        // Zero the full class x type grid up front so every simulation sees
        // the same pool shape regardless of which counts are still zero.
        pool.zero_fill_types(instance_types.iter().copied());

        for instance_type in instance_types {
            self.optimize_instance_type(instance_type, &mut pool)?;
        }

        Ok(pool)
    }

    /// Hill-climbs the per-class counts for a single instance type, leaving
    /// the rest of the pool untouched.
    fn optimize_instance_type(&self, instance_type: &str, pool: &mut InstancePool) -> Result<()> {
        let mut best_counts = self.pricing.reserve_counts(pool, instance_type);
        let mut best_cost = self.evaluate(pool)?;

        for _round in 0..self.iteration_cap {
            let mut round_best: Option<(&str, f64)> = None;

            for class in self.pricing.reserve_priorities() {
                for (other, count) in &best_counts {
                    pool.set(other, instance_type, *count);
                }
                pool.set(class, instance_type, best_counts[class.as_str()] + 1);

                let cost = self.evaluate(pool)?;

                // Strict comparison keeps the earliest class in priority
                // order when several candidates cost the same.
                let improves = match round_best {
                    None => true,
                    Some((_, best)) => cost < best,
                };
                if improves {
                    round_best = Some((class.as_str(), cost));
                }
            }

            let Some((class, cost)) = round_best else {
                break;
            };

            // A tie with the best known cost is still accepted; the climb
            // only stops once every candidate is strictly worse.
            if cost.is_finite() && cost <= best_cost {
                best_cost = cost;
                *best_counts
                    .get_mut(class)
                    .expect("candidate class is a reserve class") += 1;
            } else {
                break;
            }
        }

        // Write the winning counts back, undoing the last exploration.
        for (class, count) in &best_counts {
            pool.set(class, instance_type, *count);
        }

        Ok(())
    }

    /// Projected yearly cost of the history under `pool`.
    fn evaluate(&self, pool: &InstancePool) -> Result<f64> {
        let mut logged_hours = Simulator::new(self.pricing, self.jobs, pool).run()?;
        convert_to_yearly_estimated_hours(&mut logged_hours, self.interval);

        let (total, _upfront) = self.pricing.calculate_cost(&logged_hours, pool)?;

        Ok(total)
    }
}

/// Scales an observed hour log to a full-year estimate.
///
/// Every entry is multiplied by `365 / observed days` and rounded up to the
/// next whole hour, since billing charges whole hours. An interval shorter
/// than a full day keeps the factor at 365, treating the log as one day's
/// worth of usage rather than dividing by a sliver of a day.
pub fn convert_to_yearly_estimated_hours(logged_hours: &mut HourLog, interval: Duration) {
    const DAYS_PER_YEAR: f64 = 365.0;
    const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

    let conversion_rate = if interval.whole_days() == 0 {
        DAYS_PER_YEAR
    } else {
        DAYS_PER_YEAR / (interval.whole_seconds() as f64 / SECONDS_PER_DAY)
    };

    logged_hours.map_values(|hours| (hours * conversion_rate).ceil());
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    use crate::job::{InstanceGroup, Job};
    use crate::pool::HourLog;
    use crate::pricing::west_coast::{self, DEMAND, HEAVY_UTIL, LIGHT_UTIL, MEDIUM_UTIL};
    use crate::simulator::Simulator;

    use super::{convert_to_yearly_estimated_hours, Optimizer};

    const BASETIME: OffsetDateTime = datetime!(2012-05-20 05:00 UTC);
    const INSTANCE_NAME: &str = "m1.small";
    const BASE_INSTANCES: u32 = 10;
    const JOB_AMOUNT: usize = 5;

    // Per-day utilization profiles: how long the parallel jobs run.
    const HEAVY_INTERVAL: Duration = Duration::seconds(80_000);
    const MEDIUM_INTERVAL: Duration = Duration::seconds(50_000);
    const LIGHT_INTERVAL: Duration = Duration::seconds(30_000);
    const DEMAND_INTERVAL: Duration = Duration::seconds(2_000);
    const DAY: Duration = Duration::days(1);

    fn test_job(id: &str, start: OffsetDateTime, end: OffsetDateTime) -> Job {
        Job {
            id: id.to_string(),
            start,
            end,
            instance_groups: vec![InstanceGroup {
                instance_type: INSTANCE_NAME.to_string(),
                count: BASE_INSTANCES,
            }],
        }
    }

    fn parallel_jobs(amount: usize, runtime: Duration, id_offset: usize) -> Vec<Job> {
        (0..amount)
            .map(|i| {
                test_job(
                    &format!("j-{}", i + id_offset),
                    BASETIME,
                    BASETIME + runtime,
                )
            })
            .collect()
    }

    #[test]
    fn test_heavy_utilization_fills_heavy_class() {
        // Jobs covering 80% of the day cross the heavy threshold; the whole
        // parallel fleet should be reserved there.
        let pricing = west_coast::pricing();
        let jobs = parallel_jobs(JOB_AMOUNT, HEAVY_INTERVAL, 0);

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 50);
        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 0);
        assert_eq!(pool.count(LIGHT_UTIL, INSTANCE_NAME), 0);
    }

    #[test]
    fn test_medium_utilization_fills_medium_class() {
        let pricing = west_coast::pricing();
        let jobs = parallel_jobs(JOB_AMOUNT, MEDIUM_INTERVAL, 0);

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 50);
        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 0);
        assert_eq!(pool.count(LIGHT_UTIL, INSTANCE_NAME), 0);
    }

    #[test]
    fn test_light_utilization_fills_light_class() {
        let pricing = west_coast::pricing();
        let jobs = parallel_jobs(JOB_AMOUNT, LIGHT_INTERVAL, 0);

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        assert_eq!(pool.count(LIGHT_UTIL, INSTANCE_NAME), 50);
        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 0);
        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 0);
    }

    #[test]
    fn test_usage_spikes_stay_on_demand() {
        // A short parallel burst does not utilize any reservation enough to
        // beat plain on-demand billing.
        let pricing = west_coast::pricing();
        let jobs = parallel_jobs(JOB_AMOUNT, DEMAND_INTERVAL, 0);

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        for class in pricing.reserve_priorities() {
            assert_eq!(pool.count(class, INSTANCE_NAME), 0, "class {}", class);
        }
    }

    #[test]
    fn test_sequential_jobs_share_light_reservation() {
        // Five back-to-back jobs add up to ~30% of the day on the same ten
        // instances, which qualifies the shared slots for light utility.
        let pricing = west_coast::pricing();
        let interval = Duration::seconds(4_000);

        let mut jobs = Vec::new();
        let mut start = BASETIME;
        for i in 0..JOB_AMOUNT {
            let end = start + interval;
            jobs.push(test_job(&format!("j-{}", i), start, end));
            start = end;
        }

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        assert_eq!(pool.count(LIGHT_UTIL, INSTANCE_NAME), BASE_INSTANCES);
        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 0);
        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 0);
    }

    #[test]
    fn test_mixed_profiles_fill_both_classes() {
        let pricing = west_coast::pricing();
        let mut jobs = parallel_jobs(JOB_AMOUNT, HEAVY_INTERVAL, 0);
        jobs.extend(parallel_jobs(JOB_AMOUNT, MEDIUM_INTERVAL, JOB_AMOUNT));

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 50);
        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 50);
    }

    #[test]
    fn test_stacked_profiles_fill_all_classes() {
        let pricing = west_coast::pricing();
        let mut jobs = parallel_jobs(JOB_AMOUNT, HEAVY_INTERVAL, 0);
        jobs.extend(parallel_jobs(JOB_AMOUNT, MEDIUM_INTERVAL, JOB_AMOUNT));
        jobs.extend(parallel_jobs(JOB_AMOUNT, LIGHT_INTERVAL, JOB_AMOUNT * 2));

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(None)
            .unwrap();

        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 50);
        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 50);
        assert_eq!(pool.count(LIGHT_UTIL, INSTANCE_NAME), 50);
    }

    #[test]
    fn test_optimized_pool_never_beats_by_losing() {
        // The optimized pool can only be at most as expensive as running
        // everything on demand.
        let pricing = west_coast::pricing();
        let jobs = parallel_jobs(JOB_AMOUNT, HEAVY_INTERVAL, 0);

        let optimizer = Optimizer::new(&pricing, &jobs, Some(DAY));
        let pool = optimizer.run(None).unwrap();

        let mut optimized_hours = Simulator::new(&pricing, &jobs, &pool).run().unwrap();
        convert_to_yearly_estimated_hours(&mut optimized_hours, DAY);
        let (optimized_cost, _) = pricing.calculate_cost(&optimized_hours, &pool).unwrap();

        let demand_pool = pricing.empty_reserve_pool();
        let mut demand_hours = Simulator::new(&pricing, &jobs, &demand_pool).run().unwrap();
        convert_to_yearly_estimated_hours(&mut demand_hours, DAY);
        let (demand_cost, _) = pricing.calculate_cost(&demand_hours, &demand_pool).unwrap();

        assert!(optimized_cost <= demand_cost);
    }

    #[test]
    fn test_optimizer_is_deterministic() {
        let pricing = west_coast::pricing();
        let mut jobs = parallel_jobs(JOB_AMOUNT, HEAVY_INTERVAL, 0);
        jobs.extend(parallel_jobs(JOB_AMOUNT, MEDIUM_INTERVAL, JOB_AMOUNT));

        let optimizer = Optimizer::new(&pricing, &jobs, Some(DAY));
        let first = optimizer.run(None).unwrap();
        let second = optimizer.run(None).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_pre_existing_counts_are_never_reduced() {
        // Spiky usage would favor an empty pool, but owned instances are
        // sunk cost: the search starts from them and only ever adds.
        let pricing = west_coast::pricing();
        let jobs = parallel_jobs(JOB_AMOUNT, DEMAND_INTERVAL, 0);

        let mut owned = pricing.empty_reserve_pool();
        owned.set(HEAVY_UTIL, INSTANCE_NAME, 3);

        let pool = Optimizer::new(&pricing, &jobs, Some(DAY))
            .run(Some(owned))
            .unwrap();

        assert_eq!(pool.count(HEAVY_UTIL, INSTANCE_NAME), 3);
        assert_eq!(pool.count(MEDIUM_UTIL, INSTANCE_NAME), 0);
        assert_eq!(pool.count(LIGHT_UTIL, INSTANCE_NAME), 0);
    }

    #[test]
    fn test_yearly_conversion_identity_over_a_year() {
        let mut log = HourLog::new();
        log.add(DEMAND, INSTANCE_NAME, 120.0);

        convert_to_yearly_estimated_hours(&mut log, Duration::days(365));

        assert_eq!(log.count(DEMAND, INSTANCE_NAME), 120.0);
    }

    #[test]
    fn test_yearly_conversion_scales_and_ceils() {
        let mut log = HourLog::new();
        log.add(DEMAND, INSTANCE_NAME, 100.0);

        convert_to_yearly_estimated_hours(&mut log, Duration::days(60));

        assert_eq!(log.count(DEMAND, INSTANCE_NAME), (100.0f64 * 365.0 / 60.0).ceil());
    }

    #[test]
    fn test_yearly_conversion_fractional_days() {
        let mut log = HourLog::new();
        log.add(DEMAND, INSTANCE_NAME, 100.0);

        // A day and a half observed: 365 / 1.5.
        convert_to_yearly_estimated_hours(&mut log, Duration::hours(36));

        assert_eq!(log.count(DEMAND, INSTANCE_NAME), (100.0f64 * 365.0 / 1.5).ceil());
    }

    #[test]
    fn test_yearly_conversion_sub_day_interval_uses_default_rate() {
        let mut log = HourLog::new();
        log.add(DEMAND, INSTANCE_NAME, 2.0);

        convert_to_yearly_estimated_hours(&mut log, Duration::seconds(80_000));

        assert_eq!(log.count(DEMAND, INSTANCE_NAME), 730.0);
    }

    #[test]
    fn test_empty_history_yields_empty_pool() {
        let pricing = west_coast::pricing();
        let jobs: Vec<Job> = Vec::new();

        let pool = Optimizer::new(&pricing, &jobs, None).run(None).unwrap();

        assert_eq!(pool, pricing.empty_reserve_pool());
    }
}
