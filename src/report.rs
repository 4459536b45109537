//! Savings statistics and simulation time series.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
    job::{history_interval, Job},
    pool::{HourLog, InstancePool, UsedPool},
    optimizer::convert_to_yearly_estimated_hours,
    pricing::PricingTable,
    simulator::{EventKind, EventSnapshot, SimulationObserver, Simulator},
};

/// Prints the savings report for an optimized pool: the pool itself, the
/// yearly hour estimates with and without reservations, and the cost delta.
pub fn savings_report(
    pricing: &PricingTable,
    jobs: &[Job],
    pool: &InstancePool,
    window: Option<Duration>,
) -> Result<()> {
    let interval = window
        .or_else(|| history_interval(jobs))
        .unwrap_or(Duration::ZERO);

    let mut optimal_hours = Simulator::new(pricing, jobs, pool).run()?;
    convert_to_yearly_estimated_hours(&mut optimal_hours, interval);

    // The pure on-demand replay is the control group the savings are
    // measured against.
    let demand_pool = pricing.empty_reserve_pool();
    let mut demand_hours = Simulator::new(pricing, jobs, &demand_pool).run()?;
    convert_to_yearly_estimated_hours(&mut demand_hours, interval);

    let (optimized_cost, upfront_cost) = pricing.calculate_cost(&optimal_hours, pool)?;
    let (demand_cost, _) = pricing.calculate_cost(&demand_hours, &demand_pool)?;

    for (class, types) in pool.iter() {
        println!("{} instance pool **********", class);
        for (instance_type, count) in types {
            println!("\t{}: {}", instance_type, count);
        }
        println!();
    }

    print_hour_log("Yearly hour estimate with reservations", &optimal_hours);
    print_hour_log("Yearly hour estimate entirely on demand", &demand_hours);

    println!("Cost with optimized pool: ${:.2}", optimized_cost);
    println!("\tupfront component: ${:.2}", upfront_cost);
    println!("Cost entirely on demand:  ${:.2}", demand_cost);
    println!("Yearly savings:           ${:.2}", demand_cost - optimized_cost);

    Ok(())
}

/// Prints an hour log grouped by utilization class.
pub fn print_hour_log(title: &str, logged_hours: &HourLog) {
    println!("{} **********", title);
    for (class, types) in logged_hours.iter() {
        println!("    {}:", class);
        for (instance_type, hours) in types {
            println!("\t{}: {:.0}", instance_type, hours);
        }
    }
    println!();
}

/// One recorded observer notification.
///
/// The simulator notifies before and after each event, so a series holds
/// two samples per event: the state the event found and the state it left.
#[derive(Debug, Serialize)]
pub struct UsageSample {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub event: EventKind,
    pub job: String,
    pub pool_used: UsedPool,
    pub logged_hours: HourLog,
}

/// Collects the full usage time series of one simulation run, for external
/// graphing tools. Rendering stays outside this crate.
#[derive(Debug, Default)]
pub struct UsageRecorder {
    samples: Vec<UsageSample>,
}

impl UsageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[UsageSample] {
        &self.samples
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.samples)?;

        Ok(())
    }
}

impl SimulationObserver for UsageRecorder {
    fn update(&mut self, snapshot: &EventSnapshot<'_>) {
        self.samples.push(UsageSample {
            time: snapshot.time,
            event: snapshot.kind,
            job: snapshot.job.id.clone(),
            pool_used: snapshot.pool_used.clone(),
            logged_hours: snapshot.logged_hours.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use crate::job::{InstanceGroup, Job};
    use crate::pricing::west_coast::{self, HEAVY_UTIL};
    use crate::simulator::{EventKind, Simulator};

    use super::UsageRecorder;

    #[test]
    fn test_recorder_captures_each_notification() {
        let pricing = west_coast::pricing();
        let mut pool = pricing.empty_reserve_pool();
        pool.set(HEAVY_UTIL, "m1.small", 10);

        let start = datetime!(2012-05-20 05:00 UTC);
        let jobs = vec![Job {
            id: "j-0".to_string(),
            start,
            end: start + Duration::minutes(90),
            instance_groups: vec![InstanceGroup {
                instance_type: "m1.small".to_string(),
                count: 10,
            }],
        }];

        let mut recorder = UsageRecorder::new();
        let mut simulator = Simulator::new(&pricing, &jobs, &pool);
        simulator.attach_observer(&mut recorder);
        simulator.run().unwrap();

        // Start, one hourly boundary, end: three events, two samples each.
        let samples = recorder.samples();
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[0].event, EventKind::Start);
        assert_eq!(samples[0].job, "j-0");

        // Before the start event nothing is allocated; after it, the whole
        // request occupies the reserved class.
        assert_eq!(samples[0].pool_used.count(HEAVY_UTIL, "m1.small"), 0);
        assert_eq!(samples[1].pool_used.count(HEAVY_UTIL, "m1.small"), 10);

        // After the final event everything is released again.
        let last = samples.last().unwrap();
        assert_eq!(last.event, EventKind::End);
        assert_eq!(last.pool_used.count(HEAVY_UTIL, "m1.small"), 0);
        assert_eq!(last.logged_hours.count(HEAVY_UTIL, "m1.small"), 20.0);
    }

    #[test]
    fn test_series_serializes_to_json() {
        let recorder = UsageRecorder::new();
        let mut buffer = Vec::new();

        recorder.write_json(&mut buffer).unwrap();

        assert_eq!(String::from_utf8(buffer).unwrap(), "[]");
    }
}
