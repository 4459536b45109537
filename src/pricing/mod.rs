//! Pricing tables and cost evaluation.
//!
//! A pricing table maps utilization class → instance type → upfront/hourly
//! rates, and carries the reserve priority order: the first class in the
//! list is filled first during allocation, because it has the cheapest
//! marginal hour. Classes present in the cost map but absent from the
//! priority list are on-demand classes with unbounded capacity.
//!
//! The table is passed explicitly to the simulator, the optimizer and cost
//! evaluation. Nothing in the crate holds a process-wide pricing singleton,
//! so tests and callers can run against distinct tables side by side.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::pool::{HourLog, InstancePool, UsedPool};

pub mod west_coast;

/// Rates for one instance type under one utilization class.
///
/// `upfront` is the cost of buying the unit for a year; `hourly` is charged
/// per billed instance-hour. Instance types not offered under a class carry
/// infinite rates, which prices them out of any optimized pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstancePrice {
    pub upfront: f64,
    pub hourly: f64,
}

#[derive(Debug, Deserialize)]
struct PricingConfig {
    costs: BTreeMap<String, BTreeMap<String, InstancePrice>>,
    reserve_priorities: Vec<String>,
}

/// Rates and priority order for every utilization class.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PricingConfig")]
pub struct PricingTable {
    costs: BTreeMap<String, BTreeMap<String, InstancePrice>>,
    reserve_priorities: Vec<String>,
    all_priorities: Vec<String>,
}

impl TryFrom<PricingConfig> for PricingTable {
    type Error = anyhow::Error;

    fn try_from(config: PricingConfig) -> Result<Self> {
        PricingTable::new(config.costs, config.reserve_priorities)
    }
}

impl PricingTable {
    /// Builds a table from a cost map and the reserve priority order.
    ///
    /// Every priority entry must have prices, and at least one class must
    /// remain outside the priority list to absorb unreserved demand.
    pub fn new(
        costs: BTreeMap<String, BTreeMap<String, InstancePrice>>,
        reserve_priorities: Vec<String>,
    ) -> Result<Self> {
        if reserve_priorities.is_empty() {
            bail!("pricing table defines no reserve utilization classes");
        }

        for class in &reserve_priorities {
            if !costs.contains_key(class) {
                bail!("reserve utilization class {} has no prices", class);
            }
        }

        let mut all_priorities = reserve_priorities.clone();
        for class in costs.keys() {
            if !all_priorities.contains(class) {
                all_priorities.push(class.clone());
            }
        }

        if all_priorities.len() == reserve_priorities.len() {
            bail!("pricing table defines no on-demand utilization class");
        }

        Ok(Self {
            costs,
            reserve_priorities,
            all_priorities,
        })
    }

    /// Loads a table from a JSON file with `costs` and `reserve_priorities`
    /// fields.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let table = serde_json::from_reader(BufReader::new(file))?;

        Ok(table)
    }

    /// Reserve classes, most favorable first.
    pub fn reserve_priorities(&self) -> &[String] {
        &self.reserve_priorities
    }

    /// Every utilization class in allocation order: reserve classes by
    /// priority, then the on-demand classes.
    pub fn all_priorities(&self) -> &[String] {
        &self.all_priorities
    }

    pub fn is_reserve_class(&self, class: &str) -> bool {
        self.reserve_priorities.iter().any(|c| c == class)
    }

    /// Looks up the price of one class/type entry. A class or type missing
    /// from the table is a configuration mismatch, not a zero price.
    pub fn price(&self, class: &str, instance_type: &str) -> Result<InstancePrice> {
        self.costs
            .get(class)
            .and_then(|types| types.get(instance_type))
            .copied()
            .ok_or_else(|| anyhow!("no price configured for {}/{}", class, instance_type))
    }

    /// Totals the upfront cost of `pool` and the hourly cost of
    /// `logged_hours`. Returns `(total, upfront_component)`.
    pub fn calculate_cost(
        &self,
        logged_hours: &HourLog,
        pool: &InstancePool,
    ) -> Result<(f64, f64)> {
        let mut upfront = 0.0;
        for (class, instance_type, count) in pool.entries() {
            upfront += self.price(class, instance_type)?.upfront * f64::from(*count);
        }

        let mut total = upfront;
        for (class, instance_type, hours) in logged_hours.entries() {
            total += self.price(class, instance_type)?.hourly * hours;
        }

        Ok((total, upfront))
    }

    /// An empty pool with one row per reserve class. This is the valid
    /// "nothing purchased" baseline; a pool with no class rows at all is
    /// rejected by the simulator.
    pub fn empty_reserve_pool(&self) -> InstancePool {
        let mut pool = InstancePool::new();
        for class in &self.reserve_priorities {
            pool.ensure_class(class);
        }

        pool
    }

    /// An empty hour log with one row per utilization class, on-demand
    /// included.
    pub fn empty_hour_log(&self) -> HourLog {
        let mut log = HourLog::new();
        for class in &self.all_priorities {
            log.ensure_class(class);
        }

        log
    }

    /// An empty occupancy map, same shape as [`Self::empty_hour_log`].
    pub fn empty_used_pool(&self) -> UsedPool {
        let mut used = UsedPool::new();
        for class in &self.all_priorities {
            used.ensure_class(class);
        }

        used
    }

    /// Snapshot of `pool`'s counts for one instance type, per reserve class.
    pub fn reserve_counts(&self, pool: &InstancePool, instance_type: &str) -> BTreeMap<String, u32> {
        self.reserve_priorities
            .iter()
            .map(|class| (class.clone(), pool.count(class, instance_type)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{west_coast, InstancePrice, PricingTable};

    fn tiny_table() -> PricingTable {
        let mut costs = BTreeMap::new();
        costs.insert(
            "Reserved".to_string(),
            BTreeMap::from([(
                "m1.small".to_string(),
                InstancePrice {
                    upfront: 100.0,
                    hourly: 0.05,
                },
            )]),
        );
        costs.insert(
            "On Demand".to_string(),
            BTreeMap::from([(
                "m1.small".to_string(),
                InstancePrice {
                    upfront: 0.0,
                    hourly: 0.10,
                },
            )]),
        );

        PricingTable::new(costs, vec!["Reserved".to_string()]).unwrap()
    }

    #[test]
    fn test_all_priorities_puts_demand_last() {
        let table = tiny_table();

        assert_eq!(table.all_priorities(), ["Reserved", "On Demand"]);
        assert!(table.is_reserve_class("Reserved"));
        assert!(!table.is_reserve_class("On Demand"));
    }

    #[test]
    fn test_rejects_priority_without_prices() {
        let costs = BTreeMap::from([(
            "On Demand".to_string(),
            BTreeMap::<String, InstancePrice>::new(),
        )]);

        assert!(PricingTable::new(costs, vec!["Reserved".to_string()]).is_err());
    }

    #[test]
    fn test_rejects_table_without_demand_class() {
        let costs = BTreeMap::from([(
            "Reserved".to_string(),
            BTreeMap::<String, InstancePrice>::new(),
        )]);

        assert!(PricingTable::new(costs, vec!["Reserved".to_string()]).is_err());
    }

    #[test]
    fn test_calculate_cost() {
        let table = tiny_table();

        let mut pool = table.empty_reserve_pool();
        pool.set("Reserved", "m1.small", 2);

        let mut log = table.empty_hour_log();
        log.add("Reserved", "m1.small", 100.0);
        log.add("On Demand", "m1.small", 40.0);

        let (total, upfront) = table.calculate_cost(&log, &pool).unwrap();

        assert_eq!(upfront, 200.0);
        assert_eq!(total, 200.0 + 100.0 * 0.05 + 40.0 * 0.10);
    }

    #[test]
    fn test_cost_fails_on_unpriced_entry() {
        let table = tiny_table();

        let mut pool = table.empty_reserve_pool();
        pool.set("Reserved", "c1.xlarge", 1);

        let log = table.empty_hour_log();

        assert!(table.calculate_cost(&log, &pool).is_err());
    }

    #[test]
    fn test_west_coast_table() {
        let table = west_coast::pricing();

        assert_eq!(
            table.reserve_priorities(),
            [
                west_coast::HEAVY_UTIL,
                west_coast::MEDIUM_UTIL,
                west_coast::LIGHT_UTIL
            ]
        );

        // Heavy utilization is billed entirely upfront.
        let heavy = table.price(west_coast::HEAVY_UTIL, "m1.small").unwrap();
        assert_eq!(heavy.hourly, 0.0);
        assert_eq!(heavy.upfront, 195.0 + 0.025 * 24.0 * 365.0);

        let demand = table.price(west_coast::DEMAND, "m1.small").unwrap();
        assert_eq!(demand.upfront, 0.0);
        assert_eq!(demand.hourly, 0.09);

        // Types not offered in the region are priced out, not absent.
        let unavailable = table.price(west_coast::LIGHT_UTIL, "cc1.4xlarge").unwrap();
        assert!(unavailable.upfront.is_infinite());
    }
}
