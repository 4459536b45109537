//! US West (Northern California) one-year reserved-instance price list.
//!
//! Rates as published on <http://aws.amazon.com/ec2/pricing>, 2012-06-14.
//! Heavy utilization is charged for every hour of the year whether used or
//! not, so its hourly rate is folded into the upfront figure
//! (`upfront + hourly * 24 * 365`) and the residual hourly rate is zero.
//! Instance types not offered in the region keep infinite rates so they are
//! never worth reserving.

use std::collections::BTreeMap;

use super::{InstancePrice, PricingTable};

pub const HEAVY_UTIL: &str = "Heavy Utility";
pub const MEDIUM_UTIL: &str = "Medium Utility";
pub const LIGHT_UTIL: &str = "Light Utility";
pub const DEMAND: &str = "On Demand";

const HOURS_PER_YEAR: f64 = 24.0 * 365.0;
const UNAVAILABLE: (f64, f64) = (f64::INFINITY, f64::INFINITY);

const LIGHT_PRICES: &[(&str, (f64, f64))] = &[
    ("m1.small", (69.0, 0.049)),
    ("m1.medium", (138.0, 0.098)),
    ("m1.large", (276.0, 0.196)),
    ("m1.xlarge", (552.0, 0.392)),
    ("micro", (23.0, 0.015)),
    ("m2.xlarge", (353.0, 0.288)),
    ("m2.2xlarge", (706.0, 0.576)),
    ("m2.4xlarge", (1412.0, 1.152)),
    ("c1.medium", (178.0, 0.125)),
    ("c1.xlarge", (712.0, 0.5)),
    ("cc1.4xlarge", UNAVAILABLE),
    ("cc2.8xlarge", UNAVAILABLE),
    ("cg1.4xlarge", UNAVAILABLE),
];

const MEDIUM_PRICES: &[(&str, (f64, f64))] = &[
    ("m1.small", (160.0, 0.031)),
    ("m1.medium", (320.0, 0.063)),
    ("m1.large", (640.0, 0.124)),
    ("m1.xlarge", (1280.0, 0.248)),
    ("micro", (54.0, 0.01)),
    ("m2.xlarge", (850.0, 0.185)),
    ("m2.2xlarge", (1700.0, 0.37)),
    ("m2.4xlarge", (3400.0, 0.74)),
    ("c1.medium", (415.0, 0.08)),
    ("c1.xlarge", (1660.0, 0.32)),
    ("cc1.4xlarge", UNAVAILABLE),
    ("cc2.8xlarge", UNAVAILABLE),
    ("cg1.4xlarge", UNAVAILABLE),
];

const HEAVY_PRICES: &[(&str, (f64, f64))] = &[
    ("m1.small", (195.0 + 0.025 * HOURS_PER_YEAR, 0.0)),
    ("m1.medium", (390.0 + 0.05 * HOURS_PER_YEAR, 0.0)),
    ("m1.large", (780.0 + 0.1 * HOURS_PER_YEAR, 0.0)),
    ("m1.xlarge", (1560.0 + 0.2 * HOURS_PER_YEAR, 0.0)),
    ("micro", (62.0 + 0.008 * HOURS_PER_YEAR, 0.0)),
    ("m2.xlarge", (1030.0 + 0.148 * HOURS_PER_YEAR, 0.0)),
    ("m2.2xlarge", (2060.0 + 0.296 * HOURS_PER_YEAR, 0.0)),
    ("m2.4xlarge", (4120.0 + 0.592 * HOURS_PER_YEAR, 0.0)),
    ("c1.medium", (500.0 + 0.063 * HOURS_PER_YEAR, 0.0)),
    ("c1.xlarge", (2000.0 + 0.25 * HOURS_PER_YEAR, 0.0)),
    ("cc1.4xlarge", UNAVAILABLE),
    ("cc2.8xlarge", UNAVAILABLE),
    ("cg1.4xlarge", UNAVAILABLE),
];

const DEMAND_PRICES: &[(&str, (f64, f64))] = &[
    ("m1.small", (0.0, 0.09)),
    ("m1.medium", (0.0, 0.18)),
    ("m1.large", (0.0, 0.36)),
    ("m1.xlarge", (0.0, 0.72)),
    ("micro", (0.0, 0.025)),
    ("m2.xlarge", (0.0, 0.506)),
    ("m2.2xlarge", (0.0, 1.012)),
    ("m2.4xlarge", (0.0, 2.024)),
    ("c1.medium", (0.0, 0.186)),
    ("c1.xlarge", (0.0, 0.744)),
    ("cc1.4xlarge", (0.0, f64::INFINITY)),
    ("cc2.8xlarge", (0.0, f64::INFINITY)),
    ("cg1.4xlarge", (0.0, f64::INFINITY)),
];

fn class_prices(entries: &[(&str, (f64, f64))]) -> BTreeMap<String, InstancePrice> {
    entries
        .iter()
        .map(|(instance_type, (upfront, hourly))| {
            (
                instance_type.to_string(),
                InstancePrice {
                    upfront: *upfront,
                    hourly: *hourly,
                },
            )
        })
        .collect()
}

/// The built-in pricing table, used when no table file is supplied.
pub fn pricing() -> PricingTable {
    let mut costs = BTreeMap::new();
    costs.insert(HEAVY_UTIL.to_string(), class_prices(HEAVY_PRICES));
    costs.insert(MEDIUM_UTIL.to_string(), class_prices(MEDIUM_PRICES));
    costs.insert(LIGHT_UTIL.to_string(), class_prices(LIGHT_PRICES));
    costs.insert(DEMAND.to_string(), class_prices(DEMAND_PRICES));

    PricingTable::new(
        costs,
        vec![
            HEAVY_UTIL.to_string(),
            MEDIUM_UTIL.to_string(),
            LIGHT_UTIL.to_string(),
        ],
    )
    .expect("built-in price list is well-formed")
}
