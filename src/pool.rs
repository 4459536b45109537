//! Instance pools and hour logs.
//!
//! The simulator and the optimizer share one map shape: utilization class →
//! instance type → some count. `UtilizationMap` is that shape with value
//! semantics, so pools can be cloned across the optimizer/simulator boundary
//! without aliasing. Three aliases cover the uses:
//! - [`InstancePool`]: reserved units purchased per class and type,
//! - [`UsedPool`]: units currently occupied by running jobs,
//! - [`HourLog`]: accumulated instance-hours billed.
//!
//! This module also reads and writes the persisted optimized-pool format:
//! one `class,instance_type,count` line per entry, no header, any order.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{bail, Result};
use nom::{
    bytes::complete::{tag, take_while1},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::pricing::PricingTable;

/// An ordered two-level map: utilization class → instance type → `T`.
///
/// Class and type rows are kept in lexicographic order so iteration, and
/// everything derived from it, is deterministic.
///
/// ```
/// use riopt::pool::UtilizationMap;
///
/// let mut used: UtilizationMap<u32> = UtilizationMap::new();
/// used.add("Heavy Utility", "m1.small", 10);
/// used.add("Heavy Utility", "m1.small", 5);
///
/// assert_eq!(used.count("Heavy Utility", "m1.small"), 15);
/// assert_eq!(used.count("Light Utility", "m1.small"), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtilizationMap<T>(BTreeMap<String, BTreeMap<String, T>>);

pub type InstancePool = UtilizationMap<u32>;
pub type UsedPool = UtilizationMap<u32>;
pub type HourLog = UtilizationMap<f64>;

impl<T> UtilizationMap<T> {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts an empty row for `class` if it is not present yet.
    pub fn ensure_class(&mut self, class: &str) {
        if !self.0.contains_key(class) {
            self.0.insert(class.to_string(), BTreeMap::new());
        }
    }

    /// Returns true if at least one utilization class row exists, populated
    /// or not.
    pub fn has_classes(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over class rows and their instance-type maps.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, T>)> {
        self.0.iter()
    }

    /// Iterates over every `(class, instance type, value)` entry.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &T)> {
        self.0.iter().flat_map(|(class, types)| {
            types
                .iter()
                .map(move |(instance_type, value)| (class.as_str(), instance_type.as_str(), value))
        })
    }

    /// The set of instance types appearing in any class row.
    pub fn instance_types(&self) -> BTreeSet<&str> {
        self.0
            .values()
            .flat_map(|types| types.keys().map(String::as_str))
            .collect()
    }

    pub fn get(&self, class: &str, instance_type: &str) -> Option<&T> {
        self.0.get(class).and_then(|types| types.get(instance_type))
    }

    pub fn set(&mut self, class: &str, instance_type: &str, value: T) {
        self.0
            .entry(class.to_string())
            .or_default()
            .insert(instance_type.to_string(), value);
    }

    /// Drops every entry while keeping nothing of the previous shape.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<T: Copy + Default> UtilizationMap<T> {
    /// Returns the stored value, or zero for entries that were never touched.
    pub fn count(&self, class: &str, instance_type: &str) -> T {
        self.get(class, instance_type).copied().unwrap_or_default()
    }
}

impl<T: Copy + Default + std::ops::AddAssign> UtilizationMap<T> {
    /// Adds `amount` to an entry, creating it when absent.
    pub fn add(&mut self, class: &str, instance_type: &str, amount: T) {
        *self
            .0
            .entry(class.to_string())
            .or_default()
            .entry(instance_type.to_string())
            .or_default() += amount;
    }
}

impl UtilizationMap<u32> {
    /// Subtracts `amount` from an entry, removing the entry once it reaches
    /// zero so released capacity does not linger as an explicit zero row.
    ///
    /// # Panics
    ///
    /// Panics if the entry holds fewer than `amount` units. The caller owns
    /// the invariant that releases mirror earlier allocations exactly.
    ///
    /// ```
    /// use riopt::pool::UtilizationMap;
    ///
    /// let mut used: UtilizationMap<u32> = UtilizationMap::new();
    /// used.add("Heavy Utility", "m1.small", 10);
    /// used.release("Heavy Utility", "m1.small", 10);
    ///
    /// assert_eq!(used.get("Heavy Utility", "m1.small"), None);
    /// ```
    pub fn release(&mut self, class: &str, instance_type: &str, amount: u32) {
        let types = self
            .0
            .get_mut(class)
            .expect("released class was never allocated");
        let current = types
            .get_mut(instance_type)
            .expect("released instance type was never allocated");

        assert!(
            *current >= amount,
            "released more {}/{} units than allocated ({} < {})",
            class,
            instance_type,
            current,
            amount
        );

        *current -= amount;
        if *current == 0 {
            types.remove(instance_type);
        }
    }

    /// Zero-fills every listed instance type in every existing class row,
    /// leaving already-set counts untouched.
    pub fn zero_fill_types<'a, I>(&mut self, instance_types: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let instance_types: Vec<&str> = instance_types.into_iter().collect();

        for types in self.0.values_mut() {
            for instance_type in &instance_types {
                types.entry(instance_type.to_string()).or_insert(0);
            }
        }
    }
}

impl UtilizationMap<f64> {
    /// Applies `f` to every stored value in place.
    pub fn map_values<F: Fn(f64) -> f64>(&mut self, f: F) {
        for types in self.0.values_mut() {
            for value in types.values_mut() {
                *value = f(*value);
            }
        }
    }

    /// Sum of all entries, across classes and instance types.
    pub fn total(&self) -> f64 {
        self.0.values().flat_map(|types| types.values()).sum()
    }
}

/// Parses one persisted pool line: `class,instance_type,count`.
fn parse_pool_entry(input: &str) -> IResult<&str, (&str, &str, u32)> {
    let (i, class) = take_while1(|c| c != ',')(input)?;
    let (i, _) = tag(",")(i)?;
    let (i, instance_type) = take_while1(|c| c != ',')(i)?;
    let (i, _) = tag(",")(i)?;
    let (i, scount) = take_while1(|c: char| c.is_ascii_digit())(i)?;

    let count = scount.parse::<u32>().unwrap();

    Ok((i, (class, instance_type, count)))
}

/// Reads a persisted pool, reconstructing the full reserve shape of
/// `pricing` regardless of line order. Lines naming a class the pricing
/// table does not reserve are a configuration mismatch.
pub fn read_pool<R: BufRead>(reader: R, pricing: &PricingTable) -> Result<InstancePool> {
    let mut pool = pricing.empty_reserve_pool();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let (class, instance_type, count) = match parse_pool_entry(line.trim()) {
            Ok((_, entry)) => entry,
            Err(_) => bail!("invalid pool line: {}", line),
        };

        if !pricing.is_reserve_class(class) {
            bail!("unknown reserve utilization class in pool file: {}", class);
        }

        pool.set(class, instance_type, count);
    }

    Ok(pool)
}

pub fn read_pool_file<P: AsRef<Path>>(path: P, pricing: &PricingTable) -> Result<InstancePool> {
    let file = File::open(path)?;

    read_pool(BufReader::new(file), pricing)
}

pub fn write_pool<W: Write>(mut writer: W, pool: &InstancePool) -> Result<()> {
    for (class, instance_type, count) in pool.entries() {
        writeln!(writer, "{},{},{}", class, instance_type, count)?;
    }

    Ok(())
}

pub fn write_pool_file<P: AsRef<Path>>(path: P, pool: &InstancePool) -> Result<()> {
    let file = File::create(path)?;

    write_pool(BufWriter::new(file), pool)
}
