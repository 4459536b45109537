//! Runtime parameters.
//!
//! This module defines the `RioContext` struct containing the resolved
//! parameters a run needs: where the history lives, which pricing table to
//! use, the date bounds and the observation window. It is meant to be built
//! from parsed command line arguments:
//! ```no_run
//! use riopt::{cli::CLI, context::RioContext};
//! use clap::Parser;
//!
//! let args = CLI::parse();
//! let ctx = RioContext::try_from(&args).unwrap();
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use time::{Duration, OffsetDateTime};

use crate::{
    cli::CLI,
    history::{filter::parse_day, filter::JobFilter, reader::HistoryReader},
    job::Job,
    pricing::{west_coast, PricingTable},
};

pub struct RioContext {
    /// Job history file or directory.
    pub history_path: PathBuf,
    /// Pricing table file; the built-in table when absent.
    pub pricing_path: Option<PathBuf>,
    /// Jobs starting before this instant are discarded.
    pub min_day: Option<OffsetDateTime>,
    /// Jobs ending after this instant are discarded.
    pub max_day: Option<OffsetDateTime>,
    /// Observation window override for yearly estimates.
    pub window: Option<Duration>,
    pub verbose: bool,
}

impl RioContext {
    /// Loads the pricing table selected on the command line.
    pub fn pricing(&self) -> Result<PricingTable> {
        match &self.pricing_path {
            Some(path) => PricingTable::load(path),
            None => Ok(west_coast::pricing()),
        }
    }

    /// Loads, filters and sorts the job history.
    pub fn load_history(&self) -> Result<Vec<Job>> {
        let records = HistoryReader::new(&self.history_path).read()?;
        let (jobs, dropped) = JobFilter::new(self.min_day, self.max_day).filter(records);

        if self.verbose {
            eprintln!(
                "Loaded {} jobs from {} ({} records dropped).",
                jobs.len(),
                self.history_path.display(),
                dropped
            );
        }

        Ok(jobs)
    }
}

fn parse_window(input: &str) -> Result<Duration> {
    let window = duration_str::parse(input)
        .map_err(|e| anyhow!("invalid window '{}': {}", input, e))?;

    Ok(Duration::try_from(window)?)
}

impl TryFrom<&CLI> for RioContext {
    type Error = anyhow::Error;

    fn try_from(cli_opts: &CLI) -> Result<Self> {
        let common = cli_opts.common();

        Ok(Self {
            history_path: common.file.clone(),
            pricing_path: common.pricing.clone(),
            min_day: common.min_day.as_deref().map(parse_day).transpose()?,
            max_day: common.max_day.as_deref().map(parse_day).transpose()?,
            window: common.window.as_deref().map(parse_window).transpose()?,
            verbose: cli_opts.verbose,
        })
    }
}
