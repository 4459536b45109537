//! Command line interface definition.
//!
//! Default values for runtime parameters live here; `RioContext` resolves
//! the parsed arguments into the runtime parameter struct.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "riopt",
    version,
    about = "Analyzes a compute-cluster job history and recommends the \
             cheapest mix of reserved-capacity purchases."
)]
pub struct CLI {
    /// Print progress messages to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: RioSubCommand,
}

#[derive(Subcommand)]
pub enum RioSubCommand {
    /// Find the cost-minimizing reserved-instance pool for a job history.
    Optimize {
        #[command(flatten)]
        common: CommonOpts,

        /// Start from a pool of instances already owned; only additional
        /// purchases are recommended.
        #[arg(long)]
        owned: Option<PathBuf>,

        /// Save the optimized pool so later runs can skip the search.
        #[arg(long)]
        save: Option<PathBuf>,

        /// Hill-climb round limit per instance type.
        #[arg(long, default_value_t = crate::optimizer::DEFAULT_ITERATION_CAP)]
        iteration_cap: u32,
    },

    /// Replay a job history against a saved pool and print the hour log.
    Simulate {
        #[command(flatten)]
        common: CommonOpts,

        /// Pool file to replay against; without it, everything runs
        /// on demand.
        #[arg(long)]
        pool: Option<PathBuf>,
    },

    /// Record the per-event usage time series for external graphing.
    Usage {
        #[command(flatten)]
        common: CommonOpts,

        /// Pool file to replay against; without it, everything runs
        /// on demand.
        #[arg(long)]
        pool: Option<PathBuf>,

        /// Where to write the JSON series; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct CommonOpts {
    /// Job history: a JSON file, or a directory of .json files.
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Pricing table JSON; defaults to the built-in US-West table.
    #[arg(long)]
    pub pricing: Option<PathBuf>,

    /// Discard jobs starting before this day (YYYY/MM/DD).
    #[arg(long)]
    pub min_day: Option<String>,

    /// Discard jobs ending after this day (YYYY/MM/DD).
    #[arg(long)]
    pub max_day: Option<String>,

    /// Observation window override for the yearly estimate, e.g. "60d".
    /// Defaults to the span of the filtered history.
    #[arg(long)]
    pub window: Option<String>,
}

impl CLI {
    /// The options shared by every subcommand.
    pub fn common(&self) -> &CommonOpts {
        match &self.command {
            RioSubCommand::Optimize { common, .. } => common,
            RioSubCommand::Simulate { common, .. } => common,
            RioSubCommand::Usage { common, .. } => common,
        }
    }
}
