use std::path::Path;

use anyhow::{bail, Result};
use clap::Parser;

use riopt::{
    cli::{RioSubCommand, CLI},
    context::RioContext,
    optimizer::Optimizer,
    pool::{self, InstancePool},
    pricing::PricingTable,
    report::{self, UsageRecorder},
    simulator::Simulator,
};

fn load_pool(path: Option<&Path>, pricing: &PricingTable) -> Result<InstancePool> {
    match path {
        Some(path) => pool::read_pool_file(path, pricing),
        None => Ok(pricing.empty_reserve_pool()),
    }
}

fn run_optimize(
    ctx: &RioContext,
    owned: Option<&Path>,
    save: Option<&Path>,
    iteration_cap: u32,
) -> Result<()> {
    let pricing = ctx.pricing()?;
    let jobs = ctx.load_history()?;
    if jobs.is_empty() {
        bail!("job history is empty after filtering; nothing to optimize");
    }

    let owned_pool = owned
        .map(|path| pool::read_pool_file(path, &pricing))
        .transpose()?;

    let optimizer =
        Optimizer::new(&pricing, &jobs, ctx.window).with_iteration_cap(iteration_cap);
    let optimized = optimizer.run(owned_pool)?;

    if let Some(path) = save {
        pool::write_pool_file(path, &optimized)?;
        if ctx.verbose {
            eprintln!("Optimized pool saved in {}.", path.display());
        }
    }

    report::savings_report(&pricing, &jobs, &optimized, ctx.window)
}

fn run_simulate(ctx: &RioContext, pool_path: Option<&Path>) -> Result<()> {
    let pricing = ctx.pricing()?;
    let jobs = ctx.load_history()?;
    let pool = load_pool(pool_path, &pricing)?;

    let logged_hours = Simulator::new(&pricing, &jobs, &pool).run()?;
    let (total, upfront) = pricing.calculate_cost(&logged_hours, &pool)?;

    report::print_hour_log("Observed instance-hours", &logged_hours);
    println!("Cost over the observed window: ${:.2}", total);
    println!("\tupfront component: ${:.2}", upfront);

    Ok(())
}

fn run_usage(ctx: &RioContext, pool_path: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let pricing = ctx.pricing()?;
    let jobs = ctx.load_history()?;
    let pool = load_pool(pool_path, &pricing)?;

    let mut recorder = UsageRecorder::new();
    let mut simulator = Simulator::new(&pricing, &jobs, &pool);
    simulator.attach_observer(&mut recorder);
    simulator.run()?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            recorder.write_json(std::io::BufWriter::new(file))?;
            if ctx.verbose {
                eprintln!("Usage series saved in {}.", path.display());
            }
        }
        None => {
            recorder.write_json(std::io::stdout().lock())?;
            println!();
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let opts = CLI::parse();
    let ctx = RioContext::try_from(&opts)?;

    match &opts.command {
        RioSubCommand::Optimize {
            owned,
            save,
            iteration_cap,
            ..
        } => run_optimize(&ctx, owned.as_deref(), save.as_deref(), *iteration_cap),
        RioSubCommand::Simulate { pool, .. } => run_simulate(&ctx, pool.as_deref()),
        RioSubCommand::Usage { pool, output, .. } => {
            run_usage(&ctx, pool.as_deref(), output.as_deref())
        }
    }
}
