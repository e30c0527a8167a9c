use anyhow::{Context, Result};
use clap::Parser;
use day10::{CLIArgs, Error, PressPlanner};

fn main() -> Result<()> {
    env_logger::init();
    let args = CLIArgs::parse();
    let devices = day10::read_devices(&args.input_path).with_context(|| {
        format!(
            "Failed to read machines from given file({}).",
            args.input_path.display()
        )
    })?;

    let limits = args.limits().context("Invalid limits for modeling machines.")?;
    let planner = PressPlanner::new(args.make_solver(), limits);
    let plans = planner
        .plan_all(&devices)
        .context("Failed to configure joltage counters of all machines.")?;
    if let Some(ind) = args.inspect {
        let plan = plans
            .get(ind)
            .ok_or(Error::NoSuchDevice(ind, plans.len()))?;
        println!("Machine {}: {}.", ind, plan);
    }

    let presses_sum = day10::presses_sum(&plans);
    println!(
        "The fewest button presses to configure the joltage counters on all machines is {}.",
        presses_sum
    );

    Ok(())
}
