use anyhow::{Context, Result};
use clap::Parser;
use day10::CLIArgs;

fn main() -> Result<()> {
    env_logger::init();
    let args = CLIArgs::parse();
    let devices = day10::read_devices(&args.input_path).with_context(|| {
        format!(
            "Failed to read machines from given file({}).",
            args.input_path.display()
        )
    })?;

    let presses_sum = day10::lights_presses_sum(&devices)
        .context("Failed to configure indicator lights of all machines.")?;
    println!(
        "The fewest button presses to configure the indicator lights on all machines is {}.",
        presses_sum
    );

    Ok(())
}
