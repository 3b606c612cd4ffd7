use anyhow::Result;
use clap::Parser;
use pulse_report::{
    analyse,
    cli::{Cli, Command},
    simulate::simulate,
};
use scopepulse_common::{TracerOptions, init_tracer};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracer = init_tracer!(TracerOptions {
        default_level: cli.log_level,
        ..Default::default()
    })?;

    match &cli.command {
        Command::Analyse(args) => {
            analyse(args)?;
        }
        Command::Simulate(args) => simulate(args)?,
    }
    Ok(())
}
