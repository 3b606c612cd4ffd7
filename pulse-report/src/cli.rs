use crate::presenter::PresenterKind;
use clap::{Parser, Subcommand};
use pulse_analysis::{Real, features::CrossingPolicy, synthetic::PulseShapeKind};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Cli {
    /// Log level used when `RUST_LOG` is not set
    #[clap(long, env = "PULSE_REPORT_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Characterise the pulses of an ensemble file
    Analyse(AnalyseArgs),

    /// Write a synthetic ensemble file (and optionally a correlated reference)
    Simulate(SimulateArgs),
}

#[derive(Clone, Debug, Parser)]
pub struct AnalyseArgs {
    /// Ensemble file of the signal channel
    #[clap(long, env = "PULSE_REPORT_SIGNAL")]
    pub signal: PathBuf,

    /// Ensemble file of the reference channel; enables the jitter measurement
    #[clap(long, env = "PULSE_REPORT_REFERENCE")]
    pub reference: Option<PathBuf>,

    /// What to do with events in which a threshold crossing is missing
    #[clap(long, env = "PULSE_REPORT_CROSSING_POLICY", default_value = "skip")]
    pub crossing_policy: CrossingPolicy,

    /// Use this many bins; by default the bin width is a fifth of the standard error
    #[clap(long, env = "PULSE_REPORT_BINS")]
    pub bins: Option<usize>,

    #[clap(long, env = "PULSE_REPORT_PRESENTER", default_value = "text")]
    pub presenter: PresenterKind,

    /// Write the report here instead of stdout
    #[clap(long, env = "PULSE_REPORT_OUTPUT")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, Parser)]
pub struct SimulateArgs {
    /// Ensemble file to write the signal channel to
    #[clap(long, env = "PULSE_REPORT_SIMULATE_OUTPUT")]
    pub output: PathBuf,

    /// If set, a reference channel is generated and written here
    #[clap(long, env = "PULSE_REPORT_REFERENCE_OUTPUT")]
    pub reference_output: Option<PathBuf>,

    #[clap(long, env = "PULSE_REPORT_EVENTS", default_value = "1000")]
    pub events: usize,

    #[clap(long, env = "PULSE_REPORT_SAMPLES", default_value = "500")]
    pub samples: usize,

    /// Seconds between samples
    #[clap(long, env = "PULSE_REPORT_SAMPLE_TIME", default_value = "2e-10")]
    pub sample_time: Real,

    #[clap(long, env = "PULSE_REPORT_SHAPE", default_value = "gaussian")]
    pub shape: PulseShapeKind,

    /// Rise time of the pulse in seconds (standard deviation of gaussian pulses)
    #[clap(long, env = "PULSE_REPORT_RISE", default_value = "2e-9")]
    pub rise: Real,

    /// Fall time (triangular) or decay constant (biexp) in seconds
    #[clap(long, env = "PULSE_REPORT_DECAY", default_value = "8e-9")]
    pub decay: Real,

    /// Mean pulse height in volts; negative for negative pulses
    #[clap(
        long,
        env = "PULSE_REPORT_AMPLITUDE",
        default_value = "-0.1",
        allow_negative_numbers = true,
    )]
    pub amplitude: Real,

    #[clap(long, env = "PULSE_REPORT_AMPLITUDE_SD", default_value = "0.005")]
    pub amplitude_sd: Real,

    /// Mean time of the pulse extremum in seconds
    #[clap(long, env = "PULSE_REPORT_ARRIVAL", default_value = "40e-9")]
    pub arrival: Real,

    #[clap(long, env = "PULSE_REPORT_ARRIVAL_SD", default_value = "1e-9")]
    pub arrival_sd: Real,

    /// Standard deviation of the noise added to every sample, in volts
    #[clap(long, env = "PULSE_REPORT_NOISE_SD", default_value = "0.001")]
    pub noise_sd: Real,

    /// Mean delay of the signal pulse after the reference pulse, in seconds
    #[clap(
        long,
        env = "PULSE_REPORT_SEPARATION",
        default_value = "10e-9",
        allow_negative_numbers = true,
    )]
    pub separation: Real,

    /// Standard deviation of that delay, in seconds
    #[clap(long, env = "PULSE_REPORT_JITTER_SD", default_value = "2e-10")]
    pub jitter_sd: Real,

    /// Pulse height of the reference channel in volts
    #[clap(
        long,
        env = "PULSE_REPORT_REFERENCE_AMPLITUDE",
        default_value = "0.5",
        allow_negative_numbers = true,
    )]
    pub reference_amplitude: Real,

    #[clap(long, env = "PULSE_REPORT_SEED", default_value = "0")]
    pub seed: u64,
}
