use crate::{
    cli::SimulateArgs,
    container::{EnsembleFile, Metadata},
};
use anyhow::Result;
use chrono::Utc;
use pulse_analysis::{
    TimeBase,
    synthetic::{EnsembleGenerator, PairedGenerator, PulseShape, PulseShapeKind, normal},
};
use scopepulse_common::TIMESTAMP_FORMAT;
use serde_json::json;
use tracing::{info, instrument};

fn pulse_shape(args: &SimulateArgs) -> PulseShape {
    match args.shape {
        PulseShapeKind::Gaussian => PulseShape::Gaussian { sd: args.rise },
        PulseShapeKind::Triangular => PulseShape::Triangular {
            rise: args.rise,
            fall: args.decay,
        },
        PulseShapeKind::Biexp => PulseShape::Biexp {
            rise: args.rise,
            decay: args.decay,
        },
    }
}

fn metadata(args: &SimulateArgs, channel: &str) -> Result<Metadata> {
    Ok(Metadata::from([
        ("channel".to_owned(), json!(channel)),
        ("pulse".to_owned(), serde_json::to_value(pulse_shape(args))?),
        ("seed".to_owned(), json!(args.seed)),
        ("sample_time".to_owned(), json!(args.sample_time)),
        ("noise_sd".to_owned(), json!(args.noise_sd)),
        (
            "generated".to_owned(),
            json!(Utc::now().format(TIMESTAMP_FORMAT).to_string()),
        ),
    ]))
}

/// Builds the signal ensemble file, and the reference ensemble file when one is requested.
#[instrument(skip_all, fields(events = args.events, seed = args.seed))]
pub fn generate(args: &SimulateArgs) -> Result<(EnsembleFile, Option<EnsembleFile>)> {
    let time_base = TimeBase::uniform(0.0, args.sample_time, args.samples)?;
    let shape = pulse_shape(args);
    let amplitude = normal(args.amplitude, args.amplitude_sd)?;

    if args.reference_output.is_none() {
        let generator = EnsembleGenerator::new(
            shape,
            time_base,
            amplitude,
            normal(args.arrival, args.arrival_sd)?,
            args.noise_sd,
        )?;
        let signal = generator.generate_seeded(args.events, args.seed)?;
        return Ok((
            EnsembleFile::from_ensemble(&signal, metadata(args, "signal")?),
            None,
        ));
    }

    let signal = EnsembleGenerator::new(
        shape,
        time_base.clone(),
        amplitude,
        normal(args.separation, args.jitter_sd)?,
        args.noise_sd,
    )?;
    let reference = EnsembleGenerator::new(
        shape,
        time_base,
        normal(args.reference_amplitude, 0.0)?,
        normal(args.arrival, args.arrival_sd)?,
        args.noise_sd,
    )?;
    let (signal, reference) =
        PairedGenerator::new(signal, reference).generate_seeded(args.events, args.seed)?;
    Ok((
        EnsembleFile::from_ensemble(&signal, metadata(args, "signal")?),
        Some(EnsembleFile::from_ensemble(
            &reference,
            metadata(args, "reference")?,
        )),
    ))
}

pub fn simulate(args: &SimulateArgs) -> Result<()> {
    let (signal, reference) = generate(args)?;
    signal.save(&args.output)?;
    info!(path = %args.output.display(), events = signal.traces.len(), "Signal ensemble written");
    if let (Some(reference), Some(path)) = (reference, &args.reference_output) {
        reference.save(path)?;
        info!(path = %path.display(), "Reference ensemble written");
    }
    Ok(())
}
