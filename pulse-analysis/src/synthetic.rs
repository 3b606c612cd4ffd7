//! Seeded synthetic pulse ensembles.
//!
//! Each event is one pulse of a fixed [PulseShape], scaled by an amplitude and
//! placed at an arrival time both drawn from normal distributions, with
//! independent gaussian noise added to every sample. The arrival time is the
//! time of the pulse's extremum.
use crate::{
    Real,
    ensemble::{EnsembleError, TimeBase, TraceEnsemble},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum SyntheticError {
    #[error("Invalid pulse shape {0:?}")]
    InvalidShape(PulseShape),
    #[error("Standard deviation {0} must be finite and non-negative")]
    InvalidStandardDeviation(Real),
    #[error("Invalid distribution: {0}")]
    Distribution(#[from] NormalError),
    #[error("Ensemble Error: {0}")]
    Ensemble(#[from] EnsembleError),
}

/// Kinds of [PulseShape], as named on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum PulseShapeKind {
    #[default]
    Gaussian,
    Triangular,
    Biexp,
}

/// Unit-height pulse profiles. All durations are in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "shape")]
pub enum PulseShape {
    Gaussian { sd: Real },
    /// Linear rise to the peak over `rise`, linear fall back to zero over `fall`.
    Triangular { rise: Real, fall: Real },
    /// Difference of two exponentials, `exp(-t/decay) - exp(-t/rise)`.
    Biexp { rise: Real, decay: Real },
}

impl PulseShape {
    pub fn validate(&self) -> Result<(), SyntheticError> {
        let positive = |v: Real| v.is_finite() && v > 0.0;
        let valid = match *self {
            PulseShape::Gaussian { sd } => positive(sd),
            PulseShape::Triangular { rise, fall } => positive(rise) && positive(fall),
            PulseShape::Biexp { rise, decay } => positive(rise) && positive(decay) && rise != decay,
        };
        if valid {
            Ok(())
        } else {
            Err(SyntheticError::InvalidShape(*self))
        }
    }

    /// Time from the start of a biexponential pulse to its peak.
    fn biexp_peak_time(rise: Real, decay: Real) -> Real {
        (decay * rise / (decay - rise)) * (decay / rise).ln()
    }

    /// Value of the unit-height pulse at `dt` seconds after its peak.
    pub fn unit_value(&self, dt: Real) -> Real {
        match *self {
            PulseShape::Gaussian { sd } => (-0.5 * (dt / sd).powi(2)).exp(),
            PulseShape::Triangular { rise, fall } => {
                if dt < -rise || dt > fall {
                    0.0
                } else if dt < 0.0 {
                    1.0 + dt / rise
                } else {
                    1.0 - dt / fall
                }
            }
            PulseShape::Biexp { rise, decay } => {
                let peak_time = Self::biexp_peak_time(rise, decay);
                let t = dt + peak_time;
                if t < 0.0 {
                    0.0
                } else {
                    let profile = |t: Real| (-t / decay).exp() - (-t / rise).exp();
                    profile(t) / profile(peak_time)
                }
            }
        }
    }
}

fn check_standard_deviation(sd: Real) -> Result<Real, SyntheticError> {
    if sd.is_finite() && sd >= 0.0 {
        Ok(sd)
    } else {
        Err(SyntheticError::InvalidStandardDeviation(sd))
    }
}

/// Normal distribution whose standard deviation is finite and non-negative.
pub fn normal(mean: Real, sd: Real) -> Result<Normal<Real>, SyntheticError> {
    Ok(Normal::new(mean, check_standard_deviation(sd)?)?)
}

/// Generates ensembles of independent pulses on a shared time base.
#[derive(Clone, Debug)]
pub struct EnsembleGenerator {
    shape: PulseShape,
    amplitude: Normal<Real>,
    arrival: Normal<Real>,
    noise: Normal<Real>,
    time_base: TimeBase,
}

impl EnsembleGenerator {
    /// `amplitude` is signed: negative amplitudes give negative pulses.
    pub fn new(
        shape: PulseShape,
        time_base: TimeBase,
        amplitude: Normal<Real>,
        arrival: Normal<Real>,
        noise_sd: Real,
    ) -> Result<Self, SyntheticError> {
        shape.validate()?;
        check_standard_deviation(amplitude.std_dev())?;
        check_standard_deviation(arrival.std_dev())?;
        Ok(Self {
            shape,
            amplitude,
            arrival,
            noise: normal(0.0, noise_sd)?,
            time_base,
        })
    }

    pub fn time_base(&self) -> &TimeBase {
        &self.time_base
    }

    fn trace<R: Rng + ?Sized>(&self, arrival: Real, rng: &mut R) -> Vec<Real> {
        let amplitude = self.amplitude.sample(rng);
        self.time_base
            .view()
            .iter()
            .map(|t| amplitude * self.shape.unit_value(t - arrival) + self.noise.sample(rng))
            .collect()
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        events: usize,
        rng: &mut R,
    ) -> Result<TraceEnsemble, SyntheticError> {
        let traces = (0..events)
            .map(|_| {
                let arrival = self.arrival.sample(rng);
                self.trace(arrival, rng)
            })
            .collect();
        Ok(TraceEnsemble::new(self.time_base.clone(), traces)?)
    }

    #[instrument(skip(self))]
    pub fn generate_seeded(
        &self,
        events: usize,
        seed: u64,
    ) -> Result<TraceEnsemble, SyntheticError> {
        let ensemble = self.generate(events, &mut StdRng::seed_from_u64(seed))?;
        debug!(samples = ensemble.num_samples(), "Ensemble generated");
        Ok(ensemble)
    }
}

/// Generates a signal ensemble and a correlated reference ensemble.
///
/// The reference pulse of each event arrives at a time drawn from the
/// reference generator. The signal generator's arrival distribution is read
/// relative to it: its mean is the separation between the channels and its
/// standard deviation is the jitter.
#[derive(Clone, Debug)]
pub struct PairedGenerator {
    signal: EnsembleGenerator,
    reference: EnsembleGenerator,
}

impl PairedGenerator {
    pub fn new(signal: EnsembleGenerator, reference: EnsembleGenerator) -> Self {
        Self { signal, reference }
    }

    /// Returns `(signal, reference)`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        events: usize,
        rng: &mut R,
    ) -> Result<(TraceEnsemble, TraceEnsemble), SyntheticError> {
        let (signal, reference): (Vec<_>, Vec<_>) = (0..events)
            .map(|_| {
                let reference_arrival = self.reference.arrival.sample(rng);
                let signal_arrival = reference_arrival + self.signal.arrival.sample(rng);
                (
                    self.signal.trace(signal_arrival, rng),
                    self.reference.trace(reference_arrival, rng),
                )
            })
            .unzip();
        Ok((
            TraceEnsemble::new(self.signal.time_base.clone(), signal)?,
            TraceEnsemble::new(self.reference.time_base.clone(), reference)?,
        ))
    }

    #[instrument(skip(self))]
    pub fn generate_seeded(
        &self,
        events: usize,
        seed: u64,
    ) -> Result<(TraceEnsemble, TraceEnsemble), SyntheticError> {
        self.generate(events, &mut StdRng::seed_from_u64(seed))
    }
}
