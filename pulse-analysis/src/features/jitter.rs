use super::{CrossingPolicy, Feature, FeatureSamples, FeatureSummary, LOW_THRESHOLD_FRACTION};
use crate::{
    AnalysisError, AnalysisResult, Real,
    crossing::{CrossingError, interpolate_between},
    ensemble::{TimeBase, Trace, TraceEnsemble},
    polarity::Polarity,
};
use serde::Serialize;
use tracing::{debug, instrument};

/// Signed separation between the leading edges of two correlated channels.
///
/// Each channel keeps its own time base and polarity; event `i` of the signal
/// is paired with event `i` of the reference.
#[derive(Clone, Copy, Debug)]
pub struct Jitter {
    signal: Polarity,
    reference: Polarity,
}

impl Jitter {
    pub fn new(signal: Polarity, reference: Polarity) -> Self {
        Self { signal, reference }
    }

    /// Detects the polarity of each ensemble independently.
    pub fn detect(signal: &TraceEnsemble, reference: &TraceEnsemble) -> Self {
        Self::new(Polarity::detect(signal), Polarity::detect(reference))
    }

    /// Time of the 10%-of-extremum crossing on the leading edge, before the extremum.
    fn arrival(
        time_base: &TimeBase,
        trace: Trace<'_>,
        polarity: Polarity,
    ) -> Result<Real, CrossingError> {
        let (extremum_index, extremum) =
            polarity.extremum(trace).ok_or(CrossingError::EmptyTrace)?;
        interpolate_between(
            time_base,
            trace,
            LOW_THRESHOLD_FRACTION * extremum,
            polarity.leading_edge(),
            0,
            extremum_index,
        )
    }

    /// Separation `t_signal - t_reference` for one pair of traces.
    pub fn separation(
        &self,
        signal: (&TimeBase, Trace<'_>),
        reference: (&TimeBase, Trace<'_>),
    ) -> Result<Real, CrossingError> {
        let signal_time = Self::arrival(signal.0, signal.1, self.signal)?;
        let reference_time = Self::arrival(reference.0, reference.1, self.reference)?;
        Ok(signal_time - reference_time)
    }

    #[instrument(skip_all, fields(events = signal.num_events()))]
    pub fn extract(
        &self,
        signal: &TraceEnsemble,
        reference: &TraceEnsemble,
        policy: CrossingPolicy,
    ) -> AnalysisResult<FeatureSamples> {
        if signal.num_events() != reference.num_events() {
            return Err(AnalysisError::EventCountMismatch {
                signal: signal.num_events(),
                reference: reference.num_events(),
            });
        }
        let mut samples = FeatureSamples::default();
        for (event, (signal_trace, reference_trace)) in
            signal.traces().zip(reference.traces()).enumerate()
        {
            let separation = self.separation(
                (signal.time_base(), signal_trace),
                (reference.time_base(), reference_trace),
            );
            samples.record(Feature::Jitter, event, separation, policy)?;
        }
        debug!(
            measured = samples.len(),
            skipped = samples.skipped().len(),
            "Jitter extracted"
        );
        Ok(samples)
    }
}

/// Mean pulse separation and its spread (the jitter).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct JitterSummary {
    pub separation: FeatureSummary,
    /// Uncertainty of the jitter estimate, `jitter / sqrt(2 * count)`.
    pub jitter_error: Real,
}

impl JitterSummary {
    pub fn from_samples(samples: &FeatureSamples) -> Option<Self> {
        samples.summary().map(|separation| Self {
            separation,
            jitter_error: separation.standard_error / (2.0 * separation.count as Real).sqrt(),
        })
    }

    pub fn jitter(&self) -> Real {
        self.separation.standard_error
    }
}
