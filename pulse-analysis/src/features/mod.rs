//! Per-event feature extraction.
//!
//! Every extractor measures one scalar per trace. Extractors that depend on
//! the pulse direction are constructed with the ensemble's [Polarity], which
//! is detected once by the caller and shared between them.
pub mod area;
pub mod edges;
pub mod jitter;
pub mod peak;

use crate::{
    AnalysisError, AnalysisResult, Real,
    crossing::CrossingError,
    ensemble::{TimeBase, Trace, TraceEnsemble},
};
use scopepulse_common::{EventIndex, NANOSECONDS_PER_SECOND};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{debug, instrument, warn};

pub use area::Area;
pub use edges::{FallTime, RiseTime};
pub use jitter::{Jitter, JitterSummary};
pub use peak::Peak;

/// Fractions of the extremum used for the low and high edge thresholds.
pub const LOW_THRESHOLD_FRACTION: Real = 0.1;
pub const HIGH_THRESHOLD_FRACTION: Real = 0.9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display)]
pub enum Feature {
    Area,
    Rise,
    Fall,
    Peak,
    Jitter,
}

impl Feature {
    pub fn title(self) -> &'static str {
        match self {
            Feature::Area => "Pulse integral",
            Feature::Rise => "Rise time",
            Feature::Fall => "Fall time",
            Feature::Peak => "Pulse height",
            Feature::Jitter => "Jitter between signal and trigger out",
        }
    }

    pub fn x_axis_label(self) -> &'static str {
        match self {
            Feature::Area => "Integrated area (V.ns)",
            Feature::Rise => "Rise time (ns)",
            Feature::Fall => "Fall time (ns)",
            Feature::Peak => "Pulse height (V)",
            Feature::Jitter => "Pulse separation (ns)",
        }
    }

    /// Display unit of the x axis.
    pub fn unit(self) -> &'static str {
        match self {
            Feature::Area => "V.ns",
            Feature::Rise | Feature::Fall | Feature::Jitter => "ns",
            Feature::Peak => "V",
        }
    }

    pub fn y_axis_label(self) -> &'static str {
        "Events"
    }

    /// Factor converting native units (seconds, volts) to the display units of the x axis.
    pub fn display_scale(self) -> Real {
        match self {
            Feature::Peak => 1.0,
            Feature::Area | Feature::Rise | Feature::Fall | Feature::Jitter => {
                NANOSECONDS_PER_SECOND
            }
        }
    }
}

/// What to do with an event whose threshold crossing cannot be found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CrossingPolicy {
    /// Drop the event from the feature and record its index.
    #[default]
    Skip,
    /// Fail the whole feature on the first such event.
    Abort,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeatureSample {
    pub event: EventIndex,
    pub value: Real,
}

/// The per-event values of one feature.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FeatureSamples {
    samples: Vec<FeatureSample>,
    skipped: Vec<EventIndex>,
}

impl FeatureSamples {
    /// Adds the outcome of measuring one event, applying `policy` to failures.
    pub(crate) fn record(
        &mut self,
        feature: Feature,
        event: EventIndex,
        measurement: Result<Real, CrossingError>,
        policy: CrossingPolicy,
    ) -> AnalysisResult<()> {
        match measurement {
            Ok(value) => self.samples.push(FeatureSample { event, value }),
            Err(source) => match policy {
                CrossingPolicy::Skip => {
                    warn!(%feature, event, "Event skipped: {source}");
                    self.skipped.push(event);
                }
                CrossingPolicy::Abort => {
                    return Err(AnalysisError::Crossing {
                        feature,
                        event,
                        source,
                    });
                }
            },
        }
        Ok(())
    }

    pub fn samples(&self) -> &[FeatureSample] {
        &self.samples
    }

    pub fn values(&self) -> impl Iterator<Item = Real> + Clone + '_ {
        self.samples.iter().map(|sample| sample.value)
    }

    /// Events dropped because no threshold crossing was found.
    pub fn skipped(&self) -> &[EventIndex] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> Option<FeatureSummary> {
        FeatureSummary::from_values(self.values())
    }
}

impl FromIterator<FeatureSample> for FeatureSamples {
    fn from_iter<T: IntoIterator<Item = FeatureSample>>(iter: T) -> Self {
        Self {
            samples: iter.into_iter().collect(),
            skipped: Vec::default(),
        }
    }
}

/// Mean and spread of a feature over the events that produced a value.
///
/// `standard_error` is the population standard deviation of the values; it is
/// the width of the distribution and is what the histogram range scales to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub mean: Real,
    pub standard_error: Real,
    pub count: usize,
}

impl FeatureSummary {
    /// Returns `None` for an empty sequence.
    pub fn from_values<I: Iterator<Item = Real> + Clone>(values: I) -> Option<Self> {
        // Deviations are taken from the first value so identical inputs give exactly zero spread.
        let shift = values.clone().next()?;
        let (count, sum, sum_of_squares) = values.fold((0usize, 0.0, 0.0), |(n, s, ss), v| {
            let d = v - shift;
            (n + 1, s + d, ss + d * d)
        });
        let n = count as Real;
        let variance = ((sum_of_squares - sum * sum / n) / n).max(0.0);
        Some(Self {
            mean: shift + sum / n,
            standard_error: variance.sqrt(),
            count,
        })
    }

    /// Uncertainty of the mean itself.
    pub fn error_on_mean(&self) -> Real {
        self.standard_error / (self.count as Real).sqrt()
    }

    pub fn scaled(&self, scale: Real) -> Self {
        Self {
            mean: self.mean * scale,
            standard_error: self.standard_error * scale.abs(),
            count: self.count,
        }
    }
}

/// A feature measured independently on each trace of one ensemble.
pub trait FeatureExtractor {
    fn feature(&self) -> Feature;

    fn measure(&self, time_base: &TimeBase, trace: Trace<'_>) -> Result<Real, CrossingError>;

    #[instrument(skip_all, fields(feature = %self.feature(), events = ensemble.num_events()))]
    fn extract(
        &self,
        ensemble: &TraceEnsemble,
        policy: CrossingPolicy,
    ) -> AnalysisResult<FeatureSamples> {
        let time_base = ensemble.time_base();
        let mut samples = FeatureSamples::default();
        for (event, trace) in ensemble.traces().enumerate() {
            samples.record(self.feature(), event, self.measure(time_base, trace), policy)?;
        }
        debug!(
            measured = samples.len(),
            skipped = samples.skipped().len(),
            "Feature extracted"
        );
        Ok(samples)
    }
}
