use super::{Feature, FeatureExtractor, HIGH_THRESHOLD_FRACTION, LOW_THRESHOLD_FRACTION};
use crate::{
    Real,
    crossing::{CrossingError, interpolate_between, interpolate_from},
    ensemble::{TimeBase, Trace},
    polarity::Polarity,
};

/// Extremum of a trace and the 10% and 90% thresholds derived from it.
struct EdgeThresholds {
    extremum_index: usize,
    low: Real,
    high: Real,
}

impl EdgeThresholds {
    fn new(polarity: Polarity, trace: Trace<'_>) -> Result<Self, CrossingError> {
        let (extremum_index, extremum) =
            polarity.extremum(trace).ok_or(CrossingError::EmptyTrace)?;
        Ok(Self {
            extremum_index,
            low: LOW_THRESHOLD_FRACTION * extremum,
            high: HIGH_THRESHOLD_FRACTION * extremum,
        })
    }
}

/// 10%–90% transition time on the leading edge.
///
/// Both crossings must lie before the extremum.
#[derive(Clone, Copy, Debug)]
pub struct RiseTime {
    polarity: Polarity,
}

impl RiseTime {
    pub fn new(polarity: Polarity) -> Self {
        Self { polarity }
    }
}

impl FeatureExtractor for RiseTime {
    fn feature(&self) -> Feature {
        Feature::Rise
    }

    fn measure(&self, time_base: &TimeBase, trace: Trace<'_>) -> Result<Real, CrossingError> {
        let thresholds = EdgeThresholds::new(self.polarity, trace)?;
        let edge = self.polarity.leading_edge();
        let end = thresholds.extremum_index;
        let low = interpolate_between(time_base, trace, thresholds.low, edge, 0, end)?;
        let high = interpolate_between(time_base, trace, thresholds.high, edge, 0, end)?;
        Ok(high - low)
    }
}

/// 90%–10% transition time on the trailing edge.
///
/// Both crossings are searched for starting at the extremum, whatever the polarity,
/// so neither can be found on the leading edge.
#[derive(Clone, Copy, Debug)]
pub struct FallTime {
    polarity: Polarity,
}

impl FallTime {
    pub fn new(polarity: Polarity) -> Self {
        Self { polarity }
    }
}

impl FeatureExtractor for FallTime {
    fn feature(&self) -> Feature {
        Feature::Fall
    }

    fn measure(&self, time_base: &TimeBase, trace: Trace<'_>) -> Result<Real, CrossingError> {
        let thresholds = EdgeThresholds::new(self.polarity, trace)?;
        let edge = self.polarity.trailing_edge();
        let start = thresholds.extremum_index;
        let high = interpolate_from(time_base, trace, thresholds.high, edge, start)?;
        let low = interpolate_from(time_base, trace, thresholds.low, edge, start)?;
        Ok(low - high)
    }
}
