use super::{Feature, FeatureExtractor};
use crate::{
    Real,
    crossing::CrossingError,
    ensemble::{TimeBase, Trace},
};
use itertools::Itertools;

/// Time integral of each trace by the trapezoidal rule, in native units (V·s).
#[derive(Clone, Copy, Debug, Default)]
pub struct Area;

impl Area {
    pub fn integrate(time_base: &TimeBase, trace: Trace<'_>) -> Real {
        time_base
            .view()
            .iter()
            .zip(trace.iter())
            .tuple_windows()
            .map(|((t0, v0), (t1, v1))| 0.5 * (t1 - t0) * (v0 + v1))
            .sum()
    }
}

impl FeatureExtractor for Area {
    fn feature(&self) -> Feature {
        Feature::Area
    }

    fn measure(&self, time_base: &TimeBase, trace: Trace<'_>) -> Result<Real, CrossingError> {
        Ok(Self::integrate(time_base, trace))
    }
}
