use crate::{Real, ensemble::TimeBase};
use itertools::Itertools;
use ndarray::ArrayView1;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
pub enum Direction {
    #[strum(to_string = "rising")]
    Rising,
    #[strum(to_string = "falling")]
    Falling,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Rising => Direction::Falling,
            Direction::Falling => Direction::Rising,
        }
    }

    /// True if the step from `before` to `after` crosses `threshold` in this direction.
    fn brackets(self, before: Real, after: Real, threshold: Real) -> bool {
        match self {
            Direction::Rising => before < threshold && threshold <= after,
            Direction::Falling => before > threshold && threshold >= after,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CrossingError {
    #[error("No {direction} crossing of {threshold} found after sample {start}")]
    NotFound {
        threshold: Real,
        direction: Direction,
        start: usize,
    },
    #[error("Samples bracketing the crossing at {index} have equal amplitude")]
    FlatSegment { index: usize },
    #[error("Trace has no samples")]
    EmptyTrace,
}

/// Time at which `trace` first crosses `threshold` in `direction`, linearly
/// interpolated between the bracketing samples.
pub fn interpolate(
    time_base: &TimeBase,
    trace: ArrayView1<'_, Real>,
    threshold: Real,
    direction: Direction,
) -> Result<Real, CrossingError> {
    interpolate_from(time_base, trace, threshold, direction, 0)
}

/// As [interpolate], but only considers sample pairs starting at or after `start`.
pub fn interpolate_from(
    time_base: &TimeBase,
    trace: ArrayView1<'_, Real>,
    threshold: Real,
    direction: Direction,
    start: usize,
) -> Result<Real, CrossingError> {
    let end = trace.len().saturating_sub(1);
    interpolate_between(time_base, trace, threshold, direction, start, end)
}

/// As [interpolate], but only considers sample pairs lying within `start..=end`.
pub fn interpolate_between(
    time_base: &TimeBase,
    trace: ArrayView1<'_, Real>,
    threshold: Real,
    direction: Direction,
    start: usize,
    end: usize,
) -> Result<Real, CrossingError> {
    let (index, ((t0, v0), (t1, v1))) = time_base
        .view()
        .iter()
        .copied()
        .zip(trace.iter().copied())
        .take(end.saturating_add(1))
        .skip(start)
        .tuple_windows()
        .enumerate()
        .find(|(_, ((_, v0), (_, v1)))| direction.brackets(*v0, *v1, threshold))
        .ok_or(CrossingError::NotFound {
            threshold,
            direction,
            start,
        })?;

    if v1 == v0 {
        return Err(CrossingError::FlatSegment {
            index: start + index,
        });
    }
    Ok(t0 + (t1 - t0) * (threshold - v0) / (v1 - v0))
}
