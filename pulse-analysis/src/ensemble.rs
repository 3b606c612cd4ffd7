use crate::Real;
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EnsembleError {
    #[error("Ensemble contains no events")]
    Empty,
    #[error("Time base has {0} samples, at least 2 are required")]
    TimeBaseTooShort(usize),
    #[error("Time base is not strictly increasing at sample {0}")]
    TimeBaseNotIncreasing(usize),
    #[error("Trace {event} has {found} samples, time base has {expected}")]
    TraceLengthMismatch {
        event: usize,
        expected: usize,
        found: usize,
    },
}

/// Sample times shared by every trace of an ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBase(Array1<Real>);

impl TimeBase {
    pub fn new(samples: Vec<Real>) -> Result<Self, EnsembleError> {
        if samples.len() < 2 {
            return Err(EnsembleError::TimeBaseTooShort(samples.len()));
        }
        if let Some((index, _)) = samples
            .iter()
            .tuple_windows()
            .find_position(|(earlier, later)| !(earlier < later))
        {
            return Err(EnsembleError::TimeBaseNotIncreasing(index + 1));
        }
        Ok(Self(Array1::from(samples)))
    }

    /// Builds `len` samples spaced `sample_time` apart, starting at `start`.
    pub fn uniform(start: Real, sample_time: Real, len: usize) -> Result<Self, EnsembleError> {
        Self::new(
            (0..len)
                .map(|i| start + i as Real * sample_time)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn view(&self) -> ArrayView1<'_, Real> {
        self.0.view()
    }

    pub fn to_vec(&self) -> Vec<Real> {
        self.0.to_vec()
    }
}

/// A single acquisition event, aligned index-for-index with its time base.
pub type Trace<'a> = ArrayView1<'a, Real>;

/// A batch of traces captured against one time base, stored as an
/// (event × sample) grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEnsemble {
    time_base: TimeBase,
    traces: Array2<Real>,
}

impl TraceEnsemble {
    pub fn new(time_base: TimeBase, traces: Vec<Vec<Real>>) -> Result<Self, EnsembleError> {
        if traces.is_empty() {
            return Err(EnsembleError::Empty);
        }
        let expected = time_base.len();
        if let Some((event, trace)) = traces.iter().find_position(|t| t.len() != expected) {
            return Err(EnsembleError::TraceLengthMismatch {
                event,
                expected,
                found: trace.len(),
            });
        }
        let events = traces.len();
        let flat = traces.into_iter().flatten().collect::<Vec<_>>();
        let traces = Array2::from_shape_vec((events, expected), flat).map_err(|_| {
            EnsembleError::TraceLengthMismatch {
                event: 0,
                expected,
                found: 0,
            }
        })?;
        Ok(Self { time_base, traces })
    }

    pub fn from_array(time_base: TimeBase, traces: Array2<Real>) -> Result<Self, EnsembleError> {
        if traces.nrows() == 0 {
            return Err(EnsembleError::Empty);
        }
        if traces.ncols() != time_base.len() {
            return Err(EnsembleError::TraceLengthMismatch {
                event: 0,
                expected: time_base.len(),
                found: traces.ncols(),
            });
        }
        Ok(Self { time_base, traces })
    }

    pub fn time_base(&self) -> &TimeBase {
        &self.time_base
    }

    pub fn num_events(&self) -> usize {
        self.traces.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.traces.ncols()
    }

    pub fn trace(&self, event: usize) -> Option<Trace<'_>> {
        (event < self.num_events()).then(|| self.traces.row(event))
    }

    pub fn traces(&self) -> impl Iterator<Item = Trace<'_>> {
        self.traces.outer_iter()
    }

    /// Sample-by-sample mean over all events.
    pub fn average_trace(&self) -> Array1<Real> {
        self.traces
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.num_samples()))
    }

    pub fn to_rows(&self) -> Vec<Vec<Real>> {
        self.traces().map(|trace| trace.to_vec()).collect()
    }
}
