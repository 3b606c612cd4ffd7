use crate::{
    crossing::CrossingError, ensemble::EnsembleError, features::Feature, fit::FitError,
    histogram::HistogramError,
};
use scopepulse_common::EventIndex;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("{feature} of event {event}: {source}")]
    Crossing {
        feature: Feature,
        event: EventIndex,
        source: CrossingError,
    },
    #[error("Signal ensemble has {signal} events but reference ensemble has {reference}")]
    EventCountMismatch { signal: usize, reference: usize },
    #[error("Invalid Ensemble: {0}")]
    Ensemble(#[from] EnsembleError),
    #[error("Histogram Error: {0}")]
    Histogram(#[from] HistogramError),
    #[error("Fit Failed: {0}")]
    Fit(#[from] FitError),
}
