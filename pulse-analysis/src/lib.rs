//! Statistical characterisation of oscilloscope pulse ensembles.
//!
//! An ensemble is a batch of traces sharing one time base. Its polarity is
//! detected once, per-event features (area, rise and fall time, peak height,
//! and arrival separation against a reference channel) are extracted,
//! histogrammed over a noise-scaled range, and fitted with a Gaussian.
pub mod characterise;
pub mod crossing;
pub mod ensemble;
mod error;
pub mod features;
pub mod fit;
pub mod histogram;
pub mod polarity;
pub mod synthetic;

pub use characterise::{Characterisation, CharacterisationOptions, characterise};
pub use ensemble::{TimeBase, Trace, TraceEnsemble};
pub use error::{AnalysisError, AnalysisResult};
pub use features::{CrossingPolicy, Feature};
pub use fit::{FitResult, GaussianFitter};
pub use histogram::{BinPolicy, Histogram, HistogramBuilder};
pub use polarity::Polarity;
pub use scopepulse_common::Real;
