pub mod tracer;

pub use tracer::{TracerEngine, TracerError, TracerOptions};

/// Scalar type used for every time and amplitude sample.
pub type Real = f64;

/// Index of an acquisition event within an ensemble.
pub type EventIndex = usize;

pub const NANOSECONDS_PER_SECOND: Real = 1e9;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
