use crate::{
    Real,
    features::{Feature, FeatureSamples},
};
use itertools::Itertools;
use ndarray_stats::histogram::{Bins, Edges};
use noisy_float::types::N64;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, PartialEq)]
pub enum HistogramError {
    #[error("No samples to histogram")]
    NoSamples,
    #[error("Degenerate statistics: mean {mean}, standard error {standard_error}")]
    DegenerateStatistics { mean: Real, standard_error: Real },
    #[error("Invalid bin policy {0:?}")]
    InvalidPolicy(BinPolicy),
    #[error("{edges} bin edges cannot bound {counts} bins")]
    MismatchedBins { edges: usize, counts: usize },
    #[error("Bin edges are not strictly increasing")]
    UnorderedEdges,
}

/// How the bin grid is derived from a feature's mean and standard error.
///
/// The range is always `mean ± half_range * standard_error`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "policy")]
pub enum BinPolicy {
    /// Bin width is `standard_error / bins_per_error`.
    NoiseScaled {
        half_range: Real,
        bins_per_error: Real,
    },
    /// A fixed number of bins spread over the range.
    Fixed { half_range: Real, bins: usize },
}

impl Default for BinPolicy {
    fn default() -> Self {
        BinPolicy::NoiseScaled {
            half_range: 8.0,
            bins_per_error: 5.0,
        }
    }
}

impl BinPolicy {
    pub fn fixed(bins: usize) -> Self {
        BinPolicy::Fixed {
            half_range: 8.0,
            bins,
        }
    }

    fn half_range(&self) -> Real {
        match *self {
            BinPolicy::NoiseScaled { half_range, .. } | BinPolicy::Fixed { half_range, .. } => {
                half_range
            }
        }
    }

    pub fn bin_count(&self) -> Result<usize, HistogramError> {
        let half_range = self.half_range();
        if !(half_range.is_finite() && half_range > 0.0) {
            return Err(HistogramError::InvalidPolicy(*self));
        }
        let bins = match *self {
            BinPolicy::NoiseScaled { bins_per_error, .. } => {
                if !(bins_per_error.is_finite() && bins_per_error > 0.0) {
                    return Err(HistogramError::InvalidPolicy(*self));
                }
                (2.0 * half_range * bins_per_error).round() as usize
            }
            BinPolicy::Fixed { bins, .. } => bins,
        };
        if bins == 0 {
            return Err(HistogramError::InvalidPolicy(*self));
        }
        Ok(bins)
    }
}

/// Immutable binned distribution with its display metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    pub title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    bin_edges: Vec<Real>,
    bin_counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl Histogram {
    /// Wraps already binned data, e.g. counts produced elsewhere in the pipeline.
    pub fn new(
        title: &str,
        x_axis_label: &str,
        y_axis_label: &str,
        bin_edges: Vec<Real>,
        bin_counts: Vec<u64>,
    ) -> Result<Self, HistogramError> {
        if bin_counts.is_empty() || bin_edges.len() != bin_counts.len() + 1 {
            return Err(HistogramError::MismatchedBins {
                edges: bin_edges.len(),
                counts: bin_counts.len(),
            });
        }
        if bin_edges
            .iter()
            .tuple_windows()
            .any(|(low, high)| !(low < high))
        {
            return Err(HistogramError::UnorderedEdges);
        }
        Ok(Self {
            title: title.to_owned(),
            x_axis_label: x_axis_label.to_owned(),
            y_axis_label: y_axis_label.to_owned(),
            bin_edges,
            bin_counts,
            underflow: 0,
            overflow: 0,
        })
    }

    pub fn bin_edges(&self) -> &[Real] {
        &self.bin_edges
    }

    pub fn bin_counts(&self) -> &[u64] {
        &self.bin_counts
    }

    pub fn bin_count(&self) -> usize {
        self.bin_counts.len()
    }

    pub fn bin_width(&self) -> Real {
        match (self.bin_edges.first(), self.bin_edges.last()) {
            (Some(first), Some(last)) if !self.bin_counts.is_empty() => {
                (last - first) / self.bin_counts.len() as Real
            }
            _ => 0.0,
        }
    }

    pub fn bin_centers(&self) -> impl Iterator<Item = Real> + '_ {
        self.bin_edges
            .iter()
            .tuple_windows()
            .map(|(low, high)| 0.5 * (low + high))
    }

    /// Values below the first edge.
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Values at or above the last edge, and non-finite values.
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Number of values inside the binned range.
    pub fn entries(&self) -> u64 {
        self.bin_counts.iter().sum()
    }
}

/// Builds histograms whose range and resolution follow the measurement's own spread.
#[derive(Clone, Debug)]
pub struct HistogramBuilder {
    policy: BinPolicy,
    scale: Real,
    title: String,
    x_axis_label: String,
    y_axis_label: String,
}

impl HistogramBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            policy: BinPolicy::default(),
            scale: 1.0,
            title: title.to_owned(),
            x_axis_label: String::default(),
            y_axis_label: String::default(),
        }
    }

    /// Title, axis labels and display scale of `feature`.
    pub fn for_feature(feature: Feature) -> Self {
        Self::new(feature.title())
            .with_axis_labels(feature.x_axis_label(), feature.y_axis_label())
            .with_scale(feature.display_scale())
    }

    pub fn with_policy(self, policy: BinPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Multiplies values, mean and error before binning, converting to display units.
    pub fn with_scale(self, scale: Real) -> Self {
        Self { scale, ..self }
    }

    pub fn with_axis_labels(self, x_axis_label: &str, y_axis_label: &str) -> Self {
        Self {
            x_axis_label: x_axis_label.to_owned(),
            y_axis_label: y_axis_label.to_owned(),
            ..self
        }
    }

    pub fn build_from_samples(
        &self,
        samples: &FeatureSamples,
    ) -> Result<Histogram, HistogramError> {
        let summary = samples.summary().ok_or(HistogramError::NoSamples)?;
        self.build(samples.values(), summary.mean, summary.standard_error)
    }

    /// Bins `values` over `mean ± half_range * standard_error` (all in native units).
    #[instrument(
        skip_all,
        fields(title = %self.title, mean = mean, standard_error = standard_error)
    )]
    pub fn build<I: IntoIterator<Item = Real>>(
        &self,
        values: I,
        mean: Real,
        standard_error: Real,
    ) -> Result<Histogram, HistogramError> {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return Err(HistogramError::NoSamples);
        }
        let mean = mean * self.scale;
        let standard_error = standard_error * self.scale.abs();
        if !(mean.is_finite() && standard_error.is_finite() && standard_error > 0.0) {
            return Err(HistogramError::DegenerateStatistics {
                mean,
                standard_error,
            });
        }

        let bin_count = self.policy.bin_count()?;
        let half_width = self.policy.half_range() * standard_error;
        let degenerate = || HistogramError::DegenerateStatistics {
            mean,
            standard_error,
        };
        let bin_edges = (0..=bin_count)
            .map(|i| mean + (2.0 * i as Real / bin_count as Real - 1.0) * half_width)
            .collect::<Vec<_>>();
        let edges = bin_edges
            .iter()
            .map(|&edge| Some(edge).filter(|edge| edge.is_finite()).and_then(N64::try_new))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(degenerate)?;
        let low = edges[0];
        let bins = Bins::new(Edges::from(edges));
        // Edges that collapse onto each other at the limit of float resolution are merged.
        if bins.len() != bin_count {
            return Err(degenerate());
        }

        let mut bin_counts = vec![0u64; bin_count];
        let mut underflow = 0;
        let mut overflow = 0;
        for value in values.map(|v| N64::try_new(v * self.scale)) {
            match value.map(|value| (value, bins.index_of(&value))) {
                Some((_, Some(index))) => bin_counts[index] += 1,
                Some((value, None)) if value < low => underflow += 1,
                _ => overflow += 1,
            }
        }
        debug!(bins = bin_count, underflow, overflow, "Histogram built");

        Ok(Histogram {
            title: self.title.clone(),
            x_axis_label: self.x_axis_label.clone(),
            y_axis_label: self.y_axis_label.clone(),
            bin_edges,
            bin_counts,
            underflow,
            overflow,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSample;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn default_policy_gives_eighty_bins() {
        let histogram = HistogramBuilder::new("test")
            .build([1.0, 2.0, 3.0], 2.0, 0.5)
            .expect("valid statistics");
        assert_eq!(histogram.bin_count(), 80);
        assert_eq!(histogram.bin_edges().len(), histogram.bin_counts().len() + 1);
        assert_approx_eq!(histogram.bin_width(), 0.1);
        assert_approx_eq!(histogram.bin_edges()[0], -2.0);
        assert_approx_eq!(histogram.bin_edges()[80], 6.0);
    }

    #[test]
    fn range_is_symmetric_about_mean() {
        for (mean, error) in [(0.0, 1.0), (-3.7, 0.013), (1e-8, 2.5e-10), (42.0, 17.0)] {
            let histogram = HistogramBuilder::new("test")
                .build([mean], mean, error)
                .expect("valid statistics");
            let edges = histogram.bin_edges();
            let (first, last) = (edges[0], edges[edges.len() - 1]);
            assert_approx_eq!(mean - first, last - mean, 1e-9 * error);
            assert_approx_eq!(last - first, 16.0 * error, 1e-9 * error);
        }
    }

    #[test]
    fn values_outside_range_are_counted_separately() {
        let histogram = HistogramBuilder::new("test")
            .with_policy(BinPolicy::fixed(4))
            .build([-100.0, -8.0, -0.5, 0.0, 4.5, 8.0, 100.0, Real::NAN], 0.0, 1.0)
            .expect("valid statistics");
        assert_eq!(histogram.bin_counts(), &[1, 1, 1, 1]);
        assert_eq!(histogram.underflow(), 1);
        assert_eq!(histogram.overflow(), 3);
        assert_eq!(histogram.entries() + histogram.underflow() + histogram.overflow(), 8);
    }

    #[test]
    fn values_on_edges_go_to_upper_bin() {
        let histogram = HistogramBuilder::new("test")
            .with_policy(BinPolicy::fixed(16))
            .build([-7.0, -1.0, 0.0, 1.0, 7.0], 0.0, 1.0)
            .expect("valid statistics");
        let counts = histogram.bin_counts();
        assert_eq!(counts[0], 0);
        assert_eq!(counts[1], 1);
        assert_eq!(counts[7], 1);
        assert_eq!(counts[8], 1);
        assert_eq!(counts[9], 1);
        assert_eq!(counts[15], 1);
        assert_eq!(histogram.entries(), 5);
    }

    #[test]
    fn edges_below_float_resolution_are_degenerate() {
        assert!(matches!(
            HistogramBuilder::new("test").build([1e9, 1e9], 1e9, 1e-12),
            Err(HistogramError::DegenerateStatistics { .. })
        ));
        assert!(matches!(
            HistogramBuilder::new("test").build([1e308], 1e308, 1e308),
            Err(HistogramError::DegenerateStatistics { .. })
        ));
    }

    #[test]
    fn zero_error_is_degenerate() {
        assert_eq!(
            HistogramBuilder::new("test").build([1.0, 1.0], 1.0, 0.0),
            Err(HistogramError::DegenerateStatistics {
                mean: 1.0,
                standard_error: 0.0
            })
        );
    }

    #[test]
    fn empty_samples_are_rejected() {
        let samples = FeatureSamples::default();
        assert_eq!(
            HistogramBuilder::new("test").build_from_samples(&samples),
            Err(HistogramError::NoSamples)
        );
    }

    #[test]
    fn single_event_is_degenerate() {
        let samples = [FeatureSample {
            event: 0,
            value: 3.0,
        }]
        .into_iter()
        .collect::<FeatureSamples>();
        assert!(matches!(
            HistogramBuilder::new("test").build_from_samples(&samples),
            Err(HistogramError::DegenerateStatistics { .. })
        ));
    }

    #[test]
    fn prebinned_histogram() {
        let histogram = Histogram::new("pre", "x", "y", vec![0.0, 1.0, 3.0], vec![4, 2])
            .expect("consistent bins");
        assert_eq!(histogram.bin_centers().collect::<Vec<_>>(), vec![0.5, 2.0]);
        assert_eq!(histogram.entries(), 6);
        assert_eq!(
            Histogram::new("pre", "x", "y", vec![0.0, 1.0], vec![4, 2]),
            Err(HistogramError::MismatchedBins {
                edges: 2,
                counts: 2
            })
        );
        assert_eq!(
            Histogram::new("pre", "x", "y", vec![0.0, 1.0, 1.0], vec![4, 2]),
            Err(HistogramError::UnorderedEdges)
        );
    }

    #[test]
    fn invalid_policies() {
        for policy in [
            BinPolicy::fixed(0),
            BinPolicy::Fixed {
                half_range: -1.0,
                bins: 10,
            },
            BinPolicy::NoiseScaled {
                half_range: 8.0,
                bins_per_error: 0.0,
            },
        ] {
            assert_eq!(
                HistogramBuilder::new("test")
                    .with_policy(policy)
                    .build([0.0], 0.0, 1.0),
                Err(HistogramError::InvalidPolicy(policy))
            );
        }
    }

    #[test]
    fn feature_metadata_and_display_scale() {
        let samples = [1e-9, 2e-9, 3e-9]
            .into_iter()
            .enumerate()
            .map(|(event, value)| FeatureSample { event, value })
            .collect::<FeatureSamples>();
        let histogram = HistogramBuilder::for_feature(Feature::Rise)
            .build_from_samples(&samples)
            .expect("valid statistics");
        assert_eq!(histogram.title, "Rise time");
        assert_eq!(histogram.x_axis_label, "Rise time (ns)");
        assert_eq!(histogram.y_axis_label, "Events");
        let centre = 0.5 * (histogram.bin_edges()[0] + histogram.bin_edges()[80]);
        assert_approx_eq!(centre, 2.0, 1e-9);
        assert_eq!(histogram.entries(), 3);
    }
}
