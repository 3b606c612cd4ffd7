use super::{Feature, FeatureExtractor};
use crate::{
    Real,
    crossing::CrossingError,
    ensemble::{TimeBase, Trace},
    polarity::Polarity,
};

/// Extremum amplitude of each trace: the maximum for positive pulses, the minimum for negative.
#[derive(Clone, Copy, Debug)]
pub struct Peak {
    polarity: Polarity,
}

impl Peak {
    pub fn new(polarity: Polarity) -> Self {
        Self { polarity }
    }
}

impl FeatureExtractor for Peak {
    fn feature(&self) -> Feature {
        Feature::Peak
    }

    fn measure(&self, _: &TimeBase, trace: Trace<'_>) -> Result<Real, CrossingError> {
        self.polarity
            .extremum(trace)
            .map(|(_, value)| value)
            .ok_or(CrossingError::EmptyTrace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ensemble::TraceEnsemble,
        features::{CrossingPolicy, tests::spike_ensemble},
    };
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn identical_traces_have_no_spread() {
        let ensemble = spike_ensemble(10, 1.0);
        let summary = Peak::new(Polarity::detect(&ensemble))
            .extract(&ensemble, CrossingPolicy::Abort)
            .expect("peak never fails")
            .summary()
            .expect("non-empty");
        assert_eq!(summary.mean, 5.0);
        assert_eq!(summary.standard_error, 0.0);
        assert_eq!(summary.count, 10);
    }

    #[test]
    fn negative_peak_is_the_minimum() {
        let ensemble = spike_ensemble(3, -1.0);
        let summary = Peak::new(Polarity::Negative)
            .extract(&ensemble, CrossingPolicy::Abort)
            .expect("peak never fails")
            .summary()
            .expect("non-empty");
        assert_eq!(summary.mean, -5.0);
    }

    #[test]
    fn varying_heights() {
        let time_base = TimeBase::uniform(0.0, 1.0, 3).expect("valid time base");
        let ensemble = TraceEnsemble::new(
            time_base,
            vec![vec![0.0, 4.0, 0.0], vec![0.0, 6.0, 1.0], vec![0.0, 5.0, 0.0]],
        )
        .expect("valid ensemble");
        let samples = Peak::new(Polarity::Positive)
            .extract(&ensemble, CrossingPolicy::Abort)
            .expect("peak never fails");
        assert_eq!(samples.values().collect::<Vec<_>>(), vec![4.0, 6.0, 5.0]);
        let summary = samples.summary().expect("non-empty");
        assert_approx_eq!(summary.mean, 5.0);
        assert_approx_eq!(summary.standard_error, (2.0_f64 / 3.0).sqrt());
    }
}
