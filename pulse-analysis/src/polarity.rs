use crate::{Real, crossing::Direction, ensemble::TraceEnsemble};
use ndarray::ArrayView1;
use serde::Serialize;
use tracing::debug;

/// Whether the pulses of an ensemble deviate upwards or downwards from baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    #[strum(to_string = "positive")]
    Positive,
    #[strum(to_string = "negative")]
    Negative,
}

impl Polarity {
    /// Decides the polarity of an ensemble from its average waveform.
    ///
    /// The pulse is positive when the largest excursion above zero is at least
    /// as large as the largest excursion below it. A flat waveform is
    /// therefore reported as positive, and the extractors will fail to find
    /// crossings on it.
    pub fn detect(ensemble: &TraceEnsemble) -> Self {
        let average = ensemble.average_trace();
        let polarity = Self::of_trace(average.view());
        debug!(
            events = ensemble.num_events(),
            %polarity,
            "Detected ensemble polarity"
        );
        polarity
    }

    pub fn of_trace(trace: ArrayView1<'_, Real>) -> Self {
        let (min, max) = trace
            .iter()
            .fold((Real::INFINITY, Real::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            });
        if max.abs() >= min.abs() {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }

    /// Direction of the edge leading into the extremum.
    pub fn leading_edge(self) -> Direction {
        match self {
            Polarity::Positive => Direction::Rising,
            Polarity::Negative => Direction::Falling,
        }
    }

    /// Direction of the edge returning to baseline after the extremum.
    pub fn trailing_edge(self) -> Direction {
        self.leading_edge().reversed()
    }

    /// Index and value of the first extremum (maximum if positive, minimum if negative).
    pub fn extremum(self, trace: ArrayView1<'_, Real>) -> Option<(usize, Real)> {
        let mut samples = trace.iter().copied().enumerate();
        let first = samples.next()?;
        Some(samples.fold(first, |best, (index, value)| {
            let better = match self {
                Polarity::Positive => value > best.1,
                Polarity::Negative => value < best.1,
            };
            if better { (index, value) } else { best }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::TimeBase;
    use ndarray::array;

    fn ensemble(traces: Vec<Vec<Real>>) -> TraceEnsemble {
        let time_base = TimeBase::uniform(0.0, 1.0, traces[0].len()).expect("valid time base");
        TraceEnsemble::new(time_base, traces).expect("valid ensemble")
    }

    #[test]
    fn positive_pulses() {
        let ensemble = ensemble(vec![vec![0.0, 0.1, 5.0, -0.2], vec![0.0, -0.1, 4.0, 0.0]]);
        assert_eq!(Polarity::detect(&ensemble), Polarity::Positive);
    }

    #[test]
    fn negative_pulses() {
        let ensemble = ensemble(vec![vec![0.1, -3.0, 0.5, 0.0], vec![0.0, -4.0, 0.2, 0.0]]);
        assert_eq!(Polarity::detect(&ensemble), Polarity::Negative);
    }

    #[test]
    fn detection_is_stable() {
        let ensemble = ensemble(vec![vec![0.0, -1.0, -2.0, 0.5], vec![0.0, -2.0, -1.0, 0.5]]);
        let first = Polarity::detect(&ensemble);
        assert!((0..10).all(|_| Polarity::detect(&ensemble) == first));
    }

    #[test]
    fn flat_trace_defaults_to_positive() {
        let ensemble = ensemble(vec![vec![0.0; 5]]);
        assert_eq!(Polarity::detect(&ensemble), Polarity::Positive);
    }

    #[test]
    fn extremum_takes_first_occurrence() {
        let trace = array![0.0, 3.0, 1.0, 3.0, -4.0];
        assert_eq!(Polarity::Positive.extremum(trace.view()), Some((1, 3.0)));
        assert_eq!(Polarity::Negative.extremum(trace.view()), Some((4, -4.0)));
    }

    #[test]
    fn edge_directions() {
        assert_eq!(Polarity::Positive.leading_edge(), Direction::Rising);
        assert_eq!(Polarity::Positive.trailing_edge(), Direction::Falling);
        assert_eq!(Polarity::Negative.leading_edge(), Direction::Falling);
        assert_eq!(Polarity::Negative.trailing_edge(), Direction::Rising);
    }
}
