//! One pass over an ensemble producing every feature's distribution and fit.
use crate::{
    AnalysisResult, Real,
    ensemble::TraceEnsemble,
    features::{
        Area, CrossingPolicy, FallTime, Feature, FeatureExtractor, FeatureSamples,
        FeatureSummary, Jitter, JitterSummary, Peak, RiseTime,
    },
    fit::{FitError, FitResult, GaussianFitter},
    histogram::{BinPolicy, Histogram, HistogramBuilder, HistogramError},
    polarity::Polarity,
};
use scopepulse_common::EventIndex;
use serde::{Serialize, Serializer};
use std::fmt::Display;
use tracing::{info, instrument, warn};

#[derive(Clone, Copy, Debug, Default)]
pub struct CharacterisationOptions {
    pub crossing_policy: CrossingPolicy,
    pub bin_policy: BinPolicy,
    pub fitter: GaussianFitter,
}

/// Serializes a fallible outcome as either `{"ok": value}` or `{"error": message}`.
fn outcome<T, E, S>(outcome: &Result<T, E>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    E: Display,
    S: Serializer,
{
    #[derive(Serialize)]
    #[serde(rename_all = "kebab-case")]
    enum Outcome<'a, T> {
        Ok(&'a T),
        Error(String),
    }
    match outcome {
        Ok(value) => Outcome::Ok(value),
        Err(error) => Outcome::Error(error.to_string()),
    }
    .serialize(serializer)
}

/// Distribution of one feature over the ensemble.
#[derive(Debug, PartialEq, Serialize)]
pub struct FeatureReport {
    /// In native units (seconds, volts, volt-seconds).
    pub summary: FeatureSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_error: Option<Real>,
    pub skipped: Vec<EventIndex>,
    /// In the display units of the feature's x axis.
    pub histogram: Histogram,
    #[serde(serialize_with = "outcome")]
    pub fit: Result<FitResult, FitError>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct FeatureOutcome {
    pub feature: Feature,
    #[serde(serialize_with = "outcome")]
    pub report: AnalysisResult<FeatureReport>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Characterisation {
    pub polarity: Polarity,
    pub events: usize,
    pub features: Vec<FeatureOutcome>,
}

impl Characterisation {
    pub fn feature(&self, feature: Feature) -> Option<&AnalysisResult<FeatureReport>> {
        self.features
            .iter()
            .find(|outcome| outcome.feature == feature)
            .map(|outcome| &outcome.report)
    }
}

fn report(
    feature: Feature,
    samples: AnalysisResult<FeatureSamples>,
    options: &CharacterisationOptions,
) -> AnalysisResult<FeatureReport> {
    let samples = samples?;
    let summary = samples.summary().ok_or(HistogramError::NoSamples)?;
    let histogram = HistogramBuilder::for_feature(feature)
        .with_policy(options.bin_policy)
        .build_from_samples(&samples)?;
    let fit = options.fitter.fit(&histogram);
    if let Err(e) = &fit {
        warn!(%feature, "Fit failed: {e}");
    }
    let jitter_error = match feature {
        Feature::Jitter => JitterSummary::from_samples(&samples).map(|s| s.jitter_error),
        _ => None,
    };
    Ok(FeatureReport {
        summary,
        jitter_error,
        skipped: samples.skipped().to_vec(),
        histogram,
        fit,
    })
}

/// Measures Area, Rise, Fall and Peak on `ensemble`, and Jitter against
/// `reference` when one is given.
///
/// Polarity is detected once and shared by every extractor. A failure in one
/// feature is recorded in its outcome and does not affect the others.
#[instrument(skip_all, fields(events = ensemble.num_events(), reference = reference.is_some()))]
pub fn characterise(
    ensemble: &TraceEnsemble,
    reference: Option<&TraceEnsemble>,
    options: &CharacterisationOptions,
) -> Characterisation {
    let polarity = Polarity::detect(ensemble);
    let extractors: [Box<dyn FeatureExtractor>; 4] = [
        Box::new(Area),
        Box::new(RiseTime::new(polarity)),
        Box::new(FallTime::new(polarity)),
        Box::new(Peak::new(polarity)),
    ];
    let mut features = extractors
        .iter()
        .map(|extractor| {
            let feature = extractor.feature();
            let samples = extractor.extract(ensemble, options.crossing_policy);
            FeatureOutcome {
                feature,
                report: report(feature, samples, options),
            }
        })
        .collect::<Vec<_>>();

    if let Some(reference) = reference {
        let jitter = Jitter::new(polarity, Polarity::detect(reference));
        let samples = jitter.extract(ensemble, reference, options.crossing_policy);
        features.push(FeatureOutcome {
            feature: Feature::Jitter,
            report: report(Feature::Jitter, samples, options),
        });
    }

    for outcome in &features {
        if let Err(e) = &outcome.report {
            warn!(feature = %outcome.feature, "Feature failed: {e}");
        }
    }
    info!(
        %polarity,
        succeeded = features.iter().filter(|o| o.report.is_ok()).count(),
        total = features.len(),
        "Characterisation complete"
    );
    Characterisation {
        polarity,
        events: ensemble.num_events(),
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AnalysisError,
        crossing::{CrossingError, Direction},
        ensemble::TimeBase,
        features::tests::spike_ensemble,
        synthetic::{EnsembleGenerator, PairedGenerator, PulseShape},
    };
    use rand_distr::Normal;

    fn noisy_generator(arrival: Normal<Real>) -> EnsembleGenerator {
        EnsembleGenerator::new(
            PulseShape::Biexp {
                rise: 1e-9,
                decay: 5e-9,
            },
            TimeBase::uniform(0.0, 0.2e-9, 400).expect("valid time base"),
            Normal::new(-0.1, 0.01).expect("valid distribution"),
            arrival,
            0.001,
        )
        .expect("valid generator")
    }

    #[test]
    fn identical_traces_have_degenerate_histograms() {
        let characterisation = characterise(
            &spike_ensemble(5, 1.0),
            None,
            &CharacterisationOptions::default(),
        );
        assert_eq!(characterisation.polarity, Polarity::Positive);
        assert_eq!(characterisation.events, 5);
        assert_eq!(characterisation.features.len(), 4);
        assert!(characterisation.feature(Feature::Jitter).is_none());
        for outcome in &characterisation.features {
            assert!(matches!(
                outcome.report,
                Err(AnalysisError::Histogram(
                    HistogramError::DegenerateStatistics { .. }
                ))
            ));
        }
    }

    #[test]
    fn noisy_ensemble_is_fully_characterised() {
        let reference = EnsembleGenerator::new(
            PulseShape::Gaussian { sd: 2e-9 },
            TimeBase::uniform(0.0, 0.2e-9, 400).expect("valid time base"),
            Normal::new(0.8, 0.0).expect("valid distribution"),
            Normal::new(20e-9, 3e-9).expect("valid distribution"),
            0.0,
        )
        .expect("valid generator");
        // The signal arrives 15 ns after the reference with 0.5 ns jitter.
        let (signal, reference) = PairedGenerator::new(
            noisy_generator(Normal::new(15e-9, 0.5e-9).expect("valid distribution")),
            reference,
        )
        .generate_seeded(2000, 11)
        .expect("generated");

        let characterisation = characterise(
            &signal,
            Some(&reference),
            &CharacterisationOptions::default(),
        );
        assert_eq!(characterisation.polarity, Polarity::Negative);
        assert_eq!(characterisation.features.len(), 5);
        for outcome in &characterisation.features {
            let report = outcome.report.as_ref().expect("feature measured");
            assert!(report.skipped.is_empty());
            assert_eq!(report.histogram.bin_count(), 80);
            let histogram = &report.histogram;
            assert_eq!(
                histogram.entries() + histogram.underflow() + histogram.overflow(),
                2000
            );
            assert_eq!(report.histogram.title, outcome.feature.title());
        }
        let peak = characterisation
            .feature(Feature::Peak)
            .and_then(|r| r.as_ref().ok())
            .expect("peak measured");
        let fit = peak.fit.as_ref().expect("peak distribution fitted");
        assert!((fit.mean.value - peak.summary.mean).abs() < 0.1 * peak.summary.standard_error);
        let jitter = characterisation
            .feature(Feature::Jitter)
            .and_then(|r| r.as_ref().ok())
            .expect("jitter measured");
        assert!(jitter.jitter_error.is_some());
        assert!((jitter.summary.standard_error - 0.5e-9).abs() / 0.5e-9 < 0.1);
    }

    #[test]
    fn abort_policy_fails_only_crossing_features() {
        let time_base = TimeBase::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).expect("valid time base");
        let ensemble = TraceEnsemble::new(
            time_base,
            vec![
                vec![0.0, 1.0, 5.0, 1.0, 0.0],
                vec![1.0, 1.0, 1.0, 1.0, 1.0],
                vec![0.0, 2.0, 4.0, 1.0, 0.0],
            ],
        )
        .expect("valid ensemble");
        let options = CharacterisationOptions {
            crossing_policy: CrossingPolicy::Abort,
            ..Default::default()
        };
        let characterisation = characterise(&ensemble, None, &options);
        assert!(matches!(
            characterisation.feature(Feature::Rise),
            Some(Err(AnalysisError::Crossing {
                feature: Feature::Rise,
                event: 1,
                source: CrossingError::NotFound {
                    direction: Direction::Rising,
                    ..
                }
            }))
        ));
        assert!(matches!(
            characterisation.feature(Feature::Fall),
            Some(Err(AnalysisError::Crossing { event: 1, .. }))
        ));
        let peak = characterisation
            .feature(Feature::Peak)
            .and_then(|r| r.as_ref().ok())
            .expect("peak needs no crossing");
        assert_eq!(peak.summary.count, 3);
        // Three populated bins cannot constrain a gaussian.
        assert!(matches!(
            peak.fit,
            Err(FitError::InsufficientBins { populated: 3, .. })
        ));
    }

    #[test]
    fn skip_policy_records_skipped_events() {
        let time_base = TimeBase::new(vec![0.0, 1.0, 2.0, 3.0, 4.0]).expect("valid time base");
        let ensemble = TraceEnsemble::new(
            time_base,
            vec![
                vec![0.0, 1.0, 5.0, 1.0, 0.0],
                vec![1.0, 1.0, 1.0, 1.0, 1.0],
                vec![0.0, 2.0, 4.0, 1.0, 0.0],
            ],
        )
        .expect("valid ensemble");
        let characterisation =
            characterise(&ensemble, None, &CharacterisationOptions::default());
        let rise = characterisation
            .feature(Feature::Rise)
            .and_then(|r| r.as_ref().ok())
            .expect("rise measured on the remaining events");
        assert_eq!(rise.skipped, vec![1]);
        assert_eq!(rise.summary.count, 2);
    }

    #[test]
    fn serializes_failures_as_messages() {
        let characterisation = characterise(
            &spike_ensemble(3, -1.0),
            None,
            &CharacterisationOptions::default(),
        );
        let json = serde_json::to_value(&characterisation).expect("serializable");
        assert_eq!(json["polarity"], "negative");
        assert!(json["features"][0]["report"]["error"].is_string());
    }
}
