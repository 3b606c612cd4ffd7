use crate::{Real, histogram::Histogram};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Fewer populated bins than this leaves no degrees of freedom for three parameters.
pub const MIN_POPULATED_BINS: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("Only {populated} populated bins, at least {required} required")]
    InsufficientBins { populated: usize, required: usize },
    #[error("Curvature matrix is singular")]
    Singular,
    #[error("Fit did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },
    #[error("Fit produced non-finite parameters")]
    NonFinite,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FitParameter {
    pub value: Real,
    pub error: Real,
}

/// Parameters of `amplitude * exp(-((x - mean) / sigma)^2 / 2)` fitted to one histogram.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FitResult {
    pub amplitude: FitParameter,
    pub mean: FitParameter,
    pub sigma: FitParameter,
    pub chi_squared: Real,
    pub degrees_of_freedom: usize,
    pub iterations: usize,
}

impl FitResult {
    pub fn reduced_chi_squared(&self) -> Real {
        self.chi_squared / self.degrees_of_freedom as Real
    }

    pub fn value_at(&self, x: Real) -> Real {
        Gaussian::from([self.amplitude.value, self.mean.value, self.sigma.value]).value(x)
    }
}

#[derive(Clone, Copy, Debug)]
struct Gaussian {
    amplitude: Real,
    mean: Real,
    sigma: Real,
}

impl From<[Real; 3]> for Gaussian {
    fn from([amplitude, mean, sigma]: [Real; 3]) -> Self {
        Self {
            amplitude,
            mean,
            sigma,
        }
    }
}

impl Gaussian {
    fn parameters(&self) -> [Real; 3] {
        [self.amplitude, self.mean, self.sigma]
    }

    fn value(&self, x: Real) -> Real {
        let z = (x - self.mean) / self.sigma;
        self.amplitude * (-0.5 * z * z).exp()
    }

    /// Partial derivatives with respect to amplitude, mean and sigma.
    fn gradient(&self, x: Real) -> [Real; 3] {
        let z = (x - self.mean) / self.sigma;
        let e = (-0.5 * z * z).exp();
        [
            e,
            self.amplitude * e * z / self.sigma,
            self.amplitude * e * z * z / self.sigma,
        ]
    }
}

/// A populated bin: centre, count and least-squares weight `1 / count`.
#[derive(Clone, Copy, Debug)]
struct Point {
    x: Real,
    y: Real,
    weight: Real,
}

fn chi_squared(points: &[Point], model: &Gaussian) -> Real {
    points
        .iter()
        .map(|p| p.weight * (p.y - model.value(p.x)).powi(2))
        .sum()
}

/// Curvature matrix `JᵀWJ` and gradient vector `JᵀW(y - f)`.
fn curvature(points: &[Point], model: &Gaussian) -> ([[Real; 3]; 3], [Real; 3]) {
    let mut alpha = [[0.0; 3]; 3];
    let mut beta = [0.0; 3];
    for p in points {
        let j = model.gradient(p.x);
        let residual = p.y - model.value(p.x);
        for a in 0..3 {
            for b in 0..3 {
                alpha[a][b] += p.weight * j[a] * j[b];
            }
            beta[a] += p.weight * j[a] * residual;
        }
    }
    (alpha, beta)
}

fn invert_3x3(a: &[[Real; 3]; 3]) -> Option<[[Real; 3]; 3]> {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [
            inv * (a[1][1] * a[2][2] - a[1][2] * a[2][1]),
            inv * (a[0][2] * a[2][1] - a[0][1] * a[2][2]),
            inv * (a[0][1] * a[1][2] - a[0][2] * a[1][1]),
        ],
        [
            inv * (a[1][2] * a[2][0] - a[1][0] * a[2][2]),
            inv * (a[0][0] * a[2][2] - a[0][2] * a[2][0]),
            inv * (a[0][2] * a[1][0] - a[0][0] * a[1][2]),
        ],
        [
            inv * (a[1][0] * a[2][1] - a[1][1] * a[2][0]),
            inv * (a[0][1] * a[2][0] - a[0][0] * a[2][1]),
            inv * (a[0][0] * a[1][1] - a[0][1] * a[1][0]),
        ],
    ])
}

fn multiply(m: &[[Real; 3]; 3], v: &[Real; 3]) -> [Real; 3] {
    [0, 1, 2].map(|row| m[row][0] * v[0] + m[row][1] * v[1] + m[row][2] * v[2])
}

/// Levenberg–Marquardt least-squares fit of a single Gaussian to histogram counts.
///
/// Only populated bins take part, each weighted by the inverse of its count
/// (bin error `sqrt(n)`). Starting values are the tallest bin and the
/// count-weighted mean and standard deviation of the bin centres.
#[derive(Clone, Copy, Debug)]
pub struct GaussianFitter {
    max_iterations: usize,
    tolerance: Real,
}

impl Default for GaussianFitter {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

impl GaussianFitter {
    const MAX_DAMPING: Real = 1e12;

    pub fn new(max_iterations: usize, tolerance: Real) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    fn initial_estimate(histogram: &Histogram) -> Gaussian {
        let (total, first_moment, peak) = histogram
            .bin_centers()
            .zip(histogram.bin_counts())
            .fold((0.0, 0.0, 0u64), |(total, moment, peak), (x, &n)| {
                (total + n as Real, moment + n as Real * x, peak.max(n))
            });
        let mean = first_moment / total;
        let variance = histogram
            .bin_centers()
            .zip(histogram.bin_counts())
            .map(|(x, &n)| n as Real * (x - mean).powi(2))
            .sum::<Real>()
            / total;
        let sigma = if variance > 0.0 {
            variance.sqrt()
        } else {
            histogram.bin_width()
        };
        Gaussian {
            amplitude: peak as Real,
            mean,
            sigma,
        }
    }

    #[instrument(skip_all, fields(title = %histogram.title))]
    pub fn fit(&self, histogram: &Histogram) -> Result<FitResult, FitError> {
        let points = histogram
            .bin_centers()
            .zip(histogram.bin_counts())
            .filter(|&(_, &n)| n > 0)
            .map(|(x, &n)| Point {
                x,
                y: n as Real,
                weight: 1.0 / n as Real,
            })
            .collect::<Vec<_>>();
        if points.len() < MIN_POPULATED_BINS {
            return Err(FitError::InsufficientBins {
                populated: points.len(),
                required: MIN_POPULATED_BINS,
            });
        }

        let mut model = Self::initial_estimate(histogram);
        let mut chi2 = chi_squared(&points, &model);
        if !chi2.is_finite() {
            return Err(FitError::NonFinite);
        }
        let mut lambda = 1e-3;
        let mut accepted_steps = 0;
        let mut converged_at = None;

        for iteration in 1..=self.max_iterations {
            let (alpha, beta) = curvature(&points, &model);
            let mut damped = alpha;
            for (k, row) in damped.iter_mut().enumerate() {
                row[k] *= 1.0 + lambda;
            }
            let step = multiply(&invert_3x3(&damped).ok_or(FitError::Singular)?, &beta);
            let parameters = model.parameters();
            let trial = Gaussian::from([0, 1, 2].map(|k| parameters[k] + step[k]));
            let trial_chi2 = chi_squared(&points, &trial);

            if trial_chi2.is_finite() && trial_chi2 <= chi2 {
                let improvement = chi2 - trial_chi2;
                model = trial;
                chi2 = trial_chi2;
                lambda *= 0.1;
                accepted_steps += 1;
                if improvement <= self.tolerance * chi2 {
                    converged_at = Some(iteration);
                    break;
                }
            } else {
                lambda *= 10.0;
                if lambda > Self::MAX_DAMPING {
                    // No step reduces chi-squared any further.
                    if accepted_steps > 0 {
                        converged_at = Some(iteration);
                    }
                    break;
                }
            }
        }
        let iterations = converged_at.ok_or(FitError::DidNotConverge {
            iterations: self.max_iterations,
        })?;

        let (alpha, _) = curvature(&points, &model);
        let covariance = invert_3x3(&alpha).ok_or(FitError::Singular)?;
        let [amplitude, mean, sigma] = model.parameters();
        let errors = [0, 1, 2].map(|k| covariance[k][k].sqrt());
        if !([amplitude, mean, sigma, chi2].iter().all(|v| v.is_finite())
            && errors.iter().all(|e| e.is_finite())
            && sigma != 0.0)
        {
            return Err(FitError::NonFinite);
        }

        let result = FitResult {
            amplitude: FitParameter {
                value: amplitude,
                error: errors[0],
            },
            mean: FitParameter {
                value: mean,
                error: errors[1],
            },
            sigma: FitParameter {
                value: sigma.abs(),
                error: errors[2],
            },
            chi_squared: chi2,
            degrees_of_freedom: points.len() - 3,
            iterations,
        };
        debug!(
            mean = result.mean.value,
            sigma = result.sigma.value,
            chi_squared = result.chi_squared,
            iterations,
            "Gaussian fitted"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features::FeatureSummary, histogram::HistogramBuilder};
    use assert_approx_eq::assert_approx_eq;
    use rand::{SeedableRng, rngs::StdRng};
    use rand_distr::{Distribution, Normal};

    fn gaussian_histogram(amplitude: Real, mean: Real, sigma: Real) -> Histogram {
        let edges = (0..=60).map(|i| -2.0 + 0.1 * i as Real).collect::<Vec<_>>();
        let counts = edges
            .windows(2)
            .map(|w| {
                let x = 0.5 * (w[0] + w[1]);
                (amplitude * (-0.5 * ((x - mean) / sigma).powi(2)).exp()).round() as u64
            })
            .collect();
        Histogram::new("gaussian", "x", "Events", edges, counts).expect("consistent bins")
    }

    #[test]
    fn recovers_noiseless_gaussian() {
        let histogram = gaussian_histogram(1000.0, 1.0, 0.5);
        let result = GaussianFitter::default()
            .fit(&histogram)
            .expect("fit converges");
        assert_approx_eq!(result.mean.value, 1.0, 1e-3);
        assert_approx_eq!(result.sigma.value, 0.5, 5e-3);
        assert_approx_eq!(result.amplitude.value, 1000.0, 5.0);
        assert!(result.mean.error > 0.0);
        assert!(result.sigma.error > 0.0);
        assert!(result.amplitude.error > 0.0);
        assert_approx_eq!(result.value_at(result.mean.value), result.amplitude.value);
    }

    #[test]
    fn recovers_sampled_distribution() {
        let (mu, sigma) = (2.5, 0.4);
        let normal = Normal::new(mu, sigma).expect("valid distribution");
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let values = (0..10_000)
            .map(|_| normal.sample(&mut rng))
            .collect::<Vec<Real>>();
        let summary = FeatureSummary::from_values(values.iter().copied()).expect("non-empty");
        let histogram = HistogramBuilder::new("sampled")
            .build(values, summary.mean, summary.standard_error)
            .expect("valid statistics");

        let result = GaussianFitter::default()
            .fit(&histogram)
            .expect("fit converges");
        assert!((result.mean.value - mu).abs() / mu < 0.05);
        assert!((result.sigma.value - sigma).abs() / sigma < 0.05);
        assert!(result.degrees_of_freedom > 0);
        assert!(result.reduced_chi_squared() < 5.0);
    }

    #[test]
    fn too_few_populated_bins() {
        let histogram = Histogram::new(
            "sparse",
            "x",
            "Events",
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![0, 3, 7, 2, 0],
        )
        .expect("consistent bins");
        assert_eq!(
            GaussianFitter::default().fit(&histogram),
            Err(FitError::InsufficientBins {
                populated: 3,
                required: MIN_POPULATED_BINS
            })
        );
    }

    #[test]
    fn empty_histogram_fails() {
        let histogram = Histogram::new("empty", "x", "Events", vec![0.0, 1.0, 2.0], vec![0, 0])
            .expect("consistent bins");
        assert!(matches!(
            GaussianFitter::default().fit(&histogram),
            Err(FitError::InsufficientBins { populated: 0, .. })
        ));
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let histogram = gaussian_histogram(1000.0, 1.0, 0.5);
        assert_eq!(
            GaussianFitter::new(0, 1e-10).fit(&histogram),
            Err(FitError::DidNotConverge { iterations: 0 })
        );
    }

    #[test]
    fn inverse_of_diagonal_matrix() {
        let inverse = invert_3x3(&[[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 0.5]])
            .expect("non-singular");
        assert_eq!(inverse[0][0], 0.5);
        assert_eq!(inverse[1][1], 0.25);
        assert_eq!(inverse[2][2], 2.0);
        assert!(invert_3x3(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]).is_none());
    }
}
