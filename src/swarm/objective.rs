use crate::consts::{
    BENCHMARK_BOUND, BENCHMARK_COEFFICIENTS, CONCENTRATION_PENALTY, MAX_SINGLE_ASSET_WEIGHT,
    PORTFOLIO_COEFFICIENTS, RASTRIGIN_AMPLITUDE,
};
use crate::sampling::Sampler;
use crate::swarm::particle_swarm::projection::{clip_and_renormalize, clip_to_box, Projection};
use crate::swarm::particle_swarm::{ConfigurationError, SwarmCoefficients};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use std::f64::consts::PI;

/// A fitness landscape the swarm minimizes, together with the search-space
/// policy that belongs to it (where particles start, how they are pulled back
/// into the feasible region, and which coefficients suit it by default).
pub trait SwarmObjective: std::fmt::Debug + Send + Sync {
    fn dimension(&self) -> usize;

    /// Lower is better.
    fn evaluate(&self, position: &[f64]) -> f64;

    fn initial_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64>;

    /// Pulls a freshly moved position back into the search space, in place.
    fn project(&self, position: &mut [f64]) -> Projection;

    fn default_coefficients(&self) -> SwarmCoefficients;
}

// The Built-In Objectives

/// Rastrigin function, `10n + Σ(xᵢ² − 10·cos(2π·xᵢ))`. Global minimum 0 at the origin.
#[derive(Debug, Clone)]
pub struct Rastrigin {
    sampler: Sampler,
}

impl Rastrigin {
    pub fn new(dimension: usize) -> Self {
        Rastrigin {
            sampler: Sampler::uniform(-BENCHMARK_BOUND, BENCHMARK_BOUND, dimension),
        }
    }
}

pub fn rastrigin(position: &[f64]) -> f64 {
    let n = position.len() as f64;
    RASTRIGIN_AMPLITUDE * n
        + position
            .iter()
            .map(|x| x * x - RASTRIGIN_AMPLITUDE * (2. * PI * x).cos())
            .sum::<f64>()
}

impl SwarmObjective for Rastrigin {
    fn dimension(&self) -> usize {
        self.sampler.dimension()
    }

    fn evaluate(&self, position: &[f64]) -> f64 {
        rastrigin(position)
    }

    fn initial_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.sampler.sample(rng)
    }

    fn project(&self, position: &mut [f64]) -> Projection {
        clip_to_box(position, -BENCHMARK_BOUND, BENCHMARK_BOUND)
    }

    fn default_coefficients(&self) -> SwarmCoefficients {
        SwarmCoefficients::from(BENCHMARK_COEFFICIENTS)
    }
}

/// Mean-variance utility with a per-asset concentration penalty:
/// `−(w·r − λ·wᵀCw) + 1e6 × #{i : wᵢ > 0.5}`.
///
/// Minimizing the score maximizes `return − λ·variance`. The penalty is a step,
/// not a barrier, so the landscape is discontinuous at the 0.5 cap.
#[derive(Debug, Clone)]
pub struct MeanVariance {
    returns: DVector<f64>,
    covariance: DMatrix<f64>,
    risk_aversion: f64,
    sampler: Sampler,
}

impl MeanVariance {
    pub fn new(
        returns: &[f64],
        covariance: &[Vec<f64>],
        risk_aversion: f64,
    ) -> Result<Self, ConfigurationError> {
        let number_of_assets = returns.len();
        if number_of_assets == 0 {
            return Err(ConfigurationError::ZeroAssets);
        }
        if covariance.len() != number_of_assets {
            return Err(ConfigurationError::CovarianceShape {
                expected: number_of_assets,
                rows: covariance.len(),
                columns: covariance.first().map_or(0, Vec::len),
            });
        }
        if let Some(row) = covariance.iter().find(|row| row.len() != number_of_assets) {
            return Err(ConfigurationError::CovarianceShape {
                expected: number_of_assets,
                rows: covariance.len(),
                columns: row.len(),
            });
        }
        if returns.iter().any(|r| !r.is_finite()) {
            return Err(ConfigurationError::NonFinite("returns"));
        }
        if covariance.iter().flatten().any(|c| !c.is_finite()) {
            return Err(ConfigurationError::NonFinite("covariance"));
        }
        if !risk_aversion.is_finite() {
            return Err(ConfigurationError::NonFinite("risk_aversion"));
        }

        Ok(MeanVariance {
            returns: DVector::from_column_slice(returns),
            covariance: DMatrix::from_fn(number_of_assets, number_of_assets, |i, j| {
                covariance[i][j]
            }),
            risk_aversion,
            sampler: Sampler::simplex(number_of_assets),
        })
    }

    pub fn expected_return(&self, weights: &[f64]) -> f64 {
        self.returns.dot(&DVector::from_column_slice(weights))
    }

    /// `wᵀCw`
    pub fn variance(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        w.dot(&(&self.covariance * &w))
    }

    pub fn penalty(weights: &[f64]) -> f64 {
        let violations = weights
            .iter()
            .filter(|&&w| w > MAX_SINGLE_ASSET_WEIGHT)
            .count();
        CONCENTRATION_PENALTY * violations as f64
    }
}

impl SwarmObjective for MeanVariance {
    fn dimension(&self) -> usize {
        self.returns.len()
    }

    fn evaluate(&self, position: &[f64]) -> f64 {
        let utility =
            self.expected_return(position) - self.risk_aversion * self.variance(position);
        -utility + Self::penalty(position)
    }

    fn initial_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.sampler.sample(rng)
    }

    fn project(&self, position: &mut [f64]) -> Projection {
        clip_and_renormalize(position, 0., MAX_SINGLE_ASSET_WEIGHT)
    }

    fn default_coefficients(&self) -> SwarmCoefficients {
        SwarmCoefficients::from(PORTFOLIO_COEFFICIENTS)
    }
}
