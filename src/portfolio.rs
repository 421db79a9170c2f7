use crate::swarm::particle_swarm::{ObjectiveConfig, RunConfig};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Price table is empty")]
    Empty,
    #[error("Need at least {required} observations per asset, got {actual}")]
    TooFewObservations { required: usize, actual: usize },
    #[error("Row {row} has {actual} prices, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Price at row {row}, asset {asset} must be positive and finite, got {price}")]
    InvalidPrice { row: usize, asset: usize, price: f64 },
}

/// Per-asset return and covariance estimates, the inputs of the portfolio objective.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketEstimates {
    pub returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

impl MarketEstimates {
    /// Derives estimates from an in-memory price table (rows are observations in
    /// time order, columns are assets).
    ///
    /// * returns: total return over the window, `(last - first) / first`
    /// * covariance: sample covariance of daily percentage changes, each change
    ///   multiplied by `daily_return_scale` first
    pub fn from_prices(
        prices: &[Vec<f64>],
        daily_return_scale: f64,
    ) -> Result<Self, EstimationError> {
        let first_row = prices.first().ok_or(EstimationError::Empty)?;
        let number_of_assets = first_row.len();
        if number_of_assets == 0 {
            return Err(EstimationError::Empty);
        }
        // two daily changes are the minimum for a sample covariance
        if prices.len() < 3 {
            return Err(EstimationError::TooFewObservations {
                required: 3,
                actual: prices.len(),
            });
        }
        for (row, observation) in prices.iter().enumerate() {
            if observation.len() != number_of_assets {
                return Err(EstimationError::RaggedRow {
                    row,
                    expected: number_of_assets,
                    actual: observation.len(),
                });
            }
            if let Some((asset, &price)) = observation
                .iter()
                .enumerate()
                .find(|(_, p)| !(**p > 0. && p.is_finite()))
            {
                return Err(EstimationError::InvalidPrice { row, asset, price });
            }
        }

        let last_row = &prices[prices.len() - 1];
        let returns = first_row
            .iter()
            .zip(last_row.iter())
            .map(|(start, end)| (end - start) / start)
            .collect::<Vec<f64>>();

        // one series of scaled daily changes per asset
        let daily_changes = (0..number_of_assets)
            .map(|asset| {
                prices
                    .windows(2)
                    .map(|pair| (pair[1][asset] - pair[0][asset]) / pair[0][asset])
                    .map(|change| change * daily_return_scale)
                    .collect::<Vec<f64>>()
            })
            .collect::<Vec<Vec<f64>>>();

        let covariance = daily_changes
            .iter()
            .map(|series_i| {
                daily_changes
                    .iter()
                    .map(|series_j| series_i.iter().covariance(series_j.iter()))
                    .collect::<Vec<f64>>()
            })
            .collect::<Vec<Vec<f64>>>();

        Ok(MarketEstimates {
            returns,
            covariance,
        })
    }

    pub fn number_of_assets(&self) -> usize {
        self.returns.len()
    }

    pub fn into_objective(self, risk_aversion: f64) -> ObjectiveConfig {
        ObjectiveConfig::PortfolioRisk {
            returns: self.returns,
            covariance: self.covariance,
            risk_aversion,
        }
    }

    /// A portfolio run over these estimates with the default coefficients.
    pub fn into_run_config(
        self,
        num_particles: usize,
        iterations: usize,
        risk_aversion: f64,
    ) -> RunConfig {
        let num_assets = self.number_of_assets();
        RunConfig {
            objective: self.into_objective(risk_aversion),
            ..RunConfig::benchmark(num_particles, num_assets, iterations)
        }
    }
}
