use crate::consts::DEFAULT_RISK_AVERSION;
use crate::swarm::objective::{MeanVariance, Rastrigin, SwarmObjective};
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub mod particle;
pub mod population;
pub mod projection;

use self::population::Swarm;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Number of particles cannot be zero")]
    ZeroParticles,
    #[error("Number of assets cannot be zero")]
    ZeroAssets,
    #[error("Expected {expected} returns (one per asset), got {actual}")]
    ReturnsLength { expected: usize, actual: usize },
    #[error("Covariance must be {expected}x{expected}, got {rows} rows (offending row has {columns} columns)")]
    CovarianceShape {
        expected: usize,
        rows: usize,
        columns: usize,
    },
    #[error("Non-finite value found in `{0}`")]
    NonFinite(&'static str),
    #[error("At least one restart is required")]
    ZeroRestarts,
}

/// Weights of momentum, pull towards the personal best and pull towards the global best.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwarmCoefficients {
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
}

impl From<(f64, f64, f64)> for SwarmCoefficients {
    fn from((inertia, cognitive, social): (f64, f64, f64)) -> Self {
        SwarmCoefficients {
            inertia,
            cognitive,
            social,
        }
    }
}

fn default_risk_aversion() -> f64 {
    DEFAULT_RISK_AVERSION
}

/// Which fitness landscape the swarm searches.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ObjectiveConfig {
    /// Rastrigin over `[-5.12, 5.12]^num_assets`, used to check convergence.
    Benchmark,
    /// Mean-variance allocation over the given estimates.
    PortfolioRisk {
        returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
        #[serde(default = "default_risk_aversion")]
        risk_aversion: f64,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub num_particles: usize,
    pub num_assets: usize,
    pub iterations: usize,
    /// Overrides for the objective's default coefficients.
    #[serde(default)]
    pub inertia: Option<f64>,
    #[serde(default)]
    pub cognitive: Option<f64>,
    #[serde(default)]
    pub social: Option<f64>,
    #[serde(flatten)]
    pub objective: ObjectiveConfig,
    /// Drawn from the OS (and reported back) when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Keep a snapshot of every particle position at the start of each iteration.
    #[serde(default)]
    pub record_history: bool,
    /// Log progress every n iterations, 0 to stay quiet.
    #[serde(default)]
    pub progress_interval: usize,
}

impl RunConfig {
    pub fn benchmark(num_particles: usize, num_assets: usize, iterations: usize) -> Self {
        RunConfig {
            num_particles,
            num_assets,
            iterations,
            inertia: None,
            cognitive: None,
            social: None,
            objective: ObjectiveConfig::Benchmark,
            seed: None,
            record_history: false,
            progress_interval: 0,
        }
    }

    pub fn portfolio_risk(
        num_particles: usize,
        iterations: usize,
        returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
        risk_aversion: f64,
    ) -> Self {
        RunConfig {
            num_assets: returns.len(),
            objective: ObjectiveConfig::PortfolioRisk {
                returns,
                covariance,
                risk_aversion,
            },
            ..RunConfig::benchmark(num_particles, 0, iterations)
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_history(mut self) -> Self {
        self.record_history = true;
        self
    }

    pub fn with_coefficients(mut self, coefficients: SwarmCoefficients) -> Self {
        self.inertia = Some(coefficients.inertia);
        self.cognitive = Some(coefficients.cognitive);
        self.social = Some(coefficients.social);
        self
    }

    /// Checks counts, dimensions and finiteness. Nothing is built before this passes.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_particles == 0 {
            return Err(ConfigurationError::ZeroParticles);
        }
        if self.num_assets == 0 {
            return Err(ConfigurationError::ZeroAssets);
        }
        for (name, value) in [
            ("inertia", self.inertia),
            ("cognitive", self.cognitive),
            ("social", self.social),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ConfigurationError::NonFinite(name));
            }
        }

        if let ObjectiveConfig::PortfolioRisk {
            returns,
            covariance,
            risk_aversion,
        } = &self.objective
        {
            if returns.len() != self.num_assets {
                return Err(ConfigurationError::ReturnsLength {
                    expected: self.num_assets,
                    actual: returns.len(),
                });
            }
            // MeanVariance::new repeats the shape and finiteness checks
            MeanVariance::new(returns, covariance, *risk_aversion)?;
        }
        Ok(())
    }

    fn coefficients(&self, defaults: SwarmCoefficients) -> SwarmCoefficients {
        SwarmCoefficients {
            inertia: self.inertia.unwrap_or(defaults.inertia),
            cognitive: self.cognitive.unwrap_or(defaults.cognitive),
            social: self.social.unwrap_or(defaults.social),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub best_position: Vec<f64>,
    pub best_score: f64,
    pub iterations: usize,
    /// Seed the run's generator was built from; `None` for caller-supplied generators.
    pub seed: Option<u64>,
    /// Global best score after each completed iteration.
    pub best_score_per_iteration: Vec<f64>,
    /// How many projections fell back to the uniform allocation.
    pub degenerate_projections: usize,
    /// `[iteration][particle][asset]`, present only when `record_history` was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_history: Option<Vec<Vec<Vec<f64>>>>,
}

/// Runs one swarm with a `ChaCha20Rng` seeded from `config.seed`.
pub fn run(config: &RunConfig) -> Result<OptimizationResult, ConfigurationError> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(|| OsRng.next_u64());
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut result = run_with_rng(config, &mut rng)?;
    result.seed = Some(seed);
    Ok(result)
}

/// Runs one swarm drawing all randomness from `rng`. `config.seed` is ignored.
pub fn run_with_rng<R: Rng + ?Sized>(
    config: &RunConfig,
    rng: &mut R,
) -> Result<OptimizationResult, ConfigurationError> {
    config.validate()?;
    match &config.objective {
        ObjectiveConfig::Benchmark => Ok(fly(Rastrigin::new(config.num_assets), config, rng)),
        ObjectiveConfig::PortfolioRisk {
            returns,
            covariance,
            risk_aversion,
        } => {
            let objective = MeanVariance::new(returns, covariance, *risk_aversion)?;
            Ok(fly(objective, config, rng))
        }
    }
}

fn fly<O: SwarmObjective, R: Rng + ?Sized>(
    objective: O,
    config: &RunConfig,
    rng: &mut R,
) -> OptimizationResult {
    let coefficients = config.coefficients(objective.default_coefficients());
    info!(
        "Starting swarm: {} particles, {} assets, {} iterations, {:?}",
        config.num_particles, config.num_assets, config.iterations, coefficients
    );

    let mut swarm = Swarm::new(objective, config.num_particles, coefficients, rng);
    let mut position_history = config
        .record_history
        .then(|| Vec::with_capacity(config.iterations));
    let mut best_score_per_iteration = Vec::with_capacity(config.iterations);

    for iteration in 0..config.iterations {
        if let Some(history) = position_history.as_mut() {
            history.push(swarm.positions());
        }

        swarm.step(rng);
        best_score_per_iteration.push(swarm.global_best_score());

        if config.progress_interval > 0 && (iteration + 1) % config.progress_interval == 0 {
            debug!(
                "Iteration {}/{}: global best score {:.6e}",
                iteration + 1,
                config.iterations,
                swarm.global_best_score()
            );
        }
    }

    let degenerate_projections = swarm.degenerate_projections();
    let (best_position, best_score) = swarm.into_best();
    info!(
        "Swarm finished: best score {:.6e}, {} degenerate projections",
        best_score, degenerate_projections
    );

    OptimizationResult {
        best_position,
        best_score,
        iterations: config.iterations,
        seed: None,
        best_score_per_iteration,
        degenerate_projections,
        position_history,
    }
}

/// Runs `restarts` independent swarms in parallel, restart `k` seeded with
/// `base_seed + k`. Results come back in restart order.
pub fn run_restarts(
    config: &RunConfig,
    restarts: usize,
) -> Result<Vec<OptimizationResult>, ConfigurationError> {
    config.validate()?;
    if restarts == 0 {
        return Err(ConfigurationError::ZeroRestarts);
    }
    let base_seed = config.seed.unwrap_or_else(|| OsRng.next_u64());

    (0..restarts)
        .into_par_iter()
        .map(|k| {
            let restart_config = config.clone().with_seed(base_seed.wrapping_add(k as u64));
            run(&restart_config)
        })
        .collect()
}

/// The result with the lowest best score.
pub fn best_of(results: &[OptimizationResult]) -> Option<&OptimizationResult> {
    results
        .iter()
        .min_by(|a, b| a.best_score.total_cmp(&b.best_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{FLOAT_COMPARISON_EPSILON, MAX_SINGLE_ASSET_WEIGHT};
    use crate::swarm::objective::rastrigin;

    fn example_covariance() -> Vec<Vec<f64>> {
        vec![
            vec![0.04, 0.01, 0.02],
            vec![0.01, 0.03, 0.01],
            vec![0.02, 0.01, 0.05],
        ]
    }

    fn assert_valid_allocation(weights: &[f64]) {
        let sum: f64 = weights.iter().sum();
        assert!(
            (sum - 1.).abs() < FLOAT_COMPARISON_EPSILON,
            "Weights should sum to 1. Got {}",
            sum
        );
        assert!(
            weights.iter().all(|&w| w >= 0.),
            "Weights must be non-negative, got {:?}",
            weights
        );
    }

    #[test]
    fn test_configuration_errors() {
        let config = RunConfig::benchmark(0, 3, 10);
        assert_eq!(run(&config), Err(ConfigurationError::ZeroParticles));

        let config = RunConfig::benchmark(10, 0, 10);
        assert_eq!(run(&config), Err(ConfigurationError::ZeroAssets));

        let mut config =
            RunConfig::portfolio_risk(10, 10, vec![0.1, 0.2, 0.3], example_covariance(), 1.);
        config.num_assets = 4;
        assert_eq!(
            run(&config),
            Err(ConfigurationError::ReturnsLength {
                expected: 4,
                actual: 3
            })
        );

        let config = RunConfig::portfolio_risk(
            10,
            10,
            vec![0.1, 0.2, 0.3],
            vec![vec![0.1, 0.0, 0.0], vec![0.0, 0.1, 0.0]],
            1.,
        );
        assert!(matches!(
            run(&config),
            Err(ConfigurationError::CovarianceShape { expected: 3, .. })
        ));

        let mut config = RunConfig::benchmark(10, 2, 10);
        config.social = Some(f64::INFINITY);
        assert_eq!(run(&config), Err(ConfigurationError::NonFinite("social")));

        let config = RunConfig::benchmark(10, 2, 10);
        assert_eq!(
            run_restarts(&config, 0),
            Err(ConfigurationError::ZeroRestarts)
        );
    }

    #[test]
    fn test_runs_exactly_the_requested_iterations() {
        for iterations in [0, 1, 17] {
            let config = RunConfig::benchmark(8, 3, iterations)
                .with_seed(9)
                .with_history();
            let result = run(&config).unwrap();
            assert_eq!(result.iterations, iterations);
            assert_eq!(result.best_score_per_iteration.len(), iterations);
            assert_eq!(result.best_position.len(), 3);
            let history = result.position_history.unwrap();
            assert_eq!(history.len(), iterations);
            assert!(history.iter().all(|snapshot| snapshot.len() == 8));
        }
    }

    #[test]
    fn test_history_is_opt_in() {
        let result = run(&RunConfig::benchmark(4, 2, 5).with_seed(1)).unwrap();
        assert!(result.position_history.is_none());
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let config = RunConfig::portfolio_risk(
            30,
            60,
            vec![0.12, 0.10, 0.55],
            example_covariance(),
            1.,
        )
        .with_seed(1234);
        let first = run(&config).unwrap();
        let second = run(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.seed, Some(1234));

        let other = run(&config.clone().with_seed(4321)).unwrap();
        assert_ne!(first.best_score_per_iteration, other.best_score_per_iteration);
    }

    #[test]
    fn test_injected_rng_matches_seeded_run() {
        let config = RunConfig::benchmark(10, 4, 25).with_seed(77);
        let seeded = run(&config).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(77);
        let injected = run_with_rng(&config, &mut rng).unwrap();
        assert_eq!(injected.seed, None);
        assert_eq!(injected.best_position, seeded.best_position);
        assert_eq!(injected.best_score, seeded.best_score);
    }

    #[test]
    fn test_best_score_curve_is_non_increasing() {
        let result = run(&RunConfig::benchmark(20, 5, 300).with_seed(3)).unwrap();
        for pair in result.best_score_per_iteration.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert_eq!(
            result.best_score,
            *result.best_score_per_iteration.last().unwrap()
        );
        assert!((rastrigin(&result.best_position) - result.best_score).abs() < 1e-12);
    }

    // Convergence regression on the benchmark landscape. Single runs can settle on a
    // local minimum at an integer lattice point, so the best of a few restarts is checked.
    #[test]
    fn test_benchmark_convergence_default_coefficients() {
        let config = RunConfig::benchmark(20, 5, 2000).with_seed(0);
        let results = run_restarts(&config, 8).unwrap();
        let best = best_of(&results).unwrap();
        assert!(
            best.best_score < 1e-2,
            "Expected the swarm to reach the global minimum at the origin, best score {}",
            best.best_score
        );
        assert!(best.best_position.iter().all(|x| x.abs() < 1e-2));
    }

    #[test]
    fn test_benchmark_converges_on_a_single_seed() {
        let result = run(&RunConfig::benchmark(20, 5, 2000).with_seed(4)).unwrap();
        assert!(result.best_score < 1e-2, "Best score {}", result.best_score);
        assert!(result.best_score < result.best_score_per_iteration[0]);
    }

    #[test]
    fn test_benchmark_convergence_with_constriction_coefficients() {
        let config = RunConfig::benchmark(30, 2, 2000)
            .with_seed(99)
            .with_coefficients(SwarmCoefficients::from((0.7298, 1.49618, 1.49618)));
        let result = run(&config).unwrap();
        assert!(
            result.best_score < 3.,
            "Expected the global basin or one of its nearest neighbours, best score {}",
            result.best_score
        );
    }

    #[test]
    fn test_portfolio_result_is_a_valid_allocation() {
        let config = RunConfig::portfolio_risk(
            50,
            100,
            vec![0.12, 0.10, 0.55],
            example_covariance(),
            1.,
        )
        .with_seed(42);
        let result = run(&config).unwrap();
        assert_valid_allocation(&result.best_position);
        // a feasible best exists, so the penalized region never wins
        assert!(result.best_score < 0.);
        assert!(result
            .best_position
            .iter()
            .all(|&w| w <= MAX_SINGLE_ASSET_WEIGHT + FLOAT_COMPARISON_EPSILON));
    }

    #[test]
    fn test_high_return_asset_gets_the_largest_weight() {
        let config = RunConfig::portfolio_risk(
            50,
            100,
            vec![0.12, 0.10, 0.55],
            example_covariance(),
            1.,
        )
        .with_seed(7);
        let result = run(&config).unwrap();
        let weights = &result.best_position;
        assert!(
            weights[2] > weights[0] && weights[2] > weights[1],
            "Third asset should dominate, got {:?}",
            weights
        );
        assert!(weights[2] >= 0.4, "Got {:?}", weights);
    }

    #[test]
    fn test_identical_assets_yield_a_feasible_allocation() {
        let config = RunConfig::portfolio_risk(
            50,
            100,
            vec![0.10, 0.10, 0.10],
            vec![vec![0.01; 3]; 3],
            1.,
        )
        .with_seed(5);
        let result = run(&config).unwrap();
        assert_valid_allocation(&result.best_position);
        assert!(result
            .best_position
            .iter()
            .all(|&w| w <= MAX_SINGLE_ASSET_WEIGHT + FLOAT_COMPARISON_EPSILON));
        // flat landscape: every feasible allocation scores -(0.10 - 0.01)
        assert!((result.best_score + 0.09).abs() < 1e-9);
    }

    #[test]
    fn test_runaway_velocities_fall_back_to_uniform_weights() {
        // velocities multiply by the inertia every step, so both weights soon clip to zero
        let mut config = RunConfig::portfolio_risk(
            50,
            10,
            vec![0.05, 0.08],
            vec![vec![0.02, 0.0], vec![0.0, 0.03]],
            1.,
        )
        .with_seed(11);
        config.inertia = Some(50.);
        let result = run(&config).unwrap();
        assert!(
            result.degenerate_projections > 0,
            "Expected at least one uniform fallback"
        );
        assert!(result.best_score.is_finite());
        assert!(result.best_position.iter().all(|w| w.is_finite()));
        assert_valid_allocation(&result.best_position);
    }

    #[test]
    fn test_single_asset_is_fully_allocated() {
        for seed in 0..5 {
            let config =
                RunConfig::portfolio_risk(10, 20, vec![0.08], vec![vec![0.02]], 1.).with_seed(seed);
            let result = run(&config).unwrap();
            assert_eq!(result.best_position, vec![1.]);
        }
    }

    #[test]
    fn test_restarts_are_reproducible_and_ordered() {
        let config = RunConfig::benchmark(10, 3, 50).with_seed(500);
        let results = run_restarts(&config, 4).unwrap();
        assert_eq!(results.len(), 4);
        for (k, result) in results.iter().enumerate() {
            assert_eq!(result.seed, Some(500 + k as u64));
            let single = run(&config.clone().with_seed(500 + k as u64)).unwrap();
            assert_eq!(&single, result);
        }

        let best = best_of(&results).unwrap();
        assert!(results.iter().all(|r| best.best_score <= r.best_score));
        assert!(best_of(&[]).is_none());
    }

    #[test]
    fn test_config_from_json() {
        let raw = r#"{
            "num_particles": 50,
            "num_assets": 3,
            "iterations": 100,
            "mode": "portfolio_risk",
            "returns": [0.12, 0.10, 0.55],
            "covariance": [[0.04, 0.01, 0.02], [0.01, 0.03, 0.01], [0.02, 0.01, 0.05]],
            "seed": 8
        }"#;
        let config: RunConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.seed, Some(8));
        assert!(!config.record_history);
        match &config.objective {
            ObjectiveConfig::PortfolioRisk { risk_aversion, .. } => {
                assert_eq!(*risk_aversion, DEFAULT_RISK_AVERSION)
            }
            other => panic!("Unexpected objective {:?}", other),
        }
        assert!(config.validate().is_ok());

        let benchmark: RunConfig = serde_json::from_str(
            r#"{"num_particles": 20, "num_assets": 5, "iterations": 10, "mode": "benchmark", "inertia": 0.7}"#,
        )
        .unwrap();
        assert_eq!(benchmark.objective, ObjectiveConfig::Benchmark);
        assert_eq!(benchmark.inertia, Some(0.7));
    }
}
