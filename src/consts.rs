// Shared numeric constants for the swarm and its objectives.

pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-9;

// Rastrigin benchmark
pub const RASTRIGIN_AMPLITUDE: f64 = 10.;
/// Half-width of the standard Rastrigin search box.
pub const BENCHMARK_BOUND: f64 = 5.12;

// Portfolio objective
pub const MAX_SINGLE_ASSET_WEIGHT: f64 = 0.5;
/// Added once per asset whose weight exceeds `MAX_SINGLE_ASSET_WEIGHT`.
pub const CONCENTRATION_PENALTY: f64 = 1_000_000.;
pub const DEFAULT_RISK_AVERSION: f64 = 1.;

// Swarm
pub const INITIAL_VELOCITY_BOUND: f64 = 1.;

/// (inertia, cognitive, social)
pub const BENCHMARK_COEFFICIENTS: (f64, f64, f64) = (0.9, 1.5, 1.5);
pub const PORTFOLIO_COEFFICIENTS: (f64, f64, f64) = (0.5, 2.0, 2.0);
