// Modules
pub mod consts;
pub mod portfolio;
pub mod sampling;
pub mod swarm;

pub use crate::portfolio::{EstimationError, MarketEstimates};
pub use crate::swarm::particle_swarm::{
    best_of, run, run_restarts, run_with_rng, ConfigurationError, ObjectiveConfig,
    OptimizationResult, RunConfig, SwarmCoefficients,
};
