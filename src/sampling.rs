use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Dirichlet;

/// Draws starting points (and velocities) for swarm particles.
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Symmetric Dirichlet(1, ..., 1): non-negative weights summing to 1.
    /// `dirichlet` is `None` when the simplex is a single point (one asset).
    Simplex {
        dirichlet: Option<Dirichlet<f64>>,
        dimension: usize,
    },
    /// Independent uniform draw per component.
    Uniform {
        distribution: Uniform<f64>,
        dimension: usize,
    },
}

impl Sampler {
    pub fn simplex(dimension: usize) -> Self {
        // rand_distr refuses fewer than two concentration parameters
        let dirichlet = Dirichlet::new_with_size(1., dimension).ok();
        Sampler::Simplex {
            dirichlet,
            dimension,
        }
    }

    /// Uniform over `[low, high)` in every component. Panics if `low >= high`.
    pub fn uniform(low: f64, high: f64, dimension: usize) -> Self {
        Sampler::Uniform {
            distribution: Uniform::new(low, high),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Sampler::Simplex { dimension, .. } | Sampler::Uniform { dimension, .. } => *dimension,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        match self {
            Sampler::Simplex {
                dirichlet: Some(dirichlet),
                ..
            } => dirichlet.sample(rng),
            Sampler::Simplex {
                dirichlet: None,
                dimension,
            } => vec![1.; *dimension],
            Sampler::Uniform {
                distribution,
                dimension,
            } => (0..*dimension).map(|_| distribution.sample(rng)).collect(),
        }
    }
}
