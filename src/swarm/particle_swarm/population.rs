use crate::consts::INITIAL_VELOCITY_BOUND;
use crate::sampling::Sampler;
use crate::swarm::objective::SwarmObjective;
use crate::swarm::particle_swarm::particle::Particle;
use crate::swarm::particle_swarm::projection::Projection;
use crate::swarm::particle_swarm::SwarmCoefficients;
use itertools::izip;
use rand::Rng;

/// All particle state for one optimization run, plus the swarm-wide best.
///
/// `global_best_position` is always a copy of one particle's personal best as of
/// the last recomputation; it is never blended.
#[derive(Debug)]
pub struct Swarm<O: SwarmObjective> {
    objective: O,
    coefficients: SwarmCoefficients,
    particles: Vec<Particle>,
    global_best_position: Vec<f64>,
    global_best_score: f64,
    degenerate_projections: usize,
}

impl<O: SwarmObjective> Swarm<O> {
    /// Seeds `number_of_particles` particles from the objective's sampler, with
    /// velocities uniform in `[-1, 1)`. Callers guarantee `number_of_particles > 0`.
    pub fn new<R: Rng + ?Sized>(
        objective: O,
        number_of_particles: usize,
        coefficients: SwarmCoefficients,
        rng: &mut R,
    ) -> Self {
        let dimension = objective.dimension();
        let velocity_sampler =
            Sampler::uniform(-INITIAL_VELOCITY_BOUND, INITIAL_VELOCITY_BOUND, dimension);

        let positions = (0..number_of_particles)
            .map(|_| objective.initial_position(rng))
            .collect::<Vec<Vec<f64>>>();
        let velocities = (0..number_of_particles)
            .map(|_| velocity_sampler.sample(rng))
            .collect::<Vec<Vec<f64>>>();

        let particles = positions
            .into_iter()
            .zip(velocities)
            .map(|(position, velocity)| {
                let score = objective.evaluate(&position);
                Particle::new(position, velocity, score)
            })
            .collect::<Vec<Particle>>();

        let mut swarm = Swarm {
            objective,
            coefficients,
            particles,
            global_best_position: vec![0.; dimension],
            global_best_score: f64::INFINITY,
            degenerate_projections: 0,
        };
        swarm.recompute_global_best();
        swarm
    }

    /// One full iteration: every particle in index order is evaluated, moved and
    /// projected against the global best as it stood when the iteration began.
    /// The global best is recomputed from scratch once all particles have moved.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let SwarmCoefficients {
            inertia,
            cognitive,
            social,
        } = self.coefficients;

        for particle in self.particles.iter_mut() {
            let score = self.objective.evaluate(&particle.position);
            particle.update_best(score);

            let r1: f64 = rng.gen();
            let r2: f64 = rng.gen();

            for (x, v, personal_best, global_best) in izip!(
                particle.position.iter_mut(),
                particle.velocity.iter_mut(),
                particle.best_position.iter(),
                self.global_best_position.iter()
            ) {
                *v = inertia * *v
                    + cognitive * r1 * (personal_best - *x)
                    + social * r2 * (global_best - *x);
                *x += *v;
            }

            if self.objective.project(&mut particle.position) == Projection::UniformFallback {
                self.degenerate_projections += 1;
            }
        }

        self.recompute_global_best();
    }

    /// Arg-min over personal best scores; the lowest index wins ties.
    fn recompute_global_best(&mut self) {
        let best = self
            .particles
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (idx, particle)| match best {
                Some((_, best_score)) if particle.best_score < best_score => {
                    Some((idx, particle.best_score))
                }
                Some(_) => best,
                None => Some((idx, particle.best_score)),
            });

        if let Some((idx, score)) = best {
            self.global_best_position
                .clone_from(&self.particles[idx].best_position);
            self.global_best_score = score;
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.particles
            .iter()
            .map(|particle| particle.position.clone())
            .collect()
    }

    pub fn global_best_position(&self) -> &[f64] {
        &self.global_best_position
    }

    pub fn global_best_score(&self) -> f64 {
        self.global_best_score
    }

    pub fn degenerate_projections(&self) -> usize {
        self.degenerate_projections
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn into_best(self) -> (Vec<f64>, f64) {
        (self.global_best_position, self.global_best_score)
    }
}
