pub mod objective;
pub mod particle_swarm;
