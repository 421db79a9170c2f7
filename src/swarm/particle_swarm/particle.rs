#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub best_position: Vec<f64>,
    pub best_score: f64,
}

impl Particle {
    /// The starting position doubles as the first personal best.
    pub fn new(position: Vec<f64>, velocity: Vec<f64>, score: f64) -> Self {
        Particle {
            best_position: position.clone(),
            position,
            velocity,
            best_score: score,
        }
    }

    /// Records the current position as the personal best if `score` is strictly lower.
    pub fn update_best(&mut self, score: f64) {
        if score < self.best_score {
            self.best_score = score;
            self.best_position.clone_from(&self.position);
        }
    }
}
