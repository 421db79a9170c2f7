use tracing::warn;

/// Outcome of pulling a moved position back into its search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Components were clipped (and renormalized where the space requires it).
    Clipped,
    /// Nothing usable survived clipping, so the uniform allocation was substituted.
    UniformFallback,
}

/// Clip every component into `[lower, upper]`.
pub fn clip_to_box(position: &mut [f64], lower: f64, upper: f64) -> Projection {
    position
        .iter_mut()
        .for_each(|x| *x = x.clamp(lower, upper));
    Projection::Clipped
}

/// Clip into `[lower, upper]`, then divide by the new sum so the weights add up to 1.
///
/// Renormalizing after the clip can push a component back above `upper`; that
/// approximation is accepted and the objective's penalty deals with it.
/// When the clipped weights sum to zero (or to something non-finite) there is
/// nothing to rescale and the uniform allocation `1/n` is used instead.
pub fn clip_and_renormalize(position: &mut [f64], lower: f64, upper: f64) -> Projection {
    clip_to_box(position, lower, upper);

    let total = position.iter().sum::<f64>();
    if total > 0. && total.is_finite() {
        position.iter_mut().for_each(|w| *w /= total);
        Projection::Clipped
    } else {
        let n = position.len();
        warn!(
            "Degenerate allocation (clipped sum {}) across {} assets, substituting uniform weights.",
            total, n
        );
        position.iter_mut().for_each(|w| *w = 1. / n as f64);
        Projection::UniformFallback
    }
}
