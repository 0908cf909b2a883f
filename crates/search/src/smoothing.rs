use chess::ChessMove;

use crate::config::SmoothingConfig;
use crate::error::{Result, SearchError};
use crate::tree::SearchNode;

/// Training policy for `node` derived from its child visit counts.
///
/// The result is aligned with [`SearchNode::child_moves`] and sums to 1.
pub fn smoothed_policy<N: SearchNode + ?Sized>(
    node: &N,
    config: &SmoothingConfig,
) -> Result<Vec<f32>> {
    smooth_visits(&node.child_visits(), config)
}

/// Legal moves of `node` in the same order as [`smoothed_policy`]
pub fn retrieve_legal_moves<N: SearchNode + ?Sized>(node: &N) -> Vec<ChessMove> {
    node.child_moves()
}

/// Turn raw visit counts into a smoothed probability distribution
///
/// - temperature ≈ 0: all visit mass on the most visited child
/// - temperature = 1: proportional to visits
/// - temperature > 1: flatter (visits^(1/t))
///
/// A `uniform_mix` share of the mass is then spread evenly, so every child
/// keeps at least `uniform_mix / n`.
pub fn smooth_visits(visits: &[u32], config: &SmoothingConfig) -> Result<Vec<f32>> {
    config.validate()?;
    if visits.is_empty() {
        return Err(SearchError::NoChildren);
    }

    let n = visits.len();
    let uniform = 1.0 / n as f64;

    let weights: Vec<f64> = if config.temperature < 0.01 {
        let best = visits
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap_or(0);
        (0..n).map(|i| if i == best { 1.0 } else { 0.0 }).collect()
    } else {
        // Scaled to the largest count so every weight stays in [0, 1]
        let inv_temp = 1.0f64 / config.temperature as f64;
        let max_visits = visits.iter().copied().max().unwrap_or(0) as f64;
        visits
            .iter()
            .map(|&v| {
                if v == 0 {
                    0.0
                } else {
                    (v as f64 / max_visits).powf(inv_temp)
                }
            })
            .collect()
    };

    let total: f64 = weights.iter().sum();
    let mix = config.uniform_mix as f64;

    let policy: Vec<f32> = weights
        .iter()
        .map(|&w| {
            let p = if total > 0.0 { w / total } else { uniform };
            ((1.0 - mix) * p + mix * uniform) as f32
        })
        .collect();

    if let Some(index) = policy.iter().position(|p| !p.is_finite()) {
        return Err(SearchError::NonFinitePolicy(index));
    }
    Ok(policy)
}
