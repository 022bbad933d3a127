use crate::math::stats;
use crate::types::SignalComponent;

pub const NAME: &str = "spread_regime";

const MIN_HISTORY: usize = 10;
const BASE_WEIGHT: f64 = 0.5;

/// Meta-confidence from the spread regime: z-score of the current spread
/// against its recent history, mapped to [-0.5, +0.3]. A blowing-out spread
/// (positive z) argues against trading; an unusually tight one mildly for it.
pub fn generate(current_spread: f64, spread_history: &[f64]) -> SignalComponent {
    let mut value = 0.0;
    let mut z = 0.0;
    if spread_history.len() >= MIN_HISTORY && current_spread >= 0.0 {
        let mu = stats::mean(spread_history);
        let sigma = stats::stddev(spread_history);
        if sigma > 0.0 {
            z = (current_spread - mu) / sigma;
            value = (-0.25 * z).clamp(-0.5, 0.3);
        }
    }
    SignalComponent {
        name: NAME,
        value,
        weight: BASE_WEIGHT,
        z_score: z,
    }
}
