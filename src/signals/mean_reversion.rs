use crate::math::history::PriceHistory;
use crate::math::stats;
use crate::types::SignalComponent;

pub const NAME: &str = "mean_reversion";

const WINDOW: usize = 60;
const BASE_WEIGHT: f64 = 1.0;

/// Z-score fade: z = (current − μ)/σ over the last 60 prices.
/// Full fade (−z) beyond |z| > 1.5, dead zone inside |z| < 0.5, a partial
/// −0.3z lean in between.
pub fn generate(history: &PriceHistory) -> SignalComponent {
    let mut value = 0.0;
    let mut z = 0.0;
    if history.len() >= WINDOW {
        let prices = history.prices_tail(WINDOW);
        let mu = stats::mean(&prices);
        let sigma = stats::stddev(&prices);
        let current = history.last_price();
        if sigma > 0.0 && current > 0.0 {
            z = (current - mu) / sigma;
            value = if z.abs() > 1.5 {
                -z
            } else if z.abs() < 0.5 {
                0.0
            } else {
                -0.3 * z
            };
        }
    }
    SignalComponent {
        name: NAME,
        value,
        weight: BASE_WEIGHT,
        z_score: z,
    }
}
