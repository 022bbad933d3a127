use crate::math::history::PriceHistory;
use crate::math::stats;
use crate::types::SignalComponent;

pub const NAME: &str = "momentum";

/// Lookback and skip in ticks. The skip drops the newest ticks so the
/// measure is not dominated by bid/ask bounce.
const LOOKBACK: usize = 40;
const SKIP: usize = 2;
const VOL_WINDOW: usize = 20;
const BASE_WEIGHT: f64 = 1.0;

/// Vol-normalized momentum: r = (p[n-1-S] − p[n-1-L]) / p[n-1-L], scaled by
/// the stddev of the last 20 returns. 0 when underfilled or vol is flat.
pub fn generate(history: &PriceHistory) -> SignalComponent {
    let mut value = 0.0;
    if history.len() > LOOKBACK {
        let p_new = history.price_back(SKIP);
        let p_old = history.price_back(LOOKBACK);
        if p_old > 0.0 && p_new > 0.0 {
            let r = (p_new - p_old) / p_old;
            let sigma = stats::stddev(&history.log_returns(VOL_WINDOW));
            if sigma > 0.0 {
                value = r / sigma;
            }
        }
    }
    SignalComponent {
        name: NAME,
        value,
        weight: BASE_WEIGHT,
        z_score: value,
    }
}
