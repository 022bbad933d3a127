use crate::math::history::PriceHistory;
use crate::math::stats;
use crate::types::SignalComponent;

pub const NAME: &str = "cross_asset";

/// Lead in ticks: 6 samples ≈ 3s at the 500ms cadence.
const LEAD: usize = 6;
/// Return pairs used for the lead/lag correlation.
const CORR_WINDOW: usize = 30;
const BASE_WEIGHT: f64 = 0.7;

/// Perp-leads-prediction flow: correlation of perp returns against
/// prediction-mid returns LEAD ticks later, multiplied by the sum of the
/// last LEAD perp returns (scaled ×100). Positive when the perp has moved
/// and history says the prediction market follows.
pub fn generate(ref_history: &PriceHistory, mid_history: &PriceHistory) -> SignalComponent {
    let need = CORR_WINDOW + LEAD;
    let rp = ref_history.log_returns(need);
    let rm = mid_history.log_returns(need);

    let n = rp.len().min(rm.len());
    if n < LEAD + 2 {
        return flat();
    }

    // Align: perp return at t paired with prediction return at t+LEAD.
    let x = &rp[..n - LEAD];
    let y = &rm[LEAD..n];
    let corr = stats::correlation(x, y);

    let recent: f64 = rp[rp.len() - LEAD.min(rp.len())..].iter().sum();
    let value = corr * recent * 100.0;

    SignalComponent {
        name: NAME,
        value,
        weight: BASE_WEIGHT,
        z_score: corr,
    }
}

fn flat() -> SignalComponent {
    SignalComponent {
        name: NAME,
        value: 0.0,
        weight: BASE_WEIGHT,
        z_score: 0.0,
    }
}
