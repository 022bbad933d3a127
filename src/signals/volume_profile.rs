use crate::math::history::PriceHistory;
use crate::math::stats;
use crate::types::SignalComponent;

pub const NAME: &str = "volume_profile";

const RECENT_WINDOW: usize = 10;
const BASELINE_WINDOW: usize = 60;
const PRICE_VOL_WINDOW: usize = 20;
const CORR_WINDOW: usize = 30;
const BASE_WEIGHT: f64 = 0.5;

/// Volume-anomaly read on the reference feed:
/// - Volume surge (|z| > 2) while price vol stays under 0.1% → quiet
///   accumulation, +0.3.
/// - Volume up but volume/price correlation < −0.3 → distribution into
///   weakness, −0.2.
pub fn generate(history: &PriceHistory) -> SignalComponent {
    if history.len() < BASELINE_WINDOW {
        return flat(0.0);
    }

    let baseline = history.volumes_tail(BASELINE_WINDOW);
    let recent = history.volumes_tail(RECENT_WINDOW);
    let mu = stats::mean(&baseline);
    let sigma = stats::stddev(&baseline);
    if sigma <= 0.0 {
        return flat(0.0);
    }
    let z = (stats::mean(&recent) - mu) / sigma;

    let price_vol = history.realized_vol(PRICE_VOL_WINDOW);
    if z.abs() > 2.0 && price_vol < 0.001 {
        return SignalComponent {
            name: NAME,
            value: 0.3,
            weight: BASE_WEIGHT,
            z_score: z,
        };
    }

    let vp_corr = stats::correlation(
        &history.volumes_tail(CORR_WINDOW),
        &history.prices_tail(CORR_WINDOW),
    );
    if vp_corr < -0.3 && z > 0.0 {
        return SignalComponent {
            name: NAME,
            value: -0.2,
            weight: BASE_WEIGHT,
            z_score: z,
        };
    }

    flat(z)
}

fn flat(z: f64) -> SignalComponent {
    SignalComponent {
        name: NAME,
        value: 0.0,
        weight: BASE_WEIGHT,
        z_score: z,
    }
}
