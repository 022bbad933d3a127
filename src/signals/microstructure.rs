use crate::market::book::{Book, TOP_LEVELS};
use crate::math::stats;
use crate::types::SignalComponent;

pub const NAME: &str = "microstructure";

const BASE_WEIGHT: f64 = 0.8;
const OFI_EMA_PERIOD: usize = 10;

/// Order-flow read on the current book:
///   0.6·OFI + 30·(microprice − mid)/mid + 0.1·EMA(OFI history).
/// OFI is depth imbalance over the top 5 levels; the microprice term captures
/// where size says the price should print.
pub fn generate(book: &Book, ofi_history: &[f64]) -> SignalComponent {
    let mid = book.mid();
    if mid <= 0.0 {
        return SignalComponent {
            name: NAME,
            value: 0.0,
            weight: BASE_WEIGHT,
            z_score: 0.0,
        };
    }

    let ofi = book.flow_imbalance(TOP_LEVELS);
    let micro = book.microprice();
    let micro_tilt = if micro > 0.0 { (micro - mid) / mid } else { 0.0 };
    let ofi_ema = stats::ema(ofi_history, OFI_EMA_PERIOD);

    let value = 0.6 * ofi + 30.0 * micro_tilt + 0.1 * ofi_ema;
    SignalComponent {
        name: NAME,
        value,
        weight: BASE_WEIGHT,
        z_score: value,
    }
}
