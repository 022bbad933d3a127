use crate::math::vpin::TOXIC_THRESHOLD;
use crate::mm::inventory::InventoryState;
use crate::types::OrderSide;

/// Avellaneda–Stoikov quote parameters.
#[derive(Clone, Debug)]
pub struct QuoteParams {
    /// Risk aversion γ.
    pub gamma: f64,
    /// Order-arrival intensity κ.
    pub kappa: f64,
    pub min_spread_bps: f64,
    pub max_spread_bps: f64,
    /// Spread multiplier when flow turns toxic (VPIN > 0.70).
    pub toxic_widen: f64,
    /// Inventory skew coefficient α.
    pub skew_alpha: f64,
    pub base_size_usd: f64,
    pub min_qty_usd: f64,
    pub max_qty_usd: f64,
    /// |q| at which a normal hedge engages.
    pub hedge_threshold: f64,
    /// |q| at which the wrong side is pulled and hedging turns urgent.
    pub urgent_threshold: f64,
    pub max_daily_loss_usd: f64,
}

impl Default for QuoteParams {
    fn default() -> Self {
        Self {
            gamma: 0.5,
            kappa: 200.0,
            min_spread_bps: 5.0,
            max_spread_bps: 500.0,
            toxic_widen: 2.5,
            skew_alpha: 0.3,
            base_size_usd: 3.0,
            min_qty_usd: 1.0,
            max_qty_usd: 8.0,
            hedge_threshold: 0.6,
            urgent_threshold: 0.9,
            max_daily_loss_usd: 25.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub size_usd: f64,
}

/// One round of quotes. A pulled side is None.
#[derive(Clone, Debug)]
pub struct QuotePair {
    pub bid: Option<Quote>,
    pub ask: Option<Quote>,
    pub reservation: f64,
    pub spread_bps: f64,
    pub skew: f64,
}

/// Inventory rebalance intent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HedgeIntent {
    pub side: OrderSide,
    pub size_usd: f64,
    pub urgent: bool,
}

/// Closed-form inventory-aware quoting:
///   r  = mid − q·γ·σ²·T
///   δ* = γσ²T + (2/γ)·ln(1 + γ/κ)
/// with the spread in bps clamped to [min, max], widened under toxic flow,
/// and sizes sculpted so the book leans away from the inventory.
pub struct QuoteEngine {
    pub params: QuoteParams,
}

impl QuoteEngine {
    pub fn new(params: QuoteParams) -> Self {
        Self { params }
    }

    pub fn with_defaults() -> Self {
        Self::new(QuoteParams::default())
    }

    /// Produce quotes for one market, or None when standing down entirely
    /// (daily-loss circuit, bad mid).
    pub fn quotes(
        &self,
        mid: f64,
        sigma: f64,
        inv: &InventoryState,
        vpin: f64,
        daily_pnl: f64,
    ) -> Option<QuotePair> {
        let p = &self.params;
        if daily_pnl <= -p.max_daily_loss_usd {
            return None;
        }
        if mid <= 0.0 || mid >= 1.0 {
            return None;
        }

        let q = inv.q_norm();
        let t = 1.0; // continuous market: no terminal-time decay
        let sigma_sq = sigma * sigma;

        let reservation = mid - q * p.gamma * sigma_sq * t;
        let delta_star = p.gamma * sigma_sq * t + (2.0 / p.gamma) * (1.0 + p.gamma / p.kappa).ln();

        let mut spread_bps = (delta_star / mid * 10_000.0).clamp(p.min_spread_bps, p.max_spread_bps);
        if vpin > TOXIC_THRESHOLD {
            spread_bps *= p.toxic_widen;
        }

        let half = mid * spread_bps / 10_000.0 / 2.0;
        let skew = -p.skew_alpha * q * mid * 0.01;

        let bid_px = reservation - half + skew;
        let ask_px = reservation + half + skew;
        if bid_px >= ask_px || bid_px <= 0.0 || ask_px >= 1.0 {
            return None;
        }

        // Size sculpting: shrink the side that would grow the inventory,
        // boost the side that sheds it.
        let reduce = 1.0 - 0.7 * q.abs();
        let boost = (2.0 - reduce).min(2.0);
        let (bid_mult, ask_mult) = if q >= 0.0 {
            (reduce, boost) // long: buying more is the wrong side
        } else {
            (boost, reduce)
        };

        let pull_wrong_side = q.abs() >= p.urgent_threshold;
        let bid = if pull_wrong_side && q > 0.0 {
            None
        } else {
            Some(Quote {
                price: bid_px,
                size_usd: (p.base_size_usd * bid_mult).clamp(p.min_qty_usd, p.max_qty_usd),
            })
        };
        let ask = if pull_wrong_side && q < 0.0 {
            None
        } else {
            Some(Quote {
                price: ask_px,
                size_usd: (p.base_size_usd * ask_mult).clamp(p.min_qty_usd, p.max_qty_usd),
            })
        };

        Some(QuotePair {
            bid,
            ask,
            reservation,
            spread_bps,
            skew,
        })
    }

    /// Hedge intent from current inventory: urgent beyond the 0.9 band
    /// (shed half the excess), normal beyond the hedge threshold (come back
    /// to half the threshold).
    pub fn hedge(&self, inv: &InventoryState) -> Option<HedgeIntent> {
        let p = &self.params;
        let q = inv.q_norm();
        let side = if inv.position_usd > 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };

        if q.abs() >= p.urgent_threshold {
            return Some(HedgeIntent {
                side,
                size_usd: inv.position_usd.abs() / 2.0,
                urgent: true,
            });
        }
        if q.abs() >= p.hedge_threshold {
            let target = p.hedge_threshold / 2.0 * inv.max_position_usd;
            let size = inv.position_usd.abs() - target;
            if size > 0.0 {
                return Some(HedgeIntent {
                    side,
                    size_usd: size,
                    urgent: false,
                });
            }
        }
        None
    }
}
