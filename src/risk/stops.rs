use crate::types::{Position, PositionSide, StopKind};

/// Stop parameters. Defaults per the exit policy: 3% fixed, 3σ vol stop,
/// 0.5% take-profit, trailing armed at half the TP distance, 120s max hold
/// (30s for the microstructure confluence strategy).
#[derive(Clone, Debug)]
pub struct StopConfig {
    pub fixed_frac: f64,
    pub vol_sigma_mult: f64,
    pub take_profit_frac: f64,
    /// Give-back fraction of the favorable excursion once trailing is armed.
    pub trail_give_back: f64,
    pub max_hold_ms: i64,
    pub micro_max_hold_ms: i64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            fixed_frac: 0.03,
            vol_sigma_mult: 3.0,
            take_profit_frac: 0.005,
            trail_give_back: 0.5,
            max_hold_ms: 120_000,
            micro_max_hold_ms: 30_000,
        }
    }
}

/// A triggered stop: which rule fired and the price it fired at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StopHit {
    pub kind: StopKind,
    pub stop_price: f64,
}

/// Evaluates the four stops plus take-profit per open position.
/// Check order is fixed — the first rule that is hit wins.
pub struct StopLossManager {
    config: StopConfig,
}

impl StopLossManager {
    pub fn new(config: StopConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(StopConfig::default())
    }

    fn max_hold_for(&self, strategy: &str) -> i64 {
        if strategy == crate::strategies::confluence::ID {
            self.config.micro_max_hold_ms
        } else {
            self.config.max_hold_ms
        }
    }

    /// First stop hit for this position, if any.
    pub fn evaluate(&self, pos: &Position, now_ms: i64) -> Option<StopHit> {
        let entry = pos.entry_price;
        let price = pos.current_price;
        if entry <= 0.0 || price <= 0.0 {
            return None;
        }
        let c = &self.config;

        match pos.side {
            PositionSide::Long => {
                let fixed = entry * (1.0 - c.fixed_frac);
                if price <= fixed {
                    return Some(StopHit { kind: StopKind::Fixed, stop_price: fixed });
                }
                let vol_stop = entry * (1.0 - c.vol_sigma_mult * pos.entry_vol);
                if pos.entry_vol > 0.0 && price <= vol_stop {
                    return Some(StopHit { kind: StopKind::VolAdjusted, stop_price: vol_stop });
                }
                // Trailing arms once price has covered half the TP distance.
                let activation = entry * (1.0 + 0.5 * c.take_profit_frac);
                if pos.max_price >= activation {
                    let trail = pos.max_price - c.trail_give_back * (pos.max_price - entry);
                    if price <= trail {
                        return Some(StopHit { kind: StopKind::Trailing, stop_price: trail });
                    }
                }
                if now_ms - pos.opened_ms >= self.max_hold_for(&pos.strategy) {
                    return Some(StopHit { kind: StopKind::Time, stop_price: price });
                }
                let tp = entry * (1.0 + c.take_profit_frac);
                if price >= tp {
                    return Some(StopHit { kind: StopKind::TakeProfit, stop_price: tp });
                }
            }
            PositionSide::Short => {
                let fixed = entry * (1.0 + c.fixed_frac);
                if price >= fixed {
                    return Some(StopHit { kind: StopKind::Fixed, stop_price: fixed });
                }
                let vol_stop = entry * (1.0 + c.vol_sigma_mult * pos.entry_vol);
                if pos.entry_vol > 0.0 && price >= vol_stop {
                    return Some(StopHit { kind: StopKind::VolAdjusted, stop_price: vol_stop });
                }
                let activation = entry * (1.0 - 0.5 * c.take_profit_frac);
                if pos.min_price <= activation {
                    let trail = pos.min_price + c.trail_give_back * (entry - pos.min_price);
                    if price >= trail {
                        return Some(StopHit { kind: StopKind::Trailing, stop_price: trail });
                    }
                }
                if now_ms - pos.opened_ms >= self.max_hold_for(&pos.strategy) {
                    return Some(StopHit { kind: StopKind::Time, stop_price: price });
                }
                let tp = entry * (1.0 - c.take_profit_frac);
                if price <= tp {
                    return Some(StopHit { kind: StopKind::TakeProfit, stop_price: tp });
                }
            }
        }
        None
    }
}
