use std::collections::VecDeque;

use crate::math::stats;

/// Rolling window of per-trade PnLs.
const WINDOW: usize = 100;
/// Below this many trades the monitor stays out of the way.
const MIN_TRADES: usize = 20;

/// Watches one strategy's rolling trade Sharpe and scales its size down as
/// the edge decays:
///   sharpe < −0.5 → 0.0 (halted)
///   sharpe <  0.5 → 0.5
///   sharpe <  1.0 → 0.75
///   else          → 1.0
pub struct EdgeDecayMonitor {
    pnls: VecDeque<f64>,
}

impl EdgeDecayMonitor {
    pub fn new() -> Self {
        Self {
            pnls: VecDeque::with_capacity(WINDOW),
        }
    }

    pub fn record(&mut self, pnl: f64) {
        if self.pnls.len() == WINDOW {
            self.pnls.pop_front();
        }
        self.pnls.push_back(pnl);
    }

    /// Mean/stddev of per-trade PnL over the window. 0 when degenerate.
    pub fn rolling_sharpe(&self) -> f64 {
        if self.pnls.len() < 2 {
            return 0.0;
        }
        let pnls: Vec<f64> = self.pnls.iter().copied().collect();
        let sd = stats::stddev(&pnls);
        if sd <= 0.0 {
            return 0.0;
        }
        stats::mean(&pnls) / sd
    }

    /// Size multiplier from the ladder. 1.0 until MIN_TRADES have accrued.
    pub fn multiplier(&self) -> f64 {
        if self.pnls.len() < MIN_TRADES {
            return 1.0;
        }
        let sharpe = self.rolling_sharpe();
        if sharpe < -0.5 {
            0.0
        } else if sharpe < 0.5 {
            0.5
        } else if sharpe < 1.0 {
            0.75
        } else {
            1.0
        }
    }

    pub fn is_halted(&self) -> bool {
        self.multiplier() == 0.0
    }

    pub fn trade_count(&self) -> usize {
        self.pnls.len()
    }
}

impl Default for EdgeDecayMonitor {
    fn default() -> Self {
        Self::new()
    }
}
