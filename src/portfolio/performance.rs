use std::collections::VecDeque;

use serde::Serialize;

use crate::math::stats;
use crate::types::TradeRecord;

/// Closed trades retained.
const TRADE_CAPACITY: usize = 5000;

/// Profit factor reported when there are profits and no losses.
const PF_NO_LOSSES: f64 = 999.0;

/// Per-window, per-strategy performance rollup. Values are raw; display
/// layers round to two decimals.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PerfReport {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub net_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub win_rate: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub avg_hold_ms: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl PerfReport {
    /// Display copy with every metric rounded to two decimals. Internal
    /// consumers keep the raw values.
    pub fn rounded(&self) -> PerfReport {
        fn r2(v: f64) -> f64 {
            (v * 100.0).round() / 100.0
        }
        PerfReport {
            net_pnl: r2(self.net_pnl),
            gross_profit: r2(self.gross_profit),
            gross_loss: r2(self.gross_loss),
            profit_factor: r2(self.profit_factor),
            win_rate: r2(self.win_rate),
            sharpe: r2(self.sharpe),
            sortino: r2(self.sortino),
            max_drawdown: r2(self.max_drawdown),
            avg_hold_ms: r2(self.avg_hold_ms),
            largest_win: r2(self.largest_win),
            largest_loss: r2(self.largest_loss),
            ..self.clone()
        }
    }
}

/// Rolling trade store with on-demand metric computation.
pub struct PerformanceTracker {
    trades: VecDeque<TradeRecord>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            trades: VecDeque::with_capacity(256),
        }
    }

    pub fn record(&mut self, trade: TradeRecord) {
        if self.trades.len() == TRADE_CAPACITY {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Last `n` trade PnLs for one strategy, oldest first (edge-decay input).
    pub fn recent_pnls(&self, strategy: &str, n: usize) -> Vec<f64> {
        let mut pnls: Vec<f64> = self
            .trades
            .iter()
            .filter(|t| t.strategy == strategy)
            .map(|t| t.pnl)
            .collect();
        if pnls.len() > n {
            pnls.drain(..pnls.len() - n);
        }
        pnls
    }

    /// Sum of PnL for trades closed within the trailing window.
    pub fn pnl_within(&self, window_ms: i64, now_ms: i64) -> f64 {
        let cutoff = now_ms - window_ms;
        self.trades
            .iter()
            .filter(|t| t.closed_ms >= cutoff)
            .map(|t| t.pnl)
            .sum()
    }

    /// Full report, optionally filtered by strategy and trailing window.
    pub fn report(&self, strategy: Option<&str>, window_ms: Option<i64>, now_ms: i64) -> PerfReport {
        let cutoff = window_ms.map(|w| now_ms - w);
        let selected: Vec<&TradeRecord> = self
            .trades
            .iter()
            .filter(|t| strategy.map_or(true, |s| t.strategy == s))
            .filter(|t| cutoff.map_or(true, |c| t.closed_ms >= c))
            .collect();

        let n = selected.len();
        if n == 0 {
            return PerfReport::default();
        }

        let pnls: Vec<f64> = selected.iter().map(|t| t.pnl).collect();
        let wins = pnls.iter().filter(|&&p| p > 0.0).count() as u32;
        let losses = pnls.iter().filter(|&&p| p < 0.0).count() as u32;
        let net_pnl: f64 = pnls.iter().sum();
        let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = -pnls.iter().filter(|&&p| p < 0.0).sum::<f64>();

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            PF_NO_LOSSES
        } else {
            0.0
        };

        // Annualization from observed trade frequency: trades_per_hour * 8760.
        let span_ms = (selected.last().unwrap().closed_ms
            - selected.first().unwrap().closed_ms)
            .max(1);
        let trades_per_hour = n as f64 / (span_ms as f64 / 3_600_000.0);
        let ann = (trades_per_hour * 8760.0).sqrt();

        let mean_pnl = stats::mean(&pnls);
        let sd = stats::stddev(&pnls);
        let sharpe = if sd > 0.0 { mean_pnl / sd * ann } else { 0.0 };

        let downside: f64 =
            (pnls.iter().map(|p| p.min(0.0).powi(2)).sum::<f64>() / n as f64).sqrt();
        let sortino = if downside > 0.0 {
            mean_pnl / downside * ann
        } else {
            0.0
        };

        // Peak-to-trough on the cumulative PnL path.
        let mut cum: f64 = 0.0;
        let mut peak: f64 = 0.0;
        let mut max_drawdown: f64 = 0.0;
        for p in &pnls {
            cum += p;
            peak = peak.max(cum);
            max_drawdown = max_drawdown.max(peak - cum);
        }

        let avg_hold_ms =
            selected.iter().map(|t| t.hold_ms() as f64).sum::<f64>() / n as f64;

        PerfReport {
            trades: n as u32,
            wins,
            losses,
            net_pnl,
            gross_profit,
            gross_loss,
            profit_factor,
            win_rate: wins as f64 / n as f64,
            sharpe,
            sortino,
            max_drawdown,
            avg_hold_ms,
            largest_win: pnls.iter().copied().fold(0.0, f64::max),
            largest_loss: pnls.iter().copied().fold(0.0, f64::min),
        }
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}
