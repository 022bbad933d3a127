use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::RiskLevel;
use crate::math::stats;
use crate::types::{Opportunity, OpportunityKind};

/// Trade records kept for the rolling loss windows.
const TRADE_WINDOW_CAPACITY: usize = 5000;
/// Per-asset trade returns kept for correlation and VaR.
const RETURN_WINDOW: usize = 50;
/// Kill-switch cooldowns armed by the rolling loss checks.
const KILL_1M_COOLDOWN_MS: i64 = 60_000;
const KILL_1H_COOLDOWN_MS: i64 = 300_000;
/// Minimum approvable order.
const MIN_ORDER_USD: f64 = 1.0;
/// Trade returns required before the VaR check engages.
const VAR_MIN_SAMPLES: usize = 20;
/// Reference feed older than this denies new risk.
const STALE_FEED_MS: i64 = 5_000;

// ─── Limits ─────────────────────────────────────────────────────────────────

/// Limit table selected by risk level.
#[derive(Clone, Debug)]
pub struct RiskLimits {
    pub max_trade_size_usd: f64,
    pub per_asset_cap_usd: f64,
    pub total_cap_usd: f64,
    pub concurrent_cap: usize,
    pub max_1m_loss_usd: f64,
    pub max_1h_loss_usd: f64,
    pub drawdown_halt_usd: f64,
    pub daily_loss_cap_usd: f64,
    pub hourly_loss_cap_usd: f64,
    /// Order may take at most this fraction of resting book depth.
    pub liquidity_frac: f64,
    pub corr_cap: f64,
    pub var95_cap: f64,
}

impl RiskLimits {
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Conservative => Self {
                max_trade_size_usd: 10.0,
                per_asset_cap_usd: 30.0,
                total_cap_usd: 75.0,
                concurrent_cap: 5,
                max_1m_loss_usd: 10.0,
                max_1h_loss_usd: 50.0,
                drawdown_halt_usd: 40.0,
                daily_loss_cap_usd: 50.0,
                hourly_loss_cap_usd: 50.0,
                liquidity_frac: 0.30,
                corr_cap: 0.70,
                var95_cap: 0.15,
            },
            RiskLevel::Moderate => Self {
                max_trade_size_usd: 25.0,
                per_asset_cap_usd: 75.0,
                total_cap_usd: 150.0,
                concurrent_cap: 10,
                max_1m_loss_usd: 20.0,
                max_1h_loss_usd: 100.0,
                drawdown_halt_usd: 80.0,
                daily_loss_cap_usd: 100.0,
                hourly_loss_cap_usd: 100.0,
                liquidity_frac: 0.30,
                corr_cap: 0.70,
                var95_cap: 0.15,
            },
            RiskLevel::Aggressive => Self {
                max_trade_size_usd: 50.0,
                per_asset_cap_usd: 150.0,
                total_cap_usd: 300.0,
                concurrent_cap: 20,
                max_1m_loss_usd: 40.0,
                max_1h_loss_usd: 200.0,
                drawdown_halt_usd: 160.0,
                daily_loss_cap_usd: 200.0,
                hourly_loss_cap_usd: 200.0,
                liquidity_frac: 0.30,
                corr_cap: 0.70,
                var95_cap: 0.15,
            },
        }
    }

    /// Per-strategy pacing: cooldown between orders and a cap per market.
    /// Quoting strategies refresh every tick; takers are throttled.
    pub fn pacing(&self, strategy: &str) -> StrategyPacing {
        match strategy {
            "structural_arb" => StrategyPacing { cooldown_ms: 0, max_orders_per_market: 40 },
            "latency_arb" => StrategyPacing { cooldown_ms: 5_000, max_orders_per_market: 10 },
            "spread_capture" => StrategyPacing { cooldown_ms: 2_000, max_orders_per_market: 500 },
            "confluence" => StrategyPacing { cooldown_ms: 10_000, max_orders_per_market: 10 },
            "quant" => StrategyPacing { cooldown_ms: 30_000, max_orders_per_market: 20 },
            _ => StrategyPacing { cooldown_ms: 0, max_orders_per_market: 10_000 },
        }
    }

    /// Minimum edge per opportunity class (1–3%).
    pub fn min_edge(&self, kind: OpportunityKind) -> f64 {
        match kind {
            OpportunityKind::StructuralArb => 0.01,
            OpportunityKind::CrossBookArb => 0.015,
            OpportunityKind::LatencyArb => 0.03,
            OpportunityKind::SpreadCapture => 0.01,
            OpportunityKind::Confluence => 0.02,
            OpportunityKind::QuantSignal => 0.02,
            OpportunityKind::MmQuote => 0.005,
            // Exits and hedges reduce risk; they are not edge-gated.
            OpportunityKind::Hedge | OpportunityKind::StopExit => 0.0,
        }
    }
}

/// Pacing knobs for one strategy.
#[derive(Clone, Copy, Debug)]
pub struct StrategyPacing {
    pub cooldown_ms: i64,
    pub max_orders_per_market: u32,
}

// ─── Verdicts ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum DenyReason {
    /// Kill-switch cooldown active; seconds remaining attached.
    KillSwitch { remaining_s: f64 },
    Halted { reason: String },
    EdgeTooThin { edge: f64, min: f64 },
    NearResolution { seconds_left: f64 },
    AssetCapExceeded,
    TotalCapExceeded,
    TooManyOrders,
    Loss1mLimit,
    Loss1hLimit,
    DailyLossCap,
    HourlyLossCap,
    InsufficientLiquidity,
    CorrelationCap { corr: f64 },
    VarCap { var95: f64 },
    Cooldown { remaining_ms: i64 },
    MarketOrderCap,
    StaleFeed { age_ms: i64 },
    EdgeDecayHalted,
    SizeTooSmall,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::KillSwitch { remaining_s } => {
                write!(f, "kill switch active ({remaining_s:.0}s remaining)")
            }
            DenyReason::Halted { reason } => write!(f, "trading halted: {reason}"),
            DenyReason::EdgeTooThin { edge, min } => write!(f, "edge {edge:.4} < min {min:.4}"),
            DenyReason::NearResolution { seconds_left } => {
                write!(f, "{seconds_left:.0}s to resolution")
            }
            DenyReason::AssetCapExceeded => write!(f, "per-asset cap exceeded"),
            DenyReason::TotalCapExceeded => write!(f, "total exposure cap exceeded"),
            DenyReason::TooManyOrders => write!(f, "concurrent order cap reached"),
            DenyReason::Loss1mLimit => write!(f, "1-minute loss limit breached"),
            DenyReason::Loss1hLimit => write!(f, "1-hour loss limit breached"),
            DenyReason::DailyLossCap => write!(f, "daily loss cap breached"),
            DenyReason::HourlyLossCap => write!(f, "hourly loss cap breached"),
            DenyReason::InsufficientLiquidity => write!(f, "order too large for book depth"),
            DenyReason::CorrelationCap { corr } => write!(f, "pairwise correlation {corr:.2} over cap"),
            DenyReason::VarCap { var95 } => write!(f, "VaR95 {var95:.3} over cap"),
            DenyReason::Cooldown { remaining_ms } => {
                write!(f, "strategy cooling down ({remaining_ms}ms left)")
            }
            DenyReason::MarketOrderCap => write!(f, "per-market order cap reached"),
            DenyReason::StaleFeed { age_ms } => write!(f, "reference feed stale ({age_ms}ms)"),
            DenyReason::EdgeDecayHalted => write!(f, "strategy halted by edge decay"),
            DenyReason::SizeTooSmall => write!(f, "size below minimum after clamps"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RiskVerdict {
    Approved { size_usd: f64 },
    Denied { reason: DenyReason },
}

impl RiskVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskVerdict::Approved { .. })
    }

    pub fn approved_size(&self) -> Option<f64> {
        match self {
            RiskVerdict::Approved { size_usd } => Some(*size_usd),
            RiskVerdict::Denied { .. } => None,
        }
    }
}

/// Portfolio facts the gate needs per check, assembled by the tick engine.
#[derive(Clone, Debug, Default)]
pub struct PortfolioView {
    /// Current gross exposure on the opportunity's asset.
    pub asset_exposure_usd: f64,
    pub total_exposure_usd: f64,
    pub open_order_count: usize,
    /// Resting notional on the touched side of the book.
    pub book_depth_usd: f64,
    pub time_to_resolution_s: f64,
    /// Age of the newest reference-feed sample for this asset.
    pub ref_age_ms: i64,
    /// Edge-decay multiplier for the emitting strategy.
    pub edge_multiplier: f64,
}

// ─── Gate ───────────────────────────────────────────────────────────────────

/// Ordered per-opportunity checks plus the portfolio loss ledger.
/// First denial wins; sizes are clamped, then scaled by edge decay.
pub struct RiskGate {
    pub limits: RiskLimits,
    kill_until_ms: i64,
    trading_halted: bool,
    halt_reason: Option<String>,

    trades: VecDeque<(i64, f64)>,
    equity: f64,
    peak_equity: f64,
    daily_pnl: f64,
    daily_date: String,
    returns_by_asset: HashMap<String, VecDeque<f64>>,

    last_order_ms: HashMap<String, i64>,
    orders_per_market: HashMap<(String, String), u32>,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            kill_until_ms: 0,
            trading_halted: false,
            halt_reason: None,
            trades: VecDeque::with_capacity(256),
            equity: 0.0,
            peak_equity: 0.0,
            daily_pnl: 0.0,
            daily_date: String::new(),
            returns_by_asset: HashMap::new(),
            last_order_ms: HashMap::new(),
            orders_per_market: HashMap::new(),
        }
    }

    // ── Ordered per-opportunity gate ──

    pub fn check(&mut self, opp: &Opportunity, view: &PortfolioView, now_ms: i64) -> RiskVerdict {
        // 1. Kill switch / halt latch.
        if self.trading_halted {
            return self.deny(opp, DenyReason::Halted {
                reason: self.halt_reason.clone().unwrap_or_default(),
            });
        }
        if now_ms < self.kill_until_ms {
            let remaining_s = (self.kill_until_ms - now_ms) as f64 / 1000.0;
            return self.deny(opp, DenyReason::KillSwitch { remaining_s });
        }

        // 2. Minimum edge per strategy class.
        let min_edge = self.limits.min_edge(opp.kind);
        if opp.edge < min_edge {
            return self.deny(opp, DenyReason::EdgeTooThin { edge: opp.edge, min: min_edge });
        }

        // 3. Too close to resolution.
        if view.time_to_resolution_s < 60.0 {
            return self.deny(opp, DenyReason::NearResolution {
                seconds_left: view.time_to_resolution_s,
            });
        }

        // 4. Clamp to the per-trade maximum.
        let mut size = opp.size_usd.min(self.limits.max_trade_size_usd);

        // 5. Per-asset inventory cap.
        if view.asset_exposure_usd + size > self.limits.per_asset_cap_usd {
            let room = self.limits.per_asset_cap_usd - view.asset_exposure_usd;
            if room < MIN_ORDER_USD {
                return self.deny(opp, DenyReason::AssetCapExceeded);
            }
            size = size.min(room);
        }

        // 6. Total exposure cap.
        if view.total_exposure_usd + size > self.limits.total_cap_usd {
            let room = self.limits.total_cap_usd - view.total_exposure_usd;
            if room < MIN_ORDER_USD {
                return self.deny(opp, DenyReason::TotalCapExceeded);
            }
            size = size.min(room);
        }

        // 7. Concurrent order cap.
        if view.open_order_count >= self.limits.concurrent_cap {
            return self.deny(opp, DenyReason::TooManyOrders);
        }

        // 8. Rolling 1-minute loss — arms the kill switch.
        if self.pnl_within(60_000, now_ms) < -self.limits.max_1m_loss_usd {
            self.arm_kill(KILL_1M_COOLDOWN_MS, now_ms, "1m loss limit");
            return self.deny(opp, DenyReason::Loss1mLimit);
        }

        // 9. Rolling 1-hour loss — longer cooldown.
        if self.pnl_within(3_600_000, now_ms) < -self.limits.max_1h_loss_usd {
            self.arm_kill(KILL_1H_COOLDOWN_MS, now_ms, "1h loss limit");
            return self.deny(opp, DenyReason::Loss1hLimit);
        }

        // ── Pacing ──

        let pacing = self.limits.pacing(opp.strategy);
        if pacing.cooldown_ms > 0 {
            if let Some(&last) = self.last_order_ms.get(opp.strategy) {
                let elapsed = now_ms - last;
                if elapsed < pacing.cooldown_ms {
                    return self.deny(opp, DenyReason::Cooldown {
                        remaining_ms: pacing.cooldown_ms - elapsed,
                    });
                }
            }
        }
        let market_key = (opp.strategy.to_string(), opp.condition_id.clone());
        if self.orders_per_market.get(&market_key).copied().unwrap_or(0)
            >= pacing.max_orders_per_market
        {
            return self.deny(opp, DenyReason::MarketOrderCap);
        }

        // Quoting against a dead reference feed is how books get picked off.
        if view.ref_age_ms > STALE_FEED_MS {
            return self.deny(opp, DenyReason::StaleFeed { age_ms: view.ref_age_ms });
        }

        // ── Portfolio layer ──

        if self.daily_pnl < -self.limits.daily_loss_cap_usd {
            return self.deny(opp, DenyReason::DailyLossCap);
        }
        if self.pnl_within(3_600_000, now_ms) < -self.limits.hourly_loss_cap_usd {
            return self.deny(opp, DenyReason::HourlyLossCap);
        }

        // Liquidity: never take more than a fraction of the resting depth.
        if view.book_depth_usd > 0.0 {
            let depth_room = view.book_depth_usd * self.limits.liquidity_frac;
            if depth_room < MIN_ORDER_USD {
                return self.deny(opp, DenyReason::InsufficientLiquidity);
            }
            size = size.min(depth_room);
        }

        // Pairwise correlation against other held assets.
        if view.asset_exposure_usd < view.total_exposure_usd {
            if let Some(corr) = self.max_pairwise_correlation(&opp.asset) {
                if corr > self.limits.corr_cap {
                    return self.deny(opp, DenyReason::CorrelationCap { corr });
                }
            }
        }

        // Historical VaR95 of trade returns.
        if let Some(var95) = self.var95(&opp.asset) {
            if var95 > self.limits.var95_cap {
                return self.deny(opp, DenyReason::VarCap { var95 });
            }
        }

        // Edge-decay scaling last.
        if view.edge_multiplier <= 0.0 {
            return self.deny(opp, DenyReason::EdgeDecayHalted);
        }
        size *= view.edge_multiplier;
        if size < MIN_ORDER_USD {
            return self.deny(opp, DenyReason::SizeTooSmall);
        }

        RiskVerdict::Approved { size_usd: size }
    }

    fn deny(&self, opp: &Opportunity, reason: DenyReason) -> RiskVerdict {
        // Denials are normal control flow, not errors.
        debug!(strategy = opp.strategy, %reason, "opportunity denied");
        RiskVerdict::Denied { reason }
    }

    /// Note a dispatched order for the pacing state. Called by the engine
    /// once an approved opportunity actually produces an order.
    pub fn on_order_sent(&mut self, strategy: &str, condition_id: &str, now_ms: i64) {
        self.last_order_ms.insert(strategy.to_string(), now_ms);
        *self
            .orders_per_market
            .entry((strategy.to_string(), condition_id.to_string()))
            .or_insert(0) += 1;
    }

    // ── Ledger ──

    /// Record a realized trade. Rolls the daily window on UTC date change and
    /// latches the drawdown halt when breached.
    pub fn record_trade(&mut self, asset: &str, pnl: f64, size_usd: f64, utc_date: &str, now_ms: i64) {
        if self.daily_date != utc_date {
            self.daily_date = utc_date.to_string();
            self.daily_pnl = 0.0;
        }
        self.daily_pnl += pnl;

        if self.trades.len() == TRADE_WINDOW_CAPACITY {
            self.trades.pop_front();
        }
        self.trades.push_back((now_ms, pnl));

        self.equity += pnl;
        self.peak_equity = self.peak_equity.max(self.equity);
        let drawdown = self.peak_equity - self.equity;
        if drawdown >= self.limits.drawdown_halt_usd && !self.trading_halted {
            self.halt(&format!("drawdown ${drawdown:.0} from peak"));
        }

        if size_usd > 0.0 {
            let ring = self
                .returns_by_asset
                .entry(asset.to_string())
                .or_insert_with(|| VecDeque::with_capacity(RETURN_WINDOW));
            if ring.len() == RETURN_WINDOW {
                ring.pop_front();
            }
            ring.push_back(pnl / size_usd);
        }
    }

    fn pnl_within(&self, window_ms: i64, now_ms: i64) -> f64 {
        let cutoff = now_ms - window_ms;
        self.trades
            .iter()
            .filter(|(ts, _)| *ts >= cutoff)
            .map(|(_, pnl)| pnl)
            .sum()
    }

    /// Highest correlation between this asset's returns and any other
    /// tracked asset's. None until two assets have overlapping history.
    fn max_pairwise_correlation(&self, asset: &str) -> Option<f64> {
        let own = self.returns_by_asset.get(asset)?;
        if own.len() < 10 {
            return None;
        }
        let own: Vec<f64> = own.iter().copied().collect();
        let mut max_corr: Option<f64> = None;
        for (other_asset, ring) in &self.returns_by_asset {
            if other_asset == asset || ring.len() < 10 {
                continue;
            }
            let n = own.len().min(ring.len());
            let a = &own[own.len() - n..];
            let b: Vec<f64> = ring.iter().skip(ring.len() - n).copied().collect();
            let corr = stats::correlation(a, &b);
            max_corr = Some(max_corr.map_or(corr, |m: f64| m.max(corr)));
        }
        max_corr
    }

    /// Historical VaR95: magnitude of the 5th-percentile trade return.
    fn var95(&self, asset: &str) -> Option<f64> {
        let ring = self.returns_by_asset.get(asset)?;
        if ring.len() < VAR_MIN_SAMPLES {
            return None;
        }
        let mut returns: Vec<f64> = ring.iter().copied().collect();
        returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((returns.len() as f64) * 0.05).floor() as usize;
        Some((-returns[idx.min(returns.len() - 1)]).max(0.0))
    }

    // ── Kill switch / halt ──

    pub fn arm_kill(&mut self, duration_ms: i64, now_ms: i64, why: &str) {
        self.kill_until_ms = self.kill_until_ms.max(now_ms + duration_ms);
        warn!(duration_ms, why, "kill switch armed");
    }

    pub fn kill_remaining_s(&self, now_ms: i64) -> f64 {
        ((self.kill_until_ms - now_ms).max(0)) as f64 / 1000.0
    }

    /// Latch the halt. Only `resume_trading` clears it.
    pub fn halt(&mut self, reason: &str) {
        self.trading_halted = true;
        self.halt_reason = Some(reason.to_string());
        error!(reason, "trading halted");
    }

    pub fn is_halted(&self) -> bool {
        self.trading_halted
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Explicit operator unhalt. Past PnL state is left untouched.
    pub fn resume_trading(&mut self) {
        self.trading_halted = false;
        self.halt_reason = None;
    }

    pub fn daily_pnl(&self) -> f64 {
        self.daily_pnl
    }

    /// Snapshot copy for dashboards.
    pub fn status(&self, now_ms: i64) -> RiskGateStatus {
        RiskGateStatus {
            equity: self.equity,
            peak_equity: self.peak_equity,
            drawdown: self.peak_equity - self.equity,
            daily_pnl: self.daily_pnl,
            halted: self.trading_halted,
            halt_reason: self.halt_reason.clone(),
            kill_remaining_s: self.kill_remaining_s(now_ms),
        }
    }
}

/// Serializable view of the gate's loss ledger and latches.
#[derive(Clone, Debug, Serialize)]
pub struct RiskGateStatus {
    pub equity: f64,
    pub peak_equity: f64,
    pub drawdown: f64,
    pub daily_pnl: f64,
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub kill_remaining_s: f64,
}
