use serde::{Deserialize, Serialize};

// ─── Instruments ────────────────────────────────────────────────────────────

/// Venue class an instrument trades on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    /// Binary prediction-market CLOB (YES/NO outcome tokens).
    PredictionClob,
    /// Continuous perpetual-futures exchange (reference feed).
    PerpFutures,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::PredictionClob => write!(f, "clob"),
            Venue::PerpFutures => write!(f, "perp"),
        }
    }
}

/// Stable instrument identity: equality by value, string form "venue:symbol".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub venue: Venue,
    pub symbol: String,
}

impl InstrumentKey {
    pub fn new(venue: Venue, symbol: impl Into<String>) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
        }
    }
}

impl std::fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.venue, self.symbol)
    }
}

// ─── Market data ────────────────────────────────────────────────────────────

/// One immutable price observation. Timestamps are monotonic milliseconds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub volume: f64,
    pub ts_ms: i64,
}

/// Tradable market on the prediction CLOB: one condition, two outcome tokens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketMeta {
    pub asset: String,
    pub interval: String,
    pub condition_id: String,
    pub yes_token_id: String,
    pub no_token_id: String,
    /// Resolution time (wall-clock ms). Markets within 60s of this are inactive.
    pub end_ms: i64,
}

// ─── Signals ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Flat,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Flat => write!(f, "FLAT"),
        }
    }
}

/// One quant component's vote: raw value, base weight, and standardized score.
#[derive(Clone, Debug, Serialize)]
pub struct SignalComponent {
    pub name: &'static str,
    pub value: f64,
    /// Base weight in [0, 1], adjusted by the combiner from realized PnL.
    pub weight: f64,
    pub z_score: f64,
}

/// Combiner output: direction plus conviction/confidence pair.
#[derive(Clone, Debug, Serialize)]
pub struct AggregatedSignal {
    pub direction: Direction,
    /// Signed conviction in [-1, +1].
    pub conviction: f64,
    /// Agreement-based confidence in [0, 1].
    pub confidence: f64,
    pub expected_return_bps: f64,
    pub expected_hold_ms: i64,
    pub components: Vec<SignalComponent>,
}

// ─── Opportunities (strategy output) ────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Time-in-force. GTD carries its expiry in wall-clock ms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Tif {
    Fok,
    Gtc,
    Gtd(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunityKind {
    StructuralArb,
    CrossBookArb,
    LatencyArb,
    SpreadCapture,
    Confluence,
    QuantSignal,
    MmQuote,
    Hedge,
    StopExit,
}

/// Closed per-strategy metadata — each variant carries only what its
/// strategy needs. Wire-level dashboard records are built separately at the
/// boundary.
#[derive(Clone, Debug, Serialize)]
pub enum OpportunityMeta {
    Structural {
        yes_px: f64,
        no_px: f64,
        combined_cost: f64,
        /// Cross-book legs must fill together or not at all.
        requires_atomic: bool,
    },
    Latency {
        ref_change_10s: f64,
        expected_move: f64,
        actual_move: f64,
        lag: f64,
    },
    SpreadCapture {
        inventory_ratio: f64,
        quoted_spread: f64,
    },
    Confluence {
        agreeing: u32,
        vpin: f64,
    },
    Quant {
        conviction: f64,
    },
    MmQuote {
        reservation: f64,
        spread_bps: f64,
        skew: f64,
    },
    Hedge {
        urgent: bool,
    },
    StopExit {
        stop: StopKind,
    },
    None,
}

/// Trade intent emitted by a strategy, before the risk gate.
#[derive(Clone, Debug, Serialize)]
pub struct Opportunity {
    pub strategy: &'static str,
    pub kind: OpportunityKind,
    pub asset: String,
    pub condition_id: String,
    pub direction: Direction,
    pub token_id: String,
    pub side: OrderSide,
    pub price: f64,
    pub size_usd: f64,
    pub expected_profit: f64,
    pub confidence: f64,
    /// Expected profit per unit notional, net of fees.
    pub edge: f64,
    pub tif: Tif,
    pub meta: OpportunityMeta,
}

// ─── Orders & fills ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopLimit,
    Iceberg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    Created,
    Validated,
    Submitted,
    Acknowledged,
    PartialFill,
    Filled,
    Cancelled,
    Rejected,
    Expired,
    Error,
}

impl OrderState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Filled
                | OrderState::Cancelled
                | OrderState::Rejected
                | OrderState::Expired
        )
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderState::Created => "CREATED",
            OrderState::Validated => "VALIDATED",
            OrderState::Submitted => "SUBMITTED",
            OrderState::Acknowledged => "ACKNOWLEDGED",
            OrderState::PartialFill => "PARTIAL_FILL",
            OrderState::Filled => "FILLED",
            OrderState::Cancelled => "CANCELLED",
            OrderState::Rejected => "REJECTED",
            OrderState::Expired => "EXPIRED",
            OrderState::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Execution against an order. Appended once, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: u64,
    pub price: f64,
    pub size: f64,
    pub fee: f64,
    pub ts_ms: i64,
}

/// One entry in an order's state history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateChange {
    pub from: OrderState,
    pub to: OrderState,
    pub ts_ms: i64,
    pub reason: String,
}

/// An order and everything it owns: fills and state history.
/// Identity is `id`; `client_id` is the venue-facing idempotency key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub client_id: String,
    pub instrument: InstrumentKey,
    pub token_id: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub tif: Tif,
    pub price: f64,
    /// USD notional requested.
    pub size: f64,
    pub filled_size: f64,
    pub avg_fill_price: f64,
    pub state: OrderState,
    pub strategy: String,
    pub signal_id: Option<String>,
    pub fills: Vec<Fill>,
    pub state_history: Vec<StateChange>,
    pub created_ms: i64,
    pub updated_ms: i64,
}

impl Order {
    /// Remaining unfilled notional.
    pub fn remaining(&self) -> f64 {
        (self.size - self.filled_size).max(0.0)
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.created_ms).max(0)
    }
}

// ─── Positions ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// Tracked open position. PnL is carried in return units scaled by notional:
/// a LONG from 0.50 to 0.55 on $10 is (0.55-0.50)*10/0.50 = +$1.00.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub instrument: InstrumentKey,
    pub token_id: String,
    pub side: PositionSide,
    /// USD notional at entry.
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub strategy: String,
    pub order_id: u64,
    pub opened_ms: i64,
    /// Price extremes since open (for trailing stops).
    pub max_price: f64,
    pub min_price: f64,
    /// Realized vol at open (for the vol-adjusted stop).
    pub entry_vol: f64,
}

impl Position {
    /// Recompute unrealized PnL at `price` and update price extremes.
    pub fn mark(&mut self, price: f64) {
        if price <= 0.0 || self.entry_price <= 0.0 {
            return;
        }
        self.current_price = price;
        self.max_price = self.max_price.max(price);
        self.min_price = self.min_price.min(price);
        self.unrealized_pnl = match self.side {
            PositionSide::Long => (price - self.entry_price) * self.size / self.entry_price,
            PositionSide::Short => (self.entry_price - price) * self.size / self.entry_price,
        };
    }

    /// Signed return fraction at the current mark.
    pub fn return_frac(&self) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        match self.side {
            PositionSide::Long => (self.current_price - self.entry_price) / self.entry_price,
            PositionSide::Short => (self.entry_price - self.current_price) / self.entry_price,
        }
    }
}

// ─── Stops ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    Fixed,
    VolAdjusted,
    Trailing,
    Time,
    TakeProfit,
}

impl std::fmt::Display for StopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopKind::Fixed => "fixed",
            StopKind::VolAdjusted => "vol_adjusted",
            StopKind::Trailing => "trailing",
            StopKind::Time => "time",
            StopKind::TakeProfit => "take_profit",
        };
        write!(f, "{}", s)
    }
}

// ─── Closed-trade record (performance + edge decay + risk windows) ──────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy: String,
    pub asset: String,
    pub pnl: f64,
    pub size_usd: f64,
    pub opened_ms: i64,
    pub closed_ms: i64,
}

impl TradeRecord {
    pub fn hold_ms(&self) -> i64 {
        (self.closed_ms - self.opened_ms).max(0)
    }
}
