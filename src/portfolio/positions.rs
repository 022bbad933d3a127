use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use crate::types::{InstrumentKey, Position, PositionSide, TradeRecord, Venue};

/// Closed positions retained for inspection.
const CLOSED_CAPACITY: usize = 1000;

/// Parameters for opening a position from a fill.
pub struct OpenPosition {
    pub instrument: InstrumentKey,
    pub token_id: String,
    pub side: PositionSide,
    pub size_usd: f64,
    pub entry_price: f64,
    pub strategy: String,
    pub order_id: u64,
    pub entry_vol: f64,
}

/// Tracks open positions, realizes PnL on close, and rolls up exposure.
/// Single writer: the tick thread. Dashboards read snapshot copies.
pub struct PositionBook {
    open: HashMap<String, Position>,
    closed: VecDeque<Position>,
    daily_realized: f64,
    daily_date: String,
}

impl PositionBook {
    pub fn new() -> Self {
        Self {
            open: HashMap::new(),
            closed: VecDeque::with_capacity(CLOSED_CAPACITY),
            daily_realized: 0.0,
            daily_date: String::new(),
        }
    }

    /// Open a position at its fill VWAP. Returns the position id.
    pub fn open(&mut self, spec: OpenPosition, now_ms: i64) -> String {
        let id = Uuid::new_v4().to_string();
        let pos = Position {
            id: id.clone(),
            instrument: spec.instrument,
            token_id: spec.token_id,
            side: spec.side,
            size: spec.size_usd,
            entry_price: spec.entry_price,
            current_price: spec.entry_price,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            strategy: spec.strategy,
            order_id: spec.order_id,
            opened_ms: now_ms,
            max_price: spec.entry_price,
            min_price: spec.entry_price,
            entry_vol: spec.entry_vol,
        };
        self.open.insert(id.clone(), pos);
        id
    }

    /// Mark every open position on `token_id` to `price`.
    pub fn mark_token(&mut self, token_id: &str, price: f64) {
        for pos in self.open.values_mut() {
            if pos.token_id == token_id {
                pos.mark(price);
            }
        }
    }

    /// Close a position at `exit_price`, realizing the signed PnL delta.
    /// Returns the closed-trade record, or None for an unknown id.
    pub fn close(&mut self, position_id: &str, exit_price: f64, now_ms: i64) -> Option<TradeRecord> {
        let mut pos = self.open.remove(position_id)?;
        pos.mark(exit_price);
        pos.realized_pnl = pos.unrealized_pnl;
        pos.unrealized_pnl = 0.0;
        self.daily_realized += pos.realized_pnl;

        let record = TradeRecord {
            strategy: pos.strategy.clone(),
            asset: pos.instrument.symbol.clone(),
            pnl: pos.realized_pnl,
            size_usd: pos.size,
            opened_ms: pos.opened_ms,
            closed_ms: now_ms,
        };
        if self.closed.len() == CLOSED_CAPACITY {
            self.closed.pop_front();
        }
        self.closed.push_back(pos);
        Some(record)
    }

    pub fn get(&self, position_id: &str) -> Option<&Position> {
        self.open.get(position_id)
    }

    /// Open positions, ascending by open time then id for determinism.
    pub fn open_positions(&self) -> Vec<&Position> {
        let mut v: Vec<&Position> = self.open.values().collect();
        v.sort_by(|a, b| a.opened_ms.cmp(&b.opened_ms).then(a.id.cmp(&b.id)));
        v
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.closed.iter()
    }

    /// Signed held notional on one token: long size minus short size.
    pub fn inventory_for_token(&self, token_id: &str) -> f64 {
        self.open
            .values()
            .filter(|p| p.token_id == token_id)
            .map(|p| match p.side {
                PositionSide::Long => p.size,
                PositionSide::Short => -p.size,
            })
            .sum()
    }

    /// Gross open notional across all positions.
    pub fn total_exposure(&self) -> f64 {
        self.open.values().map(|p| p.size).sum()
    }

    /// Gross open notional per asset symbol.
    pub fn exposure_by_asset(&self) -> HashMap<String, f64> {
        let mut out = HashMap::new();
        for p in self.open.values() {
            *out.entry(p.instrument.symbol.clone()).or_insert(0.0) += p.size;
        }
        out
    }

    /// Gross open notional per venue — the invariant rollup:
    /// Σ(open.size for venue X) == exposure_by_exchange()[X].
    pub fn exposure_by_exchange(&self) -> HashMap<Venue, f64> {
        let mut out = HashMap::new();
        for p in self.open.values() {
            *out.entry(p.instrument.venue).or_insert(0.0) += p.size;
        }
        out
    }

    /// Sum of unrealized PnL across open positions.
    pub fn total_unrealized(&self) -> f64 {
        self.open.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Realized PnL accumulated today (UTC date keyed by the caller).
    pub fn daily_realized(&self) -> f64 {
        self.daily_realized
    }

    /// Reset the daily counter when the UTC date rolls.
    pub fn roll_daily(&mut self, utc_date: &str) {
        if self.daily_date != utc_date {
            self.daily_date = utc_date.to_string();
            self.daily_realized = 0.0;
        }
    }
}

impl Default for PositionBook {
    fn default() -> Self {
        Self::new()
    }
}
