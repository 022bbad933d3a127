// Shared fixtures for strategy tests. Only compiled under #[cfg(test)].

use crate::market::book::Book;
use crate::market::snapshot::{SnapshotBuilder, TickSnapshot};
use crate::math::history::PriceHistory;
use crate::strategies::TickContext;
use crate::types::MarketMeta;

pub fn market_meta() -> MarketMeta {
    MarketMeta {
        asset: "BTC".into(),
        interval: "5m".into(),
        condition_id: "cond-test".into(),
        yes_token_id: "yes-token".into(),
        no_token_id: "no-token".into(),
        end_ms: 10_000_000,
    }
}

/// Snapshot with symmetric books: YES quoted (bid, ask) at `size` per level,
/// NO mirrored so yes_mid + no_mid = 1.
pub fn make_snapshot(yes_bid: f64, yes_ask: f64, size: f64, ts_ms: i64) -> TickSnapshot {
    make_snapshot_books(
        Book::from_levels(vec![(yes_bid, size)], vec![(yes_ask, size)]),
        Book::from_levels(vec![(1.0 - yes_ask, size)], vec![(1.0 - yes_bid, size)]),
        ts_ms,
    )
}

/// Snapshot from explicit YES/NO books.
pub fn make_snapshot_books(yes_book: Book, no_book: Book, ts_ms: i64) -> TickSnapshot {
    let builder = SnapshotBuilder::new();
    builder
        .build(&market_meta(), yes_book, no_book, ts_ms)
        .expect("two-sided fixture books")
}

/// History of prior snapshots whose YES mids follow `mids` (oldest first),
/// each with a 0.02 spread, timestamps 500ms apart starting at `start_ms`.
pub fn make_mid_history(mids: &[f64], start_ms: i64) -> Vec<TickSnapshot> {
    mids.iter()
        .enumerate()
        .map(|(i, &m)| make_snapshot(m - 0.01, m + 0.01, 100.0, start_ms + i as i64 * 500))
        .collect()
}

/// Context fixture. Owns the reference history so the borrowed TickContext
/// can be rebuilt per assertion.
pub struct CtxFixture<'a> {
    pub history: &'a [TickSnapshot],
    pub ref_history: PriceHistory,
    pub fee_per_side: f64,
    pub inventory_usd: f64,
    pub max_inventory_usd: f64,
    pub flow_imbalance: f64,
    pub now_ms: i64,
}

impl<'a> CtxFixture<'a> {
    pub fn context(&self) -> TickContext<'_> {
        TickContext {
            history: self.history,
            ref_history: &self.ref_history,
            fee_per_side: self.fee_per_side,
            inventory_usd: self.inventory_usd,
            max_inventory_usd: self.max_inventory_usd,
            flow_imbalance: self.flow_imbalance,
            now_ms: self.now_ms,
        }
    }
}

pub fn make_ctx<'a>(history: &'a [TickSnapshot], now_ms: i64) -> CtxFixture<'a> {
    CtxFixture {
        history,
        ref_history: PriceHistory::new(200),
        fee_per_side: 0.005,
        inventory_usd: 0.0,
        max_inventory_usd: 50.0,
        flow_imbalance: 0.0,
        now_ms,
    }
}
