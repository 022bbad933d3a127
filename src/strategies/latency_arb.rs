use crate::market::snapshot::TickSnapshot;
use crate::strategies::{Strategy, TickContext};
use crate::types::{
    Direction, Opportunity, OpportunityKind, OpportunityMeta, OrderSide, Tif,
};

/// Latency arbitrage against the reference exchange.
///
/// The CLOB reprices binary quotes with a lag after the perp moves. When the
/// 10s reference change is material, compare the YES-mid move over the last
/// 5 ticks against the move the reference implies; if the book is short by
/// more than the lag threshold, hit the under-priced side FOK before it
/// catches up.
pub struct LatencyArb;

pub const ID: &str = "latency_arb";

/// Minimum |reference change over 10s| to consider the book stale.
const MIN_REF_CHANGE: f64 = 0.002;
/// Ticks of YES-mid history the expected move is measured over.
const MOVE_TICKS: usize = 5;
/// Minimum price lag before an order is worth the race.
const MIN_LAG: f64 = 0.03;
const MIN_SIZE_USD: f64 = 5.0;
const MAX_SIZE_USD: f64 = 25.0;

impl Strategy for LatencyArb {
    fn id(&self) -> &'static str {
        ID
    }

    fn evaluate(&self, snap: &TickSnapshot, ctx: &TickContext) -> Vec<Opportunity> {
        let ref_change = snap.ref_change_10s;
        if ref_change.abs() < MIN_REF_CHANGE {
            return Vec::new();
        }
        if ctx.history.len() < MOVE_TICKS {
            return Vec::new();
        }

        let mid_then = ctx.yes_mid_back(MOVE_TICKS - 1);
        if mid_then <= 0.0 || snap.yes_mid <= 0.0 {
            return Vec::new();
        }
        let actual = snap.yes_mid - mid_then;

        // A mid near 0 or 1 barely responds to the reference; at 0.5 it is
        // most sensitive.
        let sensitivity = 1.0 - 1.5 * (snap.yes_mid - 0.5).abs();
        let expected = ref_change * sensitivity * 0.5;

        // Signed shortfall in the direction of the reference move.
        let lag = if ref_change > 0.0 {
            (expected - actual).max(0.0)
        } else {
            (actual - expected).max(0.0)
        };
        if lag <= MIN_LAG {
            return Vec::new();
        }

        // Under-priced side: YES on an up-move, NO on a down-move.
        let (token_id, price, ask_size, direction) = if ref_change > 0.0 {
            (
                snap.yes_token_id.clone(),
                snap.yes_best_ask,
                snap.yes_book.best_ask_size(),
                Direction::Long,
            )
        } else {
            (
                snap.no_token_id.clone(),
                snap.no_best_ask,
                snap.no_book.best_ask_size(),
                Direction::Short,
            )
        };
        if price <= 0.0 || price >= 1.0 {
            return Vec::new();
        }

        let size_usd = (ask_size * price)
            .min((lag * 500.0).max(MIN_SIZE_USD))
            .min(MAX_SIZE_USD);
        if size_usd <= 0.0 {
            return Vec::new();
        }

        let accel_bonus = if ref_change.signum() == snap.ref_change_30s.signum()
            && ref_change.abs() > snap.ref_change_30s.abs() / 2.0
        {
            1.0
        } else {
            0.0
        };
        let confidence = (0.70 + 3.0 * lag + 0.1 * accel_bonus).min(0.95);

        vec![Opportunity {
            strategy: ID,
            kind: OpportunityKind::LatencyArb,
            asset: snap.asset.clone(),
            condition_id: snap.condition_id.clone(),
            direction,
            token_id,
            side: OrderSide::Buy,
            price,
            size_usd,
            expected_profit: size_usd * lag / price,
            confidence,
            edge: lag,
            tif: Tif::Fok,
            meta: OpportunityMeta::Latency {
                ref_change_10s: ref_change,
                expected_move: expected,
                actual_move: actual,
                lag,
            },
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::book::Book;
    use crate::market::snapshot::SnapshotBuilder;
    use crate::strategies::test_helpers::*;

    /// Snapshot with an explicit reference change and YES quoted around `mid`.
    fn snap_with_ref(mid: f64, ref_change_10s: f64, ref_change_30s: f64, ts: i64) -> TickSnapshot {
        let mut builder = SnapshotBuilder::new();
        // Seed the ring so change_over(10s) ≈ ref_change_10s and
        // change_over(30s) ≈ ref_change_30s at `ts`.
        let base = 100_000.0;
        builder.on_reference_price("BTC", base / (1.0 + ref_change_30s), ts - 29_500);
        builder.on_reference_price("BTC", base / (1.0 + ref_change_10s), ts - 9_500);
        builder.on_reference_price("BTC", base, ts);
        builder
            .build(
                &market_meta(),
                Book::from_levels(vec![(mid - 0.01, 100.0)], vec![(mid + 0.01, 100.0)]),
                Book::from_levels(vec![(1.0 - mid - 0.01, 100.0)], vec![(1.0 - mid + 0.01, 100.0)]),
                ts,
            )
            .unwrap()
    }

    /// Scenario: ref change10s = +0.004 at mid 0.5
    /// (sensitivity 1) → expected move 0.002; actual move +0.005.
    /// Expected: lag = max(0, 0.002 − 0.005) = 0 → no signal.
    #[test]
    fn test_book_already_moved_no_signal() {
        let history = make_mid_history(&[0.495, 0.496, 0.497, 0.498, 0.499], 0);
        let snap = snap_with_ref(0.50, 0.004, 0.004, 10_000);
        // actual = 0.500 - 0.495 = 0.005 > expected 0.002
        let fixture = make_ctx(&history, 10_000);
        assert!(LatencyArb.evaluate(&snap, &fixture.context()).is_empty());
    }

    /// Scenario: same reference move but the book did not move
    /// (actual = 0) → lag = 0.002.
    /// Expected: Still no signal — 0.002 is under the 0.03 threshold.
    #[test]
    fn test_small_lag_below_threshold() {
        let history = make_mid_history(&[0.50; 5], 0);
        let snap = snap_with_ref(0.50, 0.004, 0.004, 10_000);
        let fixture = make_ctx(&history, 10_000);
        assert!(LatencyArb.evaluate(&snap, &fixture.context()).is_empty());
    }

    /// Scenario: change10s = +0.02 → expected 0.01, actual
    /// +0.002 → lag 0.008.
    /// Expected: Still below 0.03 — documents the exact threshold.
    #[test]
    fn test_lag_just_below_threshold() {
        let history = make_mid_history(&[0.498; 5], 0);
        let snap = snap_with_ref(0.50, 0.02, 0.02, 10_000);
        let fixture = make_ctx(&history, 10_000);
        assert!(LatencyArb.evaluate(&snap, &fixture.context()).is_empty());
    }

    /// Scenario: Big reference rally (change10s = +0.10, sensitivity 1 at
    /// mid 0.5) while the book sat still → lag = 0.05 > 0.03.
    /// Expected: FOK BUY YES at the ask; size respects min($5)/max($25) and
    /// the lag·500 scale; confidence = 0.70 + 3·lag + 0.1 (accelerating).
    #[test]
    fn test_stale_book_fires() {
        let history = make_mid_history(&[0.50; 5], 0);
        let snap = snap_with_ref(0.50, 0.10, 0.12, 10_000);
        let fixture = make_ctx(&history, 10_000);
        let ops = LatencyArb.evaluate(&snap, &fixture.context());
        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.token_id, "yes-token");
        assert_eq!(op.side, OrderSide::Buy);
        assert_eq!(op.tif, Tif::Fok);
        // lag = 0.05 → size = min(100·0.51, max(5, 25), 25) = 25
        assert!((op.size_usd - 25.0).abs() < 1e-9, "size = {}", op.size_usd);
        // accel: |0.10| > |0.12|/2 and same sign → bonus 0.1
        let expected_conf = (0.70 + 3.0 * op.edge + 0.1).min(0.95);
        assert!((op.confidence - expected_conf).abs() < 1e-9);
    }

    /// Scenario: Reference dumped (change10s = −0.10) with the YES book
    /// unmoved at mid 0.5.
    /// Expected: BUY NO — the under-priced side on a down-move.
    #[test]
    fn test_down_move_buys_no() {
        let history = make_mid_history(&[0.50; 5], 0);
        let snap = snap_with_ref(0.50, -0.10, -0.12, 10_000);
        let fixture = make_ctx(&history, 10_000);
        let ops = LatencyArb.evaluate(&snap, &fixture.context());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].token_id, "no-token");
        assert_eq!(ops[0].direction, Direction::Short);
    }

    /// Scenario: Reference change below the 0.002 trigger.
    /// Expected: No evaluation at all.
    #[test]
    fn test_ref_change_trigger() {
        let history = make_mid_history(&[0.50; 5], 0);
        let snap = snap_with_ref(0.50, 0.001, 0.001, 10_000);
        let fixture = make_ctx(&history, 10_000);
        assert!(LatencyArb.evaluate(&snap, &fixture.context()).is_empty());
    }

    /// Scenario: Only 3 prior snapshots (need 5).
    /// Expected: No signal — underfilled history.
    #[test]
    fn test_short_history() {
        let history = make_mid_history(&[0.50; 3], 0);
        let snap = snap_with_ref(0.50, 0.10, 0.10, 10_000);
        let fixture = make_ctx(&history, 10_000);
        assert!(LatencyArb.evaluate(&snap, &fixture.context()).is_empty());
    }

    /// Scenario: Extreme mid (0.95) where sensitivity collapses:
    /// 1 − 1.5·0.45 = 0.325.
    /// Expected: Expected move shrinks accordingly — a 0.10 reference move
    /// only implies 0.0163, so an unmoved book shows lag below threshold.
    #[test]
    fn test_extreme_mid_low_sensitivity() {
        let history = make_mid_history(&[0.95; 5], 0);
        let snap = snap_with_ref(0.95, 0.10, 0.10, 10_000);
        let fixture = make_ctx(&history, 10_000);
        assert!(LatencyArb.evaluate(&snap, &fixture.context()).is_empty());
    }

    /// Scenario: Confidence cap with an enormous lag.
    /// Expected: Confidence never exceeds 0.95.
    #[test]
    fn test_confidence_capped() {
        let history = make_mid_history(&[0.30; 5], 0);
        let snap = snap_with_ref(0.50, 0.60, 0.60, 10_000);
        let fixture = make_ctx(&history, 10_000);
        let ops = LatencyArb.evaluate(&snap, &fixture.context());
        assert_eq!(ops.len(), 1);
        assert!(ops[0].confidence <= 0.95 + 1e-12);
    }
}
