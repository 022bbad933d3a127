pub mod confluence;
pub mod latency_arb;
pub mod spread_capture;
pub mod structural_arb;

#[cfg(test)]
pub mod test_helpers;

use crate::market::snapshot::TickSnapshot;
use crate::math::history::PriceHistory;
use crate::types::Opportunity;

/// Everything a strategy may read beyond the current snapshot. Built fresh
/// by the tick engine each call — strategies never hold references back into
/// engine state.
pub struct TickContext<'a> {
    /// Prior snapshots for this market, oldest first, excluding the current.
    pub history: &'a [TickSnapshot],
    /// Reference-exchange history for the snapshot's asset.
    pub ref_history: &'a PriceHistory,
    /// Single per-side fee constant.
    pub fee_per_side: f64,
    /// Held YES notional for this market (signed; negative = short).
    pub inventory_usd: f64,
    pub max_inventory_usd: f64,
    /// Signed flow imbalance (ΣB−ΣS)/(ΣB+ΣS) from the VPIN estimator.
    pub flow_imbalance: f64,
    pub now_ms: i64,
}

impl<'a> TickContext<'a> {
    /// Unsigned VPIN.
    #[inline]
    pub fn vpin(&self) -> f64 {
        self.flow_imbalance.abs()
    }

    /// YES mid `offset` ticks ago (0 = most recent prior snapshot).
    /// 0.0 when history does not reach that far.
    pub fn yes_mid_back(&self, offset: usize) -> f64 {
        let n = self.history.len();
        if offset >= n {
            return 0.0;
        }
        self.history[n - 1 - offset].yes_mid
    }
}

/// Tick-driven strategy: a pure function of (snapshot, context).
/// No I/O, no blocking — the tick budget is shared by every strategy.
pub trait Strategy: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, snap: &TickSnapshot, ctx: &TickContext) -> Vec<Opportunity>;
}

/// Evaluate strategies in registration order into a pre-allocated buffer.
/// Opportunity ordering (strategy order, then emission order) is part of the
/// pipeline contract.
pub fn evaluate_all(
    strategies: &[Box<dyn Strategy>],
    snap: &TickSnapshot,
    ctx: &TickContext,
    buf: &mut Vec<Opportunity>,
) {
    buf.clear();
    for s in strategies {
        buf.extend(s.evaluate(snap, ctx));
    }
}

/// Round a CLOB price to the 4-decimal tick grid.
#[inline]
pub fn round_price(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_helpers::*;
    use crate::types::{OpportunityKind, OrderSide, Tif};

    struct Fixed(&'static str, usize);

    impl Strategy for Fixed {
        fn id(&self) -> &'static str {
            self.0
        }
        fn evaluate(&self, snap: &TickSnapshot, _ctx: &TickContext) -> Vec<Opportunity> {
            (0..self.1)
                .map(|i| Opportunity {
                    strategy: self.0,
                    kind: OpportunityKind::LatencyArb,
                    asset: snap.asset.clone(),
                    condition_id: snap.condition_id.clone(),
                    direction: crate::types::Direction::Long,
                    token_id: snap.yes_token_id.clone(),
                    side: OrderSide::Buy,
                    price: 0.50 + i as f64 * 0.01,
                    size_usd: 5.0,
                    expected_profit: 0.1,
                    confidence: 0.8,
                    edge: 0.05,
                    tif: Tif::Fok,
                    meta: crate::types::OpportunityMeta::None,
                })
                .collect()
        }
    }

    /// Scenario: Two strategies registered in order, emitting 2 and 1
    /// opportunities respectively.
    /// Expected: Buffer holds them in registration-then-emission order.
    #[test]
    fn test_evaluate_all_preserves_order() {
        let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Fixed("a", 2)), Box::new(Fixed("b", 1))];
        let snap = make_snapshot(0.49, 0.51, 100.0, 1_000);
        let ctx = make_ctx(&[], 1_000);
        let mut buf = Vec::new();
        evaluate_all(&strategies, &snap, &ctx.context(), &mut buf);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0].strategy, "a");
        assert_eq!(buf[1].strategy, "a");
        assert_eq!(buf[2].strategy, "b");
    }

    /// Scenario: Buffer holds stale entries from the previous tick.
    /// Expected: evaluate_all clears it first.
    #[test]
    fn test_evaluate_all_clears_buffer() {
        let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(Fixed("a", 1))];
        let snap = make_snapshot(0.49, 0.51, 100.0, 1_000);
        let ctx = make_ctx(&[], 1_000);
        let mut buf = Vec::new();
        evaluate_all(&strategies, &snap, &ctx.context(), &mut buf);
        evaluate_all(&strategies, &snap, &ctx.context(), &mut buf);
        assert_eq!(buf.len(), 1);
    }

    /// Scenario: yes_mid_back against a 3-snapshot history.
    /// Expected: offset 0 = newest prior mid, past-the-end = 0.0.
    #[test]
    fn test_yes_mid_back() {
        let history = make_mid_history(&[0.40, 0.45, 0.50], 0);
        let ctx = make_ctx(&history, 2_000);
        let c = ctx.context();
        assert!((c.yes_mid_back(0) - 0.50).abs() < 1e-12);
        assert!((c.yes_mid_back(2) - 0.40).abs() < 1e-12);
        assert_eq!(c.yes_mid_back(3), 0.0);
    }

    /// Scenario: round_price on sub-tick values.
    /// Expected: 4-decimal rounding, half away from zero.
    #[test]
    fn test_round_price() {
        assert!((round_price(0.50414999) - 0.5041).abs() < 1e-12);
        assert!((round_price(0.52695) - 0.527).abs() < 1e-12);
    }
}
