use tracing::error;

use crate::oms::OrderManager;
use crate::portfolio::positions::PositionBook;
use crate::risk::gate::RiskGate;
use crate::types::TradeRecord;

/// Outcome of a kill-switch trigger, surfaced to telemetry.
#[derive(Clone, Debug, Default)]
pub struct KillReport {
    pub cancelled_orders: Vec<u64>,
    pub closed_trades: Vec<TradeRecord>,
    pub estimated_pnl: f64,
    /// False when the switch was already armed (no-op trigger).
    pub acted: bool,
}

/// Latched emergency stop: cancel everything, flatten everything, halt the
/// gate. Trigger is idempotent — a second pull is a no-op until reset.
pub struct KillSwitch {
    armed: bool,
    reason: Option<String>,
    triggered_at_ms: i64,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self {
            armed: false,
            reason: None,
            triggered_at_ms: 0,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn triggered_at_ms(&self) -> i64 {
        self.triggered_at_ms
    }

    /// Cancel all orders, close every open position at its last known price,
    /// and latch the risk-gate halt.
    pub fn trigger(
        &mut self,
        reason: &str,
        oms: &mut OrderManager,
        positions: &mut PositionBook,
        gate: &mut RiskGate,
        now_ms: i64,
        utc_date: &str,
    ) -> KillReport {
        if self.armed {
            return KillReport::default();
        }
        self.armed = true;
        self.reason = Some(reason.to_string());
        self.triggered_at_ms = now_ms;

        let cancelled_orders = oms.cancel_all(reason, now_ms);

        let open_ids: Vec<(String, f64)> = positions
            .open_positions()
            .iter()
            .map(|p| (p.id.clone(), p.current_price))
            .collect();
        let mut closed_trades = Vec::with_capacity(open_ids.len());
        let mut estimated_pnl = 0.0;
        for (id, last_price) in open_ids {
            if let Some(record) = positions.close(&id, last_price, now_ms) {
                estimated_pnl += record.pnl;
                gate.record_trade(&record.asset, record.pnl, record.size_usd, utc_date, now_ms);
                closed_trades.push(record);
            }
        }

        gate.halt(&format!("kill switch: {reason}"));
        error!(
            reason,
            cancelled = cancelled_orders.len(),
            closed = closed_trades.len(),
            estimated_pnl,
            "KILL SWITCH TRIGGERED"
        );

        KillReport {
            cancelled_orders,
            closed_trades,
            estimated_pnl,
            acted: true,
        }
    }

    /// Unflag the switch. Past cancellations and closes are left untouched;
    /// the gate halt is cleared separately by the operator.
    pub fn reset(&mut self) {
        self.armed = false;
        self.reason = None;
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskLevel;
    use crate::oms::NewOrder;
    use crate::portfolio::positions::OpenPosition;
    use crate::risk::gate::RiskLimits;
    use crate::types::{
        InstrumentKey, OrderSide, OrderState, OrderType, PositionSide, Tif, Venue,
    };

    fn order_spec() -> NewOrder {
        NewOrder {
            instrument: InstrumentKey::new(Venue::PredictionClob, "BTC-UPDOWN"),
            token_id: "yes".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            tif: Tif::Gtc,
            price: 0.50,
            size: 10.0,
            strategy: "latency_arb".into(),
            signal_id: None,
        }
    }

    fn position(side: PositionSide, entry: f64, mark: f64) -> OpenPosition {
        OpenPosition {
            instrument: InstrumentKey::new(Venue::PredictionClob, "BTC-UPDOWN"),
            token_id: format!("tok-{entry}-{mark}"),
            side,
            size_usd: 10.0,
            entry_price: entry,
            strategy: "latency_arb".into(),
            order_id: 1,
            entry_vol: 0.0,
        }
    }

    /// Scenario: 3 open orders; long $10 from 0.50 marked 0.55
    /// and short $10 from 0.55 marked 0.60.
    /// Expected: 3 cancels, 2 closes, estimated PnL ≈ +$0.167
    /// ((0.55/0.50−1)·10 − (0.60/0.55−1)·10), gate halted.
    #[test]
    fn test_trigger_flattens_everything() {
        let mut oms = OrderManager::new();
        for _ in 0..3 {
            oms.create(order_spec(), 0);
        }
        let mut positions = PositionBook::new();
        let long_id = positions.open(position(PositionSide::Long, 0.50, 0.55), 0);
        let short_id = positions.open(position(PositionSide::Short, 0.55, 0.60), 0);
        let long_token = positions.get(&long_id).unwrap().token_id.clone();
        let short_token = positions.get(&short_id).unwrap().token_id.clone();
        positions.mark_token(&long_token, 0.55);
        positions.mark_token(&short_token, 0.60);

        let mut gate = RiskGate::new(RiskLimits::for_level(RiskLevel::Moderate));
        let mut ks = KillSwitch::new();
        let report = ks.trigger("manual", &mut oms, &mut positions, &mut gate, 1_000, "2026-08-01");

        assert!(report.acted);
        assert_eq!(report.cancelled_orders.len(), 3);
        assert_eq!(report.closed_trades.len(), 2);
        // long: (0.55-0.50)*10/0.50 = +1.0; short: (0.55-0.60)*10/0.55 ≈ -0.909
        let expected = 1.0 + (0.55 - 0.60) * 10.0 / 0.55;
        assert!((report.estimated_pnl - expected).abs() < 1e-9, "pnl = {}", report.estimated_pnl);
        assert_eq!(positions.open_count(), 0);
        assert!(gate.is_halted());
        assert!(ks.is_armed());
        for o in [1u64, 2, 3] {
            assert_eq!(oms.state(o), Some(OrderState::Cancelled));
        }
    }

    /// Scenario: Trigger pulled twice in a row.
    /// Expected: Second pull is a no-op — identical post-state to one pull.
    #[test]
    fn test_trigger_idempotent() {
        let mut oms = OrderManager::new();
        oms.create(order_spec(), 0);
        let mut positions = PositionBook::new();
        positions.open(position(PositionSide::Long, 0.50, 0.50), 0);
        let mut gate = RiskGate::new(RiskLimits::for_level(RiskLevel::Moderate));
        let mut ks = KillSwitch::new();

        let first = ks.trigger("one", &mut oms, &mut positions, &mut gate, 1_000, "2026-08-01");
        let audit_len = oms.audit.len();
        let second = ks.trigger("two", &mut oms, &mut positions, &mut gate, 2_000, "2026-08-01");

        assert!(first.acted);
        assert!(!second.acted);
        assert!(second.cancelled_orders.is_empty());
        assert_eq!(oms.audit.len(), audit_len, "no-op leaves the audit untouched");
        assert_eq!(ks.reason(), Some("one"));
    }

    /// Scenario: Reset after a trigger.
    /// Expected: Switch disarms but past state (cancelled orders, closed
    /// positions, gate halt) is untouched; a new trigger acts again.
    #[test]
    fn test_reset_leaves_history() {
        let mut oms = OrderManager::new();
        oms.create(order_spec(), 0);
        let mut positions = PositionBook::new();
        let mut gate = RiskGate::new(RiskLimits::for_level(RiskLevel::Moderate));
        let mut ks = KillSwitch::new();

        ks.trigger("stop", &mut oms, &mut positions, &mut gate, 1_000, "2026-08-01");
        ks.reset();
        assert!(!ks.is_armed());
        assert!(gate.is_halted(), "gate halt is cleared separately");
        assert_eq!(oms.state(1), Some(OrderState::Cancelled));

        oms.create(order_spec(), 2_000);
        let report = ks.trigger("again", &mut oms, &mut positions, &mut gate, 3_000, "2026-08-01");
        assert!(report.acted);
        assert_eq!(report.cancelled_orders, vec![2]);
    }

    /// Scenario: Trigger with nothing open.
    /// Expected: Acts, empty report, gate still halts.
    #[test]
    fn test_trigger_empty_book() {
        let mut oms = OrderManager::new();
        let mut positions = PositionBook::new();
        let mut gate = RiskGate::new(RiskLimits::for_level(RiskLevel::Moderate));
        let mut ks = KillSwitch::new();
        let report = ks.trigger("empty", &mut oms, &mut positions, &mut gate, 1_000, "2026-08-01");
        assert!(report.acted);
        assert!(report.cancelled_orders.is_empty());
        assert_eq!(report.estimated_pnl, 0.0);
        assert!(gate.is_halted());
    }
}
