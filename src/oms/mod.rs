pub mod audit;

use std::collections::HashMap;

use uuid::Uuid;

use self::audit::{AuditEntry, AuditKind, AuditLog};

use crate::types::{
    Fill, InstrumentKey, Order, OrderSide, OrderState, OrderType, StateChange, Tif,
};

/// Fill completeness uses a relative tolerance: filled ≥ 0.999·size counts
/// as fully filled (matches venue rounding).
const FILL_COMPLETE_RATIO: f64 = 0.999;

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub enum OmsError {
    UnknownOrder(u64),
    /// Transition not in the table. Order state is unchanged.
    IllegalTransition { from: OrderState, to: OrderState },
    /// Order is in a terminal state; nothing further is admitted.
    Terminal(OrderState),
    /// Fill applied in a state that does not accept fills.
    FillNotAllowed(OrderState),
}

impl std::fmt::Display for OmsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OmsError::UnknownOrder(id) => write!(f, "unknown order #{id}"),
            OmsError::IllegalTransition { from, to } => {
                write!(f, "illegal transition {from} -> {to}")
            }
            OmsError::Terminal(s) => write!(f, "order is terminal in {s}"),
            OmsError::FillNotAllowed(s) => write!(f, "fill not allowed in {s}"),
        }
    }
}

impl std::error::Error for OmsError {}

// ─── Transition table ───────────────────────────────────────────────────────

/// The authoritative lifecycle table. Anything not listed is refused.
pub fn transition_allowed(from: OrderState, to: OrderState) -> bool {
    use OrderState::*;
    matches!(
        (from, to),
        (Created, Validated)
            | (Created, Cancelled)
            | (Created, Error)
            | (Validated, Submitted)
            | (Validated, Cancelled)
            | (Validated, Error)
            | (Submitted, Acknowledged)
            | (Submitted, Rejected)
            | (Submitted, Cancelled)
            | (Submitted, Error)
            | (Acknowledged, PartialFill)
            | (Acknowledged, Filled)
            | (Acknowledged, Cancelled)
            | (Acknowledged, Expired)
            | (Acknowledged, Error)
            | (PartialFill, PartialFill)
            | (PartialFill, Filled)
            | (PartialFill, Cancelled)
            | (PartialFill, Error)
            | (Error, Created) // retry
    )
}

// ─── Order manager ──────────────────────────────────────────────────────────

/// Specification for a new order.
pub struct NewOrder {
    pub instrument: InstrumentKey,
    pub token_id: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub tif: Tif,
    pub price: f64,
    pub size: f64,
    pub strategy: String,
    pub signal_id: Option<String>,
}

/// Owns every order and its lifecycle. Single writer: the tick thread.
pub struct OrderManager {
    orders: HashMap<u64, Order>,
    next_order_id: u64,
    next_fill_id: u64,
    pub audit: AuditLog,
}

impl OrderManager {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            next_order_id: 1,
            next_fill_id: 1,
            audit: AuditLog::with_default_capacity(),
        }
    }

    /// Create an order in CREATED and return its id.
    pub fn create(&mut self, spec: NewOrder, now_ms: i64) -> u64 {
        let id = self.next_order_id;
        self.next_order_id += 1;

        let order = Order {
            id,
            client_id: Uuid::new_v4().to_string(),
            instrument: spec.instrument,
            token_id: spec.token_id,
            side: spec.side,
            order_type: spec.order_type,
            tif: spec.tif,
            price: spec.price,
            size: spec.size,
            filled_size: 0.0,
            avg_fill_price: 0.0,
            state: OrderState::Created,
            strategy: spec.strategy,
            signal_id: spec.signal_id,
            fills: Vec::new(),
            state_history: Vec::new(),
            created_ms: now_ms,
            updated_ms: now_ms,
        };
        self.audit.push(AuditEntry {
            ts_ms: now_ms,
            order_id: id,
            kind: AuditKind::Created,
            from: None,
            to: Some(OrderState::Created),
            detail: format!("{} {} @ {:.4} x ${:.2}", order.strategy, order.side, order.price, order.size),
        });
        self.orders.insert(id, order);
        id
    }

    pub fn order(&self, id: u64) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn state(&self, id: u64) -> Option<OrderState> {
        self.orders.get(&id).map(|o| o.state)
    }

    /// Apply a state transition. Illegal attempts are refused, audited, and
    /// leave the order untouched.
    pub fn transition(
        &mut self,
        id: u64,
        to: OrderState,
        reason: &str,
        now_ms: i64,
    ) -> Result<(), OmsError> {
        let order = self.orders.get_mut(&id).ok_or(OmsError::UnknownOrder(id))?;
        let from = order.state;

        if from.is_terminal() {
            self.audit.record_invalid_transition(id, from, to, now_ms);
            return Err(OmsError::Terminal(from));
        }
        if !transition_allowed(from, to) {
            self.audit.record_invalid_transition(id, from, to, now_ms);
            return Err(OmsError::IllegalTransition { from, to });
        }

        order.state = to;
        order.updated_ms = now_ms;
        order.state_history.push(StateChange {
            from,
            to,
            ts_ms: now_ms,
            reason: reason.to_string(),
        });
        self.audit.push(AuditEntry {
            ts_ms: now_ms,
            order_id: id,
            kind: AuditKind::Transition,
            from: Some(from),
            to: Some(to),
            detail: reason.to_string(),
        });
        Ok(())
    }

    /// Append a fill. Only ACKNOWLEDGED and PARTIAL_FILL accept fills; the
    /// resulting state is FILLED once filled_size ≥ 0.999·size.
    pub fn apply_fill(
        &mut self,
        id: u64,
        price: f64,
        size: f64,
        fee: f64,
        now_ms: i64,
    ) -> Result<OrderState, OmsError> {
        let order = self.orders.get_mut(&id).ok_or(OmsError::UnknownOrder(id))?;
        let from = order.state;
        if !matches!(from, OrderState::Acknowledged | OrderState::PartialFill) {
            self.audit.push(AuditEntry {
                ts_ms: now_ms,
                order_id: id,
                kind: AuditKind::Fill,
                from: Some(from),
                to: None,
                detail: format!("fill refused in {from}"),
            });
            return Err(OmsError::FillNotAllowed(from));
        }

        let fill_id = self.next_fill_id;
        self.next_fill_id += 1;
        order.fills.push(Fill {
            id: fill_id,
            order_id: id,
            price,
            size,
            fee,
            ts_ms: now_ms,
        });

        let notional: f64 = order.fills.iter().map(|f| f.price * f.size).sum();
        let filled: f64 = order.fills.iter().map(|f| f.size).sum();
        order.filled_size = filled;
        order.avg_fill_price = if filled > 0.0 { notional / filled } else { 0.0 };

        let to = if filled >= FILL_COMPLETE_RATIO * order.size {
            OrderState::Filled
        } else {
            OrderState::PartialFill
        };
        self.audit.push(AuditEntry {
            ts_ms: now_ms,
            order_id: id,
            kind: AuditKind::Fill,
            from: Some(from),
            to: Some(to),
            detail: format!("{:.4} x {:.4} fee {:.4}", price, size, fee),
        });

        let order = self.orders.get_mut(&id).expect("just touched");
        order.state = to;
        order.updated_ms = now_ms;
        order.state_history.push(StateChange {
            from,
            to,
            ts_ms: now_ms,
            reason: "fill".to_string(),
        });
        Ok(to)
    }

    /// Cancel every order whose state admits CANCELLED, with one shared
    /// reason. ERROR orders are excluded — the table only admits retry.
    pub fn cancel_all(&mut self, reason: &str, now_ms: i64) -> Vec<u64> {
        let ids: Vec<u64> = self
            .orders
            .iter()
            .filter(|(_, o)| transition_allowed(o.state, OrderState::Cancelled))
            .map(|(&id, _)| id)
            .collect();
        let mut cancelled = Vec::with_capacity(ids.len());
        for id in ids {
            if self.transition(id, OrderState::Cancelled, reason, now_ms).is_ok() {
                cancelled.push(id);
            }
        }
        self.audit.push(AuditEntry {
            ts_ms: now_ms,
            order_id: 0,
            kind: AuditKind::CancelAll,
            from: None,
            to: None,
            detail: format!("{} orders: {}", cancelled.len(), reason),
        });
        cancelled.sort_unstable();
        cancelled
    }

    /// Open (non-terminal) orders, ascending by id.
    pub fn open_orders(&self) -> Vec<&Order> {
        let mut open: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| !o.state.is_terminal())
            .collect();
        open.sort_unstable_by_key(|o| o.id);
        open
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.values().filter(|o| !o.state.is_terminal()).count()
    }

    /// Ids of open orders older than `max_age_ms`.
    pub fn stale_order_ids(&self, max_age_ms: i64, now_ms: i64) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .orders
            .values()
            .filter(|o| !o.state.is_terminal() && o.age_ms(now_ms) > max_age_ms)
            .map(|o| o.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Order counts by state, for status rollups.
    pub fn state_counts(&self) -> HashMap<OrderState, usize> {
        let mut out = HashMap::new();
        for o in self.orders.values() {
            *out.entry(o.state).or_insert(0) += 1;
        }
        out
    }

    /// Clone of every order, ascending by id. Dashboards read copies — the
    /// live map is never shared.
    pub fn orders_snapshot(&self) -> Vec<Order> {
        let mut v: Vec<Order> = self.orders.values().cloned().collect();
        v.sort_unstable_by_key(|o| o.id);
        v
    }

    /// Expire ACKNOWLEDGED GTD orders past their expiry.
    pub fn expire_due(&mut self, now_ms: i64) -> Vec<u64> {
        let due: Vec<u64> = self
            .orders
            .values()
            .filter(|o| {
                o.state == OrderState::Acknowledged
                    && matches!(o.tif, Tif::Gtd(exp) if now_ms >= exp)
            })
            .map(|o| o.id)
            .collect();
        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            if self.transition(id, OrderState::Expired, "gtd expired", now_ms).is_ok() {
                expired.push(id);
            }
        }
        expired.sort_unstable();
        expired
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}
