use std::collections::VecDeque;

use serde::Serialize;

use crate::types::OrderState;

/// Bounded audit capacity.
pub const AUDIT_CAPACITY: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    Created,
    Transition,
    Fill,
    InvalidTransition,
    CancelAll,
}

/// One audit record. Every state change, fill, and refused transition lands
/// here, including the ones that mutate nothing.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub ts_ms: i64,
    pub order_id: u64,
    pub kind: AuditKind,
    pub from: Option<OrderState>,
    pub to: Option<OrderState>,
    pub detail: String,
}

/// Append-only ring of audit entries, oldest evicted past capacity.
pub struct AuditLog {
    cap: usize,
    entries: VecDeque<AuditEntry>,
}

impl AuditLog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::with_capacity(64),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(AUDIT_CAPACITY)
    }

    pub fn push(&mut self, entry: AuditEntry) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn record_invalid_transition(
        &mut self,
        order_id: u64,
        from: OrderState,
        to: OrderState,
        ts_ms: i64,
    ) {
        self.push(AuditEntry {
            ts_ms,
            order_id,
            kind: AuditKind::InvalidTransition,
            from: Some(from),
            to: Some(to),
            detail: format!("INVALID_TRANSITION {{from:\"{}\", to:\"{}\"}}", from, to),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn entries_for(&self, order_id: u64) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.order_id == order_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(order_id: u64, kind: AuditKind, ts_ms: i64) -> AuditEntry {
        AuditEntry {
            ts_ms,
            order_id,
            kind,
            from: None,
            to: None,
            detail: String::new(),
        }
    }

    /// Scenario: Capacity-3 log receives 5 entries.
    /// Expected: Oldest two evicted; newest three retained in order.
    #[test]
    fn test_bounded_eviction() {
        let mut log = AuditLog::new(3);
        for i in 0..5 {
            log.push(entry(i, AuditKind::Transition, i as i64));
        }
        assert_eq!(log.len(), 3);
        let ids: Vec<u64> = log.iter().map(|e| e.order_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    /// Scenario: Refused CREATED → SUBMITTED recorded.
    /// Expected: Detail renders the exact INVALID_TRANSITION form with state
    /// display names.
    #[test]
    fn test_invalid_transition_detail_format() {
        let mut log = AuditLog::with_default_capacity();
        log.record_invalid_transition(7, OrderState::Created, OrderState::Submitted, 1_000);
        let e = log.iter().next().unwrap();
        assert_eq!(e.kind, AuditKind::InvalidTransition);
        assert_eq!(e.detail, "INVALID_TRANSITION {from:\"CREATED\", to:\"SUBMITTED\"}");
    }

    /// Scenario: Entries for three orders interleaved.
    /// Expected: entries_for() filters to a single order's trail.
    #[test]
    fn test_entries_for_order() {
        let mut log = AuditLog::with_default_capacity();
        for i in 0..6 {
            log.push(entry(i % 3, AuditKind::Transition, i as i64));
        }
        assert_eq!(log.entries_for(1).len(), 2);
        assert_eq!(log.entries_for(9).len(), 0);
    }
}
