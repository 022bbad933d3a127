use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::market::book::{Book, TOP_LEVELS};
use crate::types::MarketMeta;

/// Reference ring capacity: ~60s of samples at the 500ms tick cadence.
pub const REF_RING_CAPACITY: usize = 120;

/// Immutable per-market view of one tick: both outcome books, derived
/// metrics, and the reference-exchange price with its recent changes.
///
/// `yes_mid + no_mid` may exceed 1 during mispricings — that IS the
/// structural-arbitrage signal, not a data error.
#[derive(Clone, Debug, Serialize)]
pub struct TickSnapshot {
    pub asset: String,
    pub interval: String,
    pub condition_id: String,
    pub yes_token_id: String,
    pub no_token_id: String,

    pub yes_book: Book,
    pub no_book: Book,

    pub yes_mid: f64,
    pub no_mid: f64,
    pub yes_spread: f64,
    pub no_spread: f64,
    pub yes_best_bid: f64,
    pub yes_best_ask: f64,
    pub no_best_bid: f64,
    pub no_best_ask: f64,
    pub yes_bid_depth_5: f64,
    pub yes_ask_depth_5: f64,
    pub no_bid_depth_5: f64,
    pub no_ask_depth_5: f64,

    /// Perp mid from the reference exchange.
    pub reference_price: f64,
    pub ref_change_10s: f64,
    pub ref_change_30s: f64,

    pub time_to_resolution_s: f64,
    pub ts_ms: i64,
}

/// Bounded reference-price ring for one asset.
#[derive(Clone)]
pub struct ReferenceRing {
    cap: usize,
    buf: VecDeque<(i64, f64)>, // (ts_ms, price)
}

impl ReferenceRing {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            buf: VecDeque::with_capacity(cap.max(1)),
        }
    }

    pub fn push(&mut self, ts_ms: i64, price: f64) {
        if price <= 0.0 {
            return;
        }
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back((ts_ms, price));
    }

    pub fn last(&self) -> Option<(i64, f64)> {
        self.buf.back().copied()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Fractional change over the trailing `window_ms`: scan backward for the
    /// oldest sample still within the window and return (current − old)/old.
    /// 0.0 on insufficient history or a zero divisor.
    pub fn change_over(&self, window_ms: i64, now_ms: i64) -> f64 {
        let current = match self.buf.back() {
            Some(&(_, p)) if p > 0.0 => p,
            _ => return 0.0,
        };
        let cutoff = now_ms - window_ms;
        let mut oldest_in_window: Option<f64> = None;
        for &(ts, p) in self.buf.iter().rev() {
            if ts < cutoff {
                break;
            }
            oldest_in_window = Some(p);
        }
        match oldest_in_window {
            Some(old) if old > 0.0 => (current - old) / old,
            _ => 0.0,
        }
    }
}

/// Joins per-token books and the reference feed into immutable snapshots,
/// holding one reference ring per asset.
pub struct SnapshotBuilder {
    rings: HashMap<String, ReferenceRing>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            rings: HashMap::new(),
        }
    }

    /// Record a reference-price observation for `asset`.
    pub fn on_reference_price(&mut self, asset: &str, price: f64, ts_ms: i64) {
        self.rings
            .entry(asset.to_string())
            .or_insert_with(|| ReferenceRing::new(REF_RING_CAPACITY))
            .push(ts_ms, price);
    }

    pub fn ring(&self, asset: &str) -> Option<&ReferenceRing> {
        self.rings.get(asset)
    }

    /// Build a snapshot for one market. Returns None when either book is
    /// missing a side — that market is skipped silently this tick.
    pub fn build(
        &self,
        meta: &MarketMeta,
        yes_book: Book,
        no_book: Book,
        now_ms: i64,
    ) -> Option<TickSnapshot> {
        if !yes_book.is_two_sided() || !no_book.is_two_sided() {
            return None;
        }

        let (reference_price, ref_change_10s, ref_change_30s) = match self.rings.get(&meta.asset) {
            Some(ring) => match ring.last() {
                Some((_, px)) => (
                    px,
                    ring.change_over(10_000, now_ms),
                    ring.change_over(30_000, now_ms),
                ),
                None => (0.0, 0.0, 0.0),
            },
            None => (0.0, 0.0, 0.0),
        };

        Some(TickSnapshot {
            asset: meta.asset.clone(),
            interval: meta.interval.clone(),
            condition_id: meta.condition_id.clone(),
            yes_token_id: meta.yes_token_id.clone(),
            no_token_id: meta.no_token_id.clone(),
            yes_mid: yes_book.mid(),
            no_mid: no_book.mid(),
            yes_spread: yes_book.spread(),
            no_spread: no_book.spread(),
            yes_best_bid: yes_book.best_bid(),
            yes_best_ask: yes_book.best_ask(),
            no_best_bid: no_book.best_bid(),
            no_best_ask: no_book.best_ask(),
            yes_bid_depth_5: yes_book.bid_depth(TOP_LEVELS),
            yes_ask_depth_5: yes_book.ask_depth(TOP_LEVELS),
            no_bid_depth_5: no_book.bid_depth(TOP_LEVELS),
            no_ask_depth_5: no_book.ask_depth(TOP_LEVELS),
            reference_price,
            ref_change_10s,
            ref_change_30s,
            time_to_resolution_s: ((meta.end_ms - now_ms).max(0)) as f64 / 1000.0,
            ts_ms: now_ms,
            yes_book,
            no_book,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::book::Book;

    fn meta() -> MarketMeta {
        MarketMeta {
            asset: "BTC".into(),
            interval: "5m".into(),
            condition_id: "cond-1".into(),
            yes_token_id: "yes-1".into(),
            no_token_id: "no-1".into(),
            end_ms: 1_000_000,
        }
    }

    fn two_sided(bid: f64, ask: f64, size: f64) -> Book {
        Book::from_levels(vec![(bid, size)], vec![(ask, size)])
    }

    // ── ReferenceRing ──

    /// Scenario: Ring fed prices at 500ms cadence, then asked for the change
    /// over a 10s window.
    /// Expected: Change computed against the OLDEST sample inside the window,
    /// not the immediately previous one.
    #[test]
    fn test_ring_change_uses_oldest_in_window() {
        let mut r = ReferenceRing::new(120);
        // 0..=20s of samples rising 100 -> 140 in steps of 1 per 500ms
        for i in 0..=40 {
            r.push(i * 500, 100.0 + i as f64);
        }
        let now = 20_000;
        // Window 10s → oldest in window is ts=10_000 (price 120); current 140.
        let change = r.change_over(10_000, now);
        assert!((change - (140.0 - 120.0) / 120.0).abs() < 1e-12, "change = {}", change);
    }

    /// Scenario: Ring with a single sample.
    /// Expected: Change over any window is (cur-cur)/cur = 0.
    #[test]
    fn test_ring_change_single_sample() {
        let mut r = ReferenceRing::new(120);
        r.push(1_000, 100.0);
        assert_eq!(r.change_over(10_000, 1_000), 0.0);
    }

    /// Scenario: Empty ring.
    /// Expected: Change is 0 — no history, no signal.
    #[test]
    fn test_ring_change_empty() {
        let r = ReferenceRing::new(120);
        assert_eq!(r.change_over(10_000, 5_000), 0.0);
    }

    /// Scenario: All samples older than the window.
    /// Expected: No sample qualifies → the newest one (in-window by
    /// construction) anchors the change, which is 0 against itself.
    #[test]
    fn test_ring_change_stale_history() {
        let mut r = ReferenceRing::new(120);
        r.push(0, 100.0);
        r.push(500, 110.0);
        // now = 60s later; only the newest (ts=500) is never in a 10s window
        // ending at 60_500 — scan finds nothing.
        assert_eq!(r.change_over(10_000, 60_500), 0.0);
    }

    /// Scenario: Capacity-3 ring receives 5 samples.
    /// Expected: Oldest two evicted; len stays 3.
    #[test]
    fn test_ring_eviction() {
        let mut r = ReferenceRing::new(3);
        for i in 0..5 {
            r.push(i * 500, 100.0 + i as f64);
        }
        assert_eq!(r.len(), 3);
        assert_eq!(r.last().unwrap().1, 104.0);
    }

    /// Scenario: Non-positive price pushed.
    /// Expected: Ignored.
    #[test]
    fn test_ring_rejects_bad_price() {
        let mut r = ReferenceRing::new(10);
        r.push(0, 0.0);
        r.push(500, -5.0);
        assert!(r.is_empty());
    }

    // ── SnapshotBuilder ──

    /// Scenario: Both books two-sided, reference ring warm.
    /// Expected: Snapshot produced with consistent derived fields and the
    /// best_bid < best_ask invariant on both books.
    #[test]
    fn test_build_happy_path() {
        let mut b = SnapshotBuilder::new();
        for i in 0..=20 {
            b.on_reference_price("BTC", 95_000.0 + i as f64 * 10.0, i * 500);
        }
        let snap = b
            .build(&meta(), two_sided(0.48, 0.52, 100.0), two_sided(0.46, 0.50, 80.0), 10_000)
            .unwrap();

        assert!((snap.yes_mid - 0.50).abs() < 1e-12);
        assert!((snap.no_mid - 0.48).abs() < 1e-12);
        assert!((snap.yes_spread - 0.04).abs() < 1e-12);
        assert!(snap.yes_best_bid < snap.yes_best_ask);
        assert!(snap.no_best_bid < snap.no_best_ask);
        assert_eq!(snap.yes_bid_depth_5, 100.0);
        assert_eq!(snap.no_ask_depth_5, 80.0);
        assert_eq!(snap.reference_price, 95_200.0);
        assert!(snap.ref_change_10s > 0.0);
        assert!((snap.time_to_resolution_s - 990.0).abs() < 1e-9);
    }

    /// Scenario: NO book has no bids.
    /// Expected: build() returns None — the market is skipped this tick.
    #[test]
    fn test_build_skips_one_sided_market() {
        let b = SnapshotBuilder::new();
        let no_book = Book::from_levels(vec![], vec![(0.50, 10.0)]);
        assert!(b
            .build(&meta(), two_sided(0.48, 0.52, 10.0), no_book, 1_000)
            .is_none());
    }

    /// Scenario: No reference samples for the asset.
    /// Expected: Snapshot still builds with reference fields zeroed.
    #[test]
    fn test_build_without_reference() {
        let b = SnapshotBuilder::new();
        let snap = b
            .build(&meta(), two_sided(0.48, 0.52, 10.0), two_sided(0.46, 0.50, 10.0), 1_000)
            .unwrap();
        assert_eq!(snap.reference_price, 0.0);
        assert_eq!(snap.ref_change_10s, 0.0);
        assert_eq!(snap.ref_change_30s, 0.0);
    }

    /// Scenario: Mispriced market where yes_mid + no_mid > 1.
    /// Expected: Snapshot builds unchanged — the overround is signal, not error.
    #[test]
    fn test_build_allows_overround() {
        let b = SnapshotBuilder::new();
        let snap = b
            .build(&meta(), two_sided(0.58, 0.62, 10.0), two_sided(0.44, 0.48, 10.0), 1_000)
            .unwrap();
        assert!(snap.yes_mid + snap.no_mid > 1.0);
    }

    /// Scenario: Sample timestamp exactly at the window cutoff.
    /// Expected: Included — the window test is `ts >= cutoff`.
    #[test]
    fn test_ring_change_inclusive_cutoff() {
        let mut r = ReferenceRing::new(10);
        r.push(0, 100.0);
        r.push(10_000, 110.0);
        // cutoff = 20_000 - 10_000 = 10_000: the ts=10_000 sample qualifies,
        // ts=0 does not.
        r.push(20_000, 121.0);
        let change = r.change_over(10_000, 20_000);
        assert!((change - (121.0 - 110.0) / 110.0).abs() < 1e-12, "change = {}", change);
    }

    /// Scenario: Snapshot derived fields checked against the raw books.
    /// Expected: Mids, spreads, bests, and depth rollups all agree with the
    /// levels that produced them.
    #[test]
    fn test_derived_fields_consistent_with_levels() {
        let b = SnapshotBuilder::new();
        let yes = Book::from_levels(
            vec![(0.48, 30.0), (0.47, 20.0)],
            vec![(0.52, 10.0), (0.53, 40.0)],
        );
        let no = Book::from_levels(vec![(0.46, 15.0)], vec![(0.50, 25.0)]);
        let snap = b.build(&meta(), yes.clone(), no.clone(), 1_000).unwrap();

        assert_eq!(snap.yes_best_bid, yes.best_bid());
        assert_eq!(snap.yes_best_ask, yes.best_ask());
        assert!((snap.yes_mid - (0.48 + 0.52) / 2.0).abs() < 1e-12);
        assert!((snap.yes_spread - 0.04).abs() < 1e-12);
        assert!((snap.yes_bid_depth_5 - 50.0).abs() < 1e-12);
        assert!((snap.yes_ask_depth_5 - 50.0).abs() < 1e-12);
        assert!((snap.no_bid_depth_5 - 15.0).abs() < 1e-12);
        // Depth notional dominates the level-1 bid notional.
        assert!(
            snap.yes_book.depth_notional(5) >= snap.yes_best_bid * snap.yes_book.best_bid_size()
        );
    }

    /// Scenario: Build at a timestamp past the market's end.
    /// Expected: time_to_resolution_s clamps at 0.
    #[test]
    fn test_build_past_resolution() {
        let b = SnapshotBuilder::new();
        let snap = b
            .build(&meta(), two_sided(0.48, 0.52, 10.0), two_sided(0.46, 0.50, 10.0), 2_000_000)
            .unwrap();
        assert_eq!(snap.time_to_resolution_s, 0.0);
    }
}
