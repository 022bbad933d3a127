use std::collections::VecDeque;

/// VPIN window length in ticks.
pub const VPIN_WINDOW: usize = 20;

/// Flow-toxicity threshold above which order flow is treated as informed.
pub const TOXIC_THRESHOLD: f64 = 0.70;

/// Volume-synchronized probability of informed trading over a rolling tick
/// window.
///
/// Without a trade tape, per-tick notional is proxied by |Δmid|·100 and
/// attributed to the buy or sell side from the sign of the mid change.
/// VPIN = |ΣB − ΣS| / (ΣB + ΣS); 0 when the window carries no volume.
#[derive(Clone)]
pub struct VpinEstimator {
    window: usize,
    buckets: VecDeque<(f64, f64)>, // (buy_notional, sell_notional)
    last_mid: f64,
}

impl VpinEstimator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buckets: VecDeque::with_capacity(window.max(1)),
            last_mid: 0.0,
        }
    }

    pub fn with_default_window() -> Self {
        Self::new(VPIN_WINDOW)
    }

    /// Feed the current mid. The first observation seeds only.
    pub fn on_mid(&mut self, mid: f64) {
        if mid <= 0.0 {
            return;
        }
        if self.last_mid <= 0.0 {
            self.last_mid = mid;
            return;
        }
        let delta = mid - self.last_mid;
        self.last_mid = mid;

        let notional = delta.abs() * 100.0;
        let bucket = if delta > 0.0 {
            (notional, 0.0)
        } else if delta < 0.0 {
            (0.0, notional)
        } else {
            (0.0, 0.0)
        };

        if self.buckets.len() == self.window {
            self.buckets.pop_front();
        }
        self.buckets.push_back(bucket);
    }

    fn totals(&self) -> (f64, f64) {
        let mut b = 0.0;
        let mut s = 0.0;
        for &(bb, ss) in &self.buckets {
            b += bb;
            s += ss;
        }
        (b, s)
    }

    /// Signed flow imbalance (ΣB − ΣS)/(ΣB + ΣS) in [-1, +1]; 0 on no volume.
    pub fn flow_imbalance(&self) -> f64 {
        let (b, s) = self.totals();
        let total = b + s;
        if total <= 0.0 {
            return 0.0;
        }
        (b - s) / total
    }

    /// Unsigned VPIN in [0, 1].
    pub fn vpin(&self) -> f64 {
        self.flow_imbalance().abs()
    }

    pub fn is_toxic(&self) -> bool {
        self.vpin() > TOXIC_THRESHOLD
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
