use std::collections::VecDeque;

use crate::math::stats;
use crate::types::PriceSample;

/// Default ring capacity per instrument.
pub const DEFAULT_CAPACITY: usize = 2000;

/// Bounded, timestamped ring of {price, volume} samples for one instrument.
///
/// O(1) push with amortized O(1) eviction of the oldest sample on overflow.
/// Timestamps are assumed non-decreasing (single producer: the tick engine).
/// Every derived statistic returns 0 when the window is underfilled — callers
/// treat underfill as "no signal", not as an error.
#[derive(Clone)]
pub struct PriceHistory {
    cap: usize,
    buf: VecDeque<PriceSample>,
}

impl PriceHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            buf: VecDeque::with_capacity(cap.max(1)),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a sample, evicting the oldest on overflow.
    #[inline]
    pub fn push(&mut self, sample: PriceSample) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(sample);
    }

    #[inline]
    pub fn push_parts(&mut self, price: f64, volume: f64, ts_ms: i64) {
        self.push(PriceSample { price, volume, ts_ms });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub fn last_price(&self) -> f64 {
        self.buf.back().map_or(0.0, |s| s.price)
    }

    #[inline]
    pub fn last_ts(&self) -> i64 {
        self.buf.back().map_or(0, |s| s.ts_ms)
    }

    /// Price at `offset` samples back from the newest (0 = newest).
    /// 0.0 when the ring does not reach that far.
    pub fn price_back(&self, offset: usize) -> f64 {
        let n = self.buf.len();
        if offset >= n {
            return 0.0;
        }
        self.buf[n - 1 - offset].price
    }

    /// Last `n` prices, oldest first. Shorter when underfilled.
    pub fn prices_tail(&self, n: usize) -> Vec<f64> {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip).map(|s| s.price).collect()
    }

    /// Last `n` volumes, oldest first.
    pub fn volumes_tail(&self, n: usize) -> Vec<f64> {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip).map(|s| s.volume).collect()
    }

    /// Last `n` log-returns (needs n+1 prices), oldest first.
    /// Empty when underfilled; zero/negative prices are skipped.
    pub fn log_returns(&self, n: usize) -> Vec<f64> {
        let prices = self.prices_tail(n + 1);
        if prices.len() < 2 {
            return Vec::new();
        }
        prices
            .windows(2)
            .filter(|w| w[0] > 0.0 && w[1] > 0.0)
            .map(|w| (w[1] / w[0]).ln())
            .collect()
    }

    /// Simple moving average of the last `n` prices. 0.0 when fewer than `n`.
    pub fn sma(&self, n: usize) -> f64 {
        if n == 0 || self.buf.len() < n {
            return 0.0;
        }
        stats::mean(&self.prices_tail(n))
    }

    /// EMA of the last `n` prices with period `n`. 0.0 when fewer than `n`.
    pub fn ema(&self, n: usize) -> f64 {
        if n == 0 || self.buf.len() < n {
            return 0.0;
        }
        stats::ema(&self.prices_tail(n), n)
    }

    /// Realized volatility: sample stddev of the last `n` log-returns.
    /// 0.0 when fewer than n+1 prices are available.
    pub fn realized_vol(&self, n: usize) -> f64 {
        let returns = self.log_returns(n);
        if returns.len() < n {
            return 0.0;
        }
        stats::stddev(&returns)
    }

    /// Volume-weighted average price over the last `n` samples.
    /// 0.0 when underfilled or when the window holds no volume.
    pub fn vwap(&self, n: usize) -> f64 {
        if n == 0 || self.buf.len() < n {
            return 0.0;
        }
        let skip = self.buf.len() - n;
        let mut pq = 0.0;
        let mut q = 0.0;
        for s in self.buf.iter().skip(skip) {
            pq += s.price * s.volume;
            q += s.volume;
        }
        if q > 0.0 {
            pq / q
        } else {
            0.0
        }
    }
}
