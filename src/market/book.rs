use serde::{Deserialize, Serialize};

/// Depth used for rolled-up book metrics.
pub const TOP_LEVELS: usize = 5;

/// One resting level.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Top-N order book for one outcome token.
///
/// Bids are held descending by price, asks ascending; `from_levels` sorts
/// defensively since depth and fill math depend on the ordering.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Book {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl Book {
    pub fn new() -> Self {
        Self {
            bids: Vec::with_capacity(TOP_LEVELS),
            asks: Vec::with_capacity(TOP_LEVELS),
        }
    }

    /// Build from raw (price, size) pairs, sorting each side and dropping
    /// non-positive prices/sizes.
    pub fn from_levels(bids: Vec<(f64, f64)>, asks: Vec<(f64, f64)>) -> Self {
        let mut bids: Vec<BookLevel> = bids
            .into_iter()
            .filter(|&(p, s)| p > 0.0 && s > 0.0)
            .map(|(price, size)| BookLevel { price, size })
            .collect();
        let mut asks: Vec<BookLevel> = asks
            .into_iter()
            .filter(|&(p, s)| p > 0.0 && s > 0.0)
            .map(|(price, size)| BookLevel { price, size })
            .collect();
        bids.sort_unstable_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
        asks.sort_unstable_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
        Self { bids, asks }
    }

    #[inline]
    pub fn best_bid(&self) -> f64 {
        self.bids.first().map_or(0.0, |l| l.price)
    }

    #[inline]
    pub fn best_ask(&self) -> f64 {
        self.asks.first().map_or(0.0, |l| l.price)
    }

    #[inline]
    pub fn best_bid_size(&self) -> f64 {
        self.bids.first().map_or(0.0, |l| l.size)
    }

    #[inline]
    pub fn best_ask_size(&self) -> f64 {
        self.asks.first().map_or(0.0, |l| l.size)
    }

    /// Both sides present — required before a snapshot is built.
    #[inline]
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Midpoint; 0.0 unless both sides are present.
    #[inline]
    pub fn mid(&self) -> f64 {
        if self.is_two_sided() {
            (self.best_bid() + self.best_ask()) / 2.0
        } else {
            0.0
        }
    }

    /// Quoted spread; 0.0 unless both sides are present.
    #[inline]
    pub fn spread(&self) -> f64 {
        if self.is_two_sided() {
            self.best_ask() - self.best_bid()
        } else {
            0.0
        }
    }

    /// Sum of bid sizes over the top `levels`.
    pub fn bid_depth(&self, levels: usize) -> f64 {
        self.bids.iter().take(levels).map(|l| l.size).sum()
    }

    /// Sum of ask sizes over the top `levels`.
    pub fn ask_depth(&self, levels: usize) -> f64 {
        self.asks.iter().take(levels).map(|l| l.size).sum()
    }

    /// Notional (price*size) resting on the top `levels` of both sides.
    pub fn depth_notional(&self, levels: usize) -> f64 {
        let b: f64 = self.bids.iter().take(levels).map(|l| l.price * l.size).sum();
        let a: f64 = self.asks.iter().take(levels).map(|l| l.price * l.size).sum();
        b + a
    }

    /// Size-weighted mid using level-1 depth:
    /// (bid_px*ask_sz + ask_px*bid_sz)/(bid_sz + ask_sz). 0.0 if one-sided.
    #[inline]
    pub fn microprice(&self) -> f64 {
        let (bp, bs) = match self.bids.first() {
            Some(l) if l.price > 0.0 && l.size > 0.0 => (l.price, l.size),
            _ => return 0.0,
        };
        let (ap, asz) = match self.asks.first() {
            Some(l) if l.price > 0.0 && l.size > 0.0 => (l.price, l.size),
            _ => return 0.0,
        };
        (bp * asz + ap * bs) / (bs + asz)
    }

    /// Order-flow imbalance over the top `levels`:
    /// (bid_depth − ask_depth)/(bid_depth + ask_depth) in [-1, +1]; 0 if empty.
    pub fn flow_imbalance(&self, levels: usize) -> f64 {
        let bd = self.bid_depth(levels);
        let ad = self.ask_depth(levels);
        let total = bd + ad;
        if total <= 0.0 {
            return 0.0;
        }
        (bd - ad) / total
    }

    /// Largest resting size on the bid side (top `levels`).
    pub fn max_bid_size(&self, levels: usize) -> f64 {
        self.bids.iter().take(levels).map(|l| l.size).fold(0.0, f64::max)
    }

    /// Largest resting size on the ask side (top `levels`).
    pub fn max_ask_size(&self, levels: usize) -> f64 {
        self.asks.iter().take(levels).map(|l| l.size).fold(0.0, f64::max)
    }

    /// Average fill price for a buy of `shares` walking the asks.
    /// Returns (avg_price, fillable_shares); None on an empty ask side or
    /// non-positive target.
    pub fn walk_asks(&self, shares: f64) -> Option<(f64, f64)> {
        if self.asks.is_empty() || shares <= 0.0 {
            return None;
        }
        let mut remaining = shares;
        let mut cost = 0.0;
        let mut filled = 0.0;
        for l in &self.asks {
            let take = remaining.min(l.size);
            cost += take * l.price;
            filled += take;
            remaining -= take;
            if remaining <= 0.0 {
                break;
            }
        }
        if filled > 0.0 {
            Some((cost / filled, filled))
        } else {
            None
        }
    }
}
