use crate::types::OrderSide;

/// Signed market-making inventory for one instrument, in USD notional.
/// Positive = long YES exposure accumulated from our bid fills.
#[derive(Clone, Debug)]
pub struct InventoryState {
    pub position_usd: f64,
    pub entry_vwap: f64,
    pub unrealized_pnl: f64,
    pub max_position_usd: f64,
}

impl InventoryState {
    pub fn new(max_position_usd: f64) -> Self {
        Self {
            position_usd: 0.0,
            entry_vwap: 0.0,
            unrealized_pnl: 0.0,
            max_position_usd: max_position_usd.max(1e-9),
        }
    }

    /// Normalized inventory in [-1, +1].
    #[inline]
    pub fn q_norm(&self) -> f64 {
        (self.position_usd / self.max_position_usd).clamp(-1.0, 1.0)
    }

    /// Apply a quote fill. Buys add exposure, sells subtract. The VWAP
    /// follows adds, survives reduces, and re-anchors on a flip.
    pub fn on_fill(&mut self, side: OrderSide, price: f64, size_usd: f64) {
        if price <= 0.0 || size_usd <= 0.0 {
            return;
        }
        let signed = match side {
            OrderSide::Buy => size_usd,
            OrderSide::Sell => -size_usd,
        };
        let old = self.position_usd;
        let new = old + signed;

        if old == 0.0 || old.signum() == signed.signum() {
            // Opening or adding: blend the VWAP.
            let total = old.abs() + size_usd;
            self.entry_vwap = if total > 0.0 {
                (self.entry_vwap * old.abs() + price * size_usd) / total
            } else {
                price
            };
        } else if new != 0.0 && new.signum() != old.signum() {
            // Flipped through flat: the residual is priced here.
            self.entry_vwap = price;
        } else if new == 0.0 {
            self.entry_vwap = 0.0;
        }
        // Pure reduce keeps the existing VWAP.
        self.position_usd = new;
    }

    /// Recompute unrealized PnL at `price` (return units on notional).
    pub fn mark(&mut self, price: f64) {
        if price <= 0.0 || self.entry_vwap <= 0.0 || self.position_usd == 0.0 {
            self.unrealized_pnl = 0.0;
            return;
        }
        self.unrealized_pnl =
            (price - self.entry_vwap) * self.position_usd / self.entry_vwap;
    }
}
