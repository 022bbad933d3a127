use crate::market::snapshot::TickSnapshot;
use crate::strategies::{round_price, Strategy, TickContext};
use crate::types::{
    Direction, Opportunity, OpportunityKind, OpportunityMeta, OrderSide, Tif,
};

/// Spread-capture market making on the YES book.
///
/// Joins the inside market one tick better on both sides, skewed against
/// current inventory so fills push the position back toward flat. Stands
/// down when the spread is too thin to clear fees or the market is moving
/// too fast to lean on.
pub struct SpreadCapture;

pub const ID: &str = "spread_capture";

/// Entry requirement on the quoted market spread.
const MIN_MARKET_SPREAD_OVER_FEES: f64 = 0.005;
/// Requirement on our own quoted spread after skew.
const MIN_OWN_SPREAD_OVER_FEES: f64 = 0.002;
/// Mid range over the last 10 ticks above which the market is too volatile.
const VOLATILE_RANGE: f64 = 0.08;
const RANGE_TICKS: usize = 10;
const QUOTE_SIZE_USD: f64 = 10.0;
const CONFIDENCE: f64 = 0.60;

impl Strategy for SpreadCapture {
    fn id(&self) -> &'static str {
        ID
    }

    fn evaluate(&self, snap: &TickSnapshot, ctx: &TickContext) -> Vec<Opportunity> {
        let fee2 = 2.0 * ctx.fee_per_side;
        if snap.yes_spread < fee2 + MIN_MARKET_SPREAD_OVER_FEES {
            return Vec::new();
        }

        // Volatility stand-down: range of the last 10 mids (incl. current).
        let mut lo = snap.yes_mid;
        let mut hi = snap.yes_mid;
        for i in 0..RANGE_TICKS.saturating_sub(1) {
            let m = ctx.yes_mid_back(i);
            if m > 0.0 {
                lo = lo.min(m);
                hi = hi.max(m);
            }
        }
        if hi - lo > VOLATILE_RANGE {
            return Vec::new();
        }

        let inv_ratio = if ctx.max_inventory_usd > 0.0 {
            (ctx.inventory_usd / ctx.max_inventory_usd).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let our_bid = round_price(snap.yes_best_bid + 0.01 - 0.01 * inv_ratio);
        let our_ask = round_price(snap.yes_best_ask - 0.01 - 0.005 * inv_ratio);
        let quoted_spread = our_ask - our_bid;
        if quoted_spread < fee2 + MIN_OWN_SPREAD_OVER_FEES {
            return Vec::new();
        }
        if our_bid <= 0.0 || our_ask >= 1.0 {
            return Vec::new();
        }

        let edge = (quoted_spread - fee2) / 2.0;
        let mut out = Vec::with_capacity(2);

        // Quote the bid only while long inventory has room; the ask only
        // while short inventory has room.
        if ctx.inventory_usd < ctx.max_inventory_usd {
            out.push(quote(snap, Direction::Long, OrderSide::Buy, our_bid, edge, inv_ratio, quoted_spread));
        }
        if ctx.inventory_usd > -ctx.max_inventory_usd {
            out.push(quote(snap, Direction::Short, OrderSide::Sell, our_ask, edge, inv_ratio, quoted_spread));
        }
        out
    }
}

fn quote(
    snap: &TickSnapshot,
    direction: Direction,
    side: OrderSide,
    price: f64,
    edge: f64,
    inv_ratio: f64,
    quoted_spread: f64,
) -> Opportunity {
    Opportunity {
        strategy: ID,
        kind: OpportunityKind::SpreadCapture,
        asset: snap.asset.clone(),
        condition_id: snap.condition_id.clone(),
        direction,
        token_id: snap.yes_token_id.clone(),
        side,
        price,
        size_usd: QUOTE_SIZE_USD,
        expected_profit: QUOTE_SIZE_USD * edge,
        confidence: CONFIDENCE,
        edge,
        tif: Tif::Gtc,
        meta: OpportunityMeta::SpreadCapture {
            inventory_ratio: inv_ratio,
            quoted_spread,
        },
    }
}
