use crate::market::snapshot::TickSnapshot;
use crate::strategies::{Strategy, TickContext};
use crate::types::{
    Direction, Opportunity, OpportunityKind, OpportunityMeta, OrderSide, Tif,
};

/// Structural YES/NO arbitrage.
///
/// At resolution YES + NO pays exactly $1, so:
///   buy both when  yes_ask + no_ask < 1 − 2·fee,
///   sell both when yes_bid + no_bid > 1 + 2·fee.
/// A third, weaker form fires when one book is mispriced against the other
/// (yes_bid + no_ask < 1 − 2·fee or its mirror): the cheap leg is emitted
/// alone, tagged as requiring atomic cross-side execution.
pub struct StructuralArb;

pub const ID: &str = "structural_arb";

/// Total notional cap across both legs.
const MAX_NOTIONAL_USD: f64 = 30.0;
const CONFIDENCE: f64 = 0.99;

impl Strategy for StructuralArb {
    fn id(&self) -> &'static str {
        ID
    }

    fn evaluate(&self, snap: &TickSnapshot, ctx: &TickContext) -> Vec<Opportunity> {
        let fee2 = 2.0 * ctx.fee_per_side;
        let mut out = Vec::new();

        // ── Buy both: asks sum below $1 net of fees ──
        let ya = snap.yes_best_ask;
        let na = snap.no_best_ask;
        if ya > 0.0 && na > 0.0 && ya + na < 1.0 - fee2 {
            let cost = ya + na;
            let mut shares = snap.yes_book.best_ask_size().min(snap.no_book.best_ask_size());
            if shares * cost > MAX_NOTIONAL_USD {
                shares = MAX_NOTIONAL_USD / cost;
            }
            if shares > 0.0 {
                let profit_total = (1.0 - cost - fee2) * shares;
                let edge = (1.0 - cost - fee2) / cost;
                out.push(leg(
                    snap,
                    OpportunityKind::StructuralArb,
                    Direction::Long,
                    snap.yes_token_id.clone(),
                    OrderSide::Buy,
                    ya,
                    shares * ya,
                    profit_total / 2.0,
                    edge,
                    meta(ya, na, cost, false),
                ));
                out.push(leg(
                    snap,
                    OpportunityKind::StructuralArb,
                    Direction::Short,
                    snap.no_token_id.clone(),
                    OrderSide::Buy,
                    na,
                    shares * na,
                    profit_total / 2.0,
                    edge,
                    meta(ya, na, cost, false),
                ));
            }
        }

        // ── Sell both: bids sum above $1 plus fees ──
        let yb = snap.yes_best_bid;
        let nb = snap.no_best_bid;
        if yb > 0.0 && nb > 0.0 && yb + nb > 1.0 + fee2 {
            let proceeds = yb + nb;
            let mut shares = snap.yes_book.best_bid_size().min(snap.no_book.best_bid_size());
            if shares * proceeds > MAX_NOTIONAL_USD {
                shares = MAX_NOTIONAL_USD / proceeds;
            }
            if shares > 0.0 {
                let profit_total = (proceeds - 1.0 - fee2) * shares;
                let edge = (proceeds - 1.0 - fee2) / proceeds;
                out.push(leg(
                    snap,
                    OpportunityKind::StructuralArb,
                    Direction::Short,
                    snap.yes_token_id.clone(),
                    OrderSide::Sell,
                    yb,
                    shares * yb,
                    profit_total / 2.0,
                    edge,
                    meta(yb, nb, proceeds, false),
                ));
                out.push(leg(
                    snap,
                    OpportunityKind::StructuralArb,
                    Direction::Long,
                    snap.no_token_id.clone(),
                    OrderSide::Sell,
                    nb,
                    shares * nb,
                    profit_total / 2.0,
                    edge,
                    meta(yb, nb, proceeds, false),
                ));
            }
        }

        // ── Cross-book: one book lags the other ──
        // Only meaningful when the two-leg forms found nothing; both firing
        // at once would double up the same mispricing.
        if !out.is_empty() {
            return out;
        }
        // yes_bid + no_ask < 1 − 2f: NO offered cheap against the YES bid.
        if yb > 0.0 && na > 0.0 && yb + na < 1.0 - fee2 {
            let gap = 1.0 - fee2 - (yb + na);
            let shares =
                (snap.no_book.best_ask_size()).min(MAX_NOTIONAL_USD / na.max(1e-9));
            if shares > 0.0 {
                out.push(leg(
                    snap,
                    OpportunityKind::CrossBookArb,
                    Direction::Short,
                    snap.no_token_id.clone(),
                    OrderSide::Buy,
                    na,
                    shares * na,
                    gap * shares,
                    gap / na,
                    meta(yb, na, yb + na, true),
                ));
            }
        }
        // Mirror: no_bid + yes_ask < 1 − 2f: YES offered cheap.
        if nb > 0.0 && ya > 0.0 && nb + ya < 1.0 - fee2 {
            let gap = 1.0 - fee2 - (nb + ya);
            let shares =
                (snap.yes_book.best_ask_size()).min(MAX_NOTIONAL_USD / ya.max(1e-9));
            if shares > 0.0 {
                out.push(leg(
                    snap,
                    OpportunityKind::CrossBookArb,
                    Direction::Long,
                    snap.yes_token_id.clone(),
                    OrderSide::Buy,
                    ya,
                    shares * ya,
                    gap * shares,
                    gap / ya,
                    meta(nb, ya, nb + ya, true),
                ));
            }
        }

        out
    }
}

fn meta(yes_px: f64, no_px: f64, combined_cost: f64, requires_atomic: bool) -> OpportunityMeta {
    OpportunityMeta::Structural {
        yes_px,
        no_px,
        combined_cost,
        requires_atomic,
    }
}

#[allow(clippy::too_many_arguments)]
fn leg(
    snap: &TickSnapshot,
    kind: OpportunityKind,
    direction: Direction,
    token_id: String,
    side: OrderSide,
    price: f64,
    size_usd: f64,
    expected_profit: f64,
    edge: f64,
    meta: OpportunityMeta,
) -> Opportunity {
    Opportunity {
        strategy: ID,
        kind,
        asset: snap.asset.clone(),
        condition_id: snap.condition_id.clone(),
        direction,
        token_id,
        side,
        price,
        size_usd,
        expected_profit,
        confidence: CONFIDENCE,
        edge,
        tif: Tif::Fok,
        meta,
    }
}
