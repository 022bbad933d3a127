use crate::market::book::TOP_LEVELS;
use crate::market::snapshot::TickSnapshot;
use crate::math::stats;
use crate::strategies::{Strategy, TickContext};
use crate::types::{
    Direction, Opportunity, OpportunityKind, OpportunityMeta, OrderSide, Tif,
};

/// Orderbook microstructure confluence.
///
/// Four independent sub-signals — depth-imbalance momentum, level sweeps,
/// anomalously large resting orders, and VPIN flow toxicity — each vote a
/// direction. An order goes out only when at least two agree; three or more
/// add a confidence kicker.
pub struct Confluence;

pub const ID: &str = "confluence";

/// Depth-imbalance change measured over this many ticks.
const IMBALANCE_TICKS: usize = 5;
const IMBALANCE_MIN_DELTA: f64 = 0.10;
/// Level-count drop between consecutive ticks that counts as a sweep.
const SWEEP_LEVELS: usize = 3;
/// Snapshots scanned for the resting-size distribution.
const RESTING_LOOKBACK: usize = 10;
const MIN_AGREEING: usize = 2;
const MIN_EDGE: f64 = 0.02;
const MIN_SIZE_USD: f64 = 2.0;
const MAX_SIZE_USD: f64 = 20.0;

#[derive(Clone, Copy)]
struct SubSignal {
    up: bool,
    confidence: f64,
}

impl Strategy for Confluence {
    fn id(&self) -> &'static str {
        ID
    }

    fn evaluate(&self, snap: &TickSnapshot, ctx: &TickContext) -> Vec<Opportunity> {
        let mut votes: Vec<SubSignal> = Vec::with_capacity(4);

        if let Some(v) = imbalance_momentum(snap, ctx) {
            votes.push(v);
        }
        if let Some(v) = level_sweep(snap, ctx) {
            votes.push(v);
        }
        if let Some(v) = large_resting_order(snap, ctx) {
            votes.push(v);
        }
        if ctx.vpin() > crate::math::vpin::TOXIC_THRESHOLD {
            votes.push(SubSignal {
                up: ctx.flow_imbalance > 0.0,
                confidence: 0.75,
            });
        }

        let ups: Vec<&SubSignal> = votes.iter().filter(|v| v.up).collect();
        let downs: Vec<&SubSignal> = votes.iter().filter(|v| !v.up).collect();
        let (agreeing, up) = if ups.len() >= downs.len() {
            (ups, true)
        } else {
            (downs, false)
        };
        if agreeing.len() < MIN_AGREEING {
            return Vec::new();
        }

        let mut confidence =
            agreeing.iter().map(|v| v.confidence).sum::<f64>() / agreeing.len() as f64;
        if agreeing.len() >= 3 {
            confidence += 0.1;
        }
        confidence = confidence.min(0.95);

        let (token_id, price, ask_size, direction) = if up {
            (
                snap.yes_token_id.clone(),
                snap.yes_best_ask,
                snap.yes_book.best_ask_size(),
                Direction::Long,
            )
        } else {
            (
                snap.no_token_id.clone(),
                snap.no_best_ask,
                snap.no_book.best_ask_size(),
                Direction::Short,
            )
        };
        if price <= 0.0 || price >= 1.0 {
            return Vec::new();
        }

        let edge = (confidence - price) * 0.5;
        if edge < MIN_EDGE {
            return Vec::new();
        }
        let size_usd = (ask_size * price).min(MAX_SIZE_USD);
        if size_usd < MIN_SIZE_USD {
            // Sizing underflow: suppressed silently.
            return Vec::new();
        }

        vec![Opportunity {
            strategy: ID,
            kind: OpportunityKind::Confluence,
            asset: snap.asset.clone(),
            condition_id: snap.condition_id.clone(),
            direction,
            token_id,
            side: OrderSide::Buy,
            price,
            size_usd,
            expected_profit: size_usd * edge / price,
            confidence,
            edge,
            tif: Tif::Fok,
            meta: OpportunityMeta::Confluence {
                agreeing: agreeing.len() as u32,
                vpin: ctx.vpin(),
            },
        }]
    }
}

fn bid_share(snap: &TickSnapshot) -> f64 {
    let total = snap.yes_bid_depth_5 + snap.yes_ask_depth_5;
    if total <= 0.0 {
        return 0.5;
    }
    snap.yes_bid_depth_5 / total
}

/// (a) Change in yes-bid share of total depth over 5 ticks.
fn imbalance_momentum(snap: &TickSnapshot, ctx: &TickContext) -> Option<SubSignal> {
    if ctx.history.len() < IMBALANCE_TICKS {
        return None;
    }
    let then = &ctx.history[ctx.history.len() - IMBALANCE_TICKS];
    let delta = bid_share(snap) - bid_share(then);
    if delta.abs() <= IMBALANCE_MIN_DELTA {
        return None;
    }
    Some(SubSignal {
        up: delta > 0.0,
        confidence: (0.6 + delta.abs()).min(0.9),
    })
}

/// (b) A side losing ≥3 levels tick-over-tick was swept.
fn level_sweep(snap: &TickSnapshot, ctx: &TickContext) -> Option<SubSignal> {
    let prev = ctx.history.last()?;
    let ask_drop = prev.yes_book.asks.len().saturating_sub(snap.yes_book.asks.len());
    let bid_drop = prev.yes_book.bids.len().saturating_sub(snap.yes_book.bids.len());
    match (ask_drop >= SWEEP_LEVELS, bid_drop >= SWEEP_LEVELS) {
        (true, false) => Some(SubSignal { up: true, confidence: 0.70 }),
        (false, true) => Some(SubSignal { up: false, confidence: 0.70 }),
        _ => None,
    }
}

/// (c) Current max resting size beyond mean + 3σ of recent sizes on that side.
fn large_resting_order(snap: &TickSnapshot, ctx: &TickContext) -> Option<SubSignal> {
    if ctx.history.len() < 2 {
        return None;
    }
    let recent = &ctx.history[ctx.history.len().saturating_sub(RESTING_LOOKBACK)..];

    let mut bid_sizes: Vec<f64> = Vec::with_capacity(RESTING_LOOKBACK * TOP_LEVELS);
    let mut ask_sizes: Vec<f64> = Vec::with_capacity(RESTING_LOOKBACK * TOP_LEVELS);
    for s in recent {
        bid_sizes.extend(s.yes_book.bids.iter().take(TOP_LEVELS).map(|l| l.size));
        ask_sizes.extend(s.yes_book.asks.iter().take(TOP_LEVELS).map(|l| l.size));
    }
    let bid_big = exceeds_3_sigma(snap.yes_book.max_bid_size(TOP_LEVELS), &bid_sizes);
    let ask_big = exceeds_3_sigma(snap.yes_book.max_ask_size(TOP_LEVELS), &ask_sizes);
    match (bid_big, ask_big) {
        // A wall of bids is support; a wall of asks is resistance.
        (true, false) => Some(SubSignal { up: true, confidence: 0.65 }),
        (false, true) => Some(SubSignal { up: false, confidence: 0.65 }),
        _ => None,
    }
}

fn exceeds_3_sigma(value: f64, sizes: &[f64]) -> bool {
    if sizes.len() < 4 {
        return false;
    }
    let mu = stats::mean(sizes);
    let sigma = stats::stddev(sizes);
    sigma > 0.0 && value > mu + 3.0 * sigma
}
