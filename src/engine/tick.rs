use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, Mode};
use crate::market::book::TOP_LEVELS;
use crate::market::feed::FeedHandoff;
use crate::market::provider::{MarketDataProvider, OrderRouter};
use crate::market::snapshot::{SnapshotBuilder, TickSnapshot};
use crate::math::history::PriceHistory;
use crate::math::stats;
use crate::math::vpin::VpinEstimator;
use crate::mm::inventory::InventoryState;
use crate::mm::quoter::{QuoteEngine, QuoteParams};
use crate::oms::{NewOrder, OmsError, OrderManager};
use crate::portfolio::performance::PerformanceTracker;
use crate::portfolio::positions::{OpenPosition, PositionBook};
use crate::portfolio::reconcile::{reconcile, Discrepancy};
use crate::risk::edge_decay::EdgeDecayMonitor;
use crate::risk::gate::{PortfolioView, RiskGate, RiskGateStatus, RiskLimits, RiskVerdict};
use crate::risk::kill_switch::KillSwitch;
use crate::risk::stops::{StopConfig, StopLossManager};
use crate::signals::SignalEngine;
use crate::strategies::{
    confluence::Confluence, latency_arb::LatencyArb, spread_capture::SpreadCapture,
    structural_arb::StructuralArb, evaluate_all, Strategy, TickContext,
};
use crate::telemetry::{AlertLevel, TelemetryEvent};
use crate::types::{
    AggregatedSignal, Direction, InstrumentKey, MarketMeta, Opportunity, OpportunityKind,
    OpportunityMeta, OrderSide, OrderState, OrderType, PositionSide, StopKind, Tif, TradeRecord,
    Venue,
};

/// Markets closer than this to resolution are not traded.
const MIN_RESOLUTION_S: f64 = 60.0;
/// Paper-mode taker fee on filled notional.
const PAPER_FEE_FRAC: f64 = 0.001;
/// Nominal quant-combiner order size before confidence scaling.
const QUANT_SIZE_USD: f64 = 10.0;

const QUANT_ID: &str = "quant";
const MM_ID: &str = "market_making";

/// Per-strategy session counters (reset with the process).
#[derive(Clone, Debug, Default, Serialize)]
pub struct StrategySession {
    pub opportunities: u32,
    pub approved: u32,
    pub filled: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct StrategyStatus {
    pub strategy: String,
    pub opportunities: u32,
    pub approved: u32,
    pub filled: u32,
    pub edge_multiplier: f64,
    pub rolling_sharpe: f64,
}

/// Read-only snapshot for dashboards and the status endpoint. Built as a
/// copy — external readers never touch live engine state.
#[derive(Clone, Debug, Serialize)]
pub struct EngineStatus {
    pub tick: u64,
    pub mode: String,
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub kill_armed: bool,
    pub open_orders: usize,
    pub open_positions: usize,
    pub total_exposure_usd: f64,
    pub unrealized_pnl: f64,
    pub daily_realized_pnl: f64,
    pub risk: RiskGateStatus,
    pub strategies: Vec<StrategyStatus>,
}

/// The 500ms scheduler. One task owns every piece of trading state — the
/// strategy → risk → OMS pipeline is sequential and non-preemptible within a
/// tick; only venue I/O is concurrent (fan-out fetch, joined with a
/// deadline).
pub struct TickEngine {
    pub config: Config,
    provider: Arc<dyn MarketDataProvider>,
    router: Arc<dyn OrderRouter>,

    builder: SnapshotBuilder,
    ref_histories: HashMap<String, PriceHistory>,
    snapshot_history: HashMap<String, Vec<TickSnapshot>>,
    vpins: HashMap<String, VpinEstimator>,

    strategies: Vec<Box<dyn Strategy>>,
    pub signal_engine: SignalEngine,

    pub oms: OrderManager,
    pub positions: PositionBook,
    pub gate: RiskGate,
    pub kill_switch: KillSwitch,
    stops: StopLossManager,
    pub perf: PerformanceTracker,
    edge_decay: HashMap<String, EdgeDecayMonitor>,

    quoter: QuoteEngine,
    pub inventories: HashMap<String, InventoryState>,
    mm_orders: HashMap<String, Vec<u64>>,

    /// Optional streaming handoff from a reference-feed task, drained at the
    /// top of each tick.
    ref_feed: Option<Arc<FeedHandoff>>,
    session: HashMap<String, StrategySession>,
    token_condition: HashMap<String, String>,

    telem: mpsc::Sender<TelemetryEvent>,
    pub tick_count: u64,
}

impl TickEngine {
    pub fn new(
        config: Config,
        provider: Arc<dyn MarketDataProvider>,
        router: Arc<dyn OrderRouter>,
        telem: mpsc::Sender<TelemetryEvent>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
        if config.strategy_structural_arb {
            strategies.push(Box::new(StructuralArb));
        }
        if config.strategy_latency_arb {
            strategies.push(Box::new(LatencyArb));
        }
        if config.strategy_spread_capture {
            strategies.push(Box::new(SpreadCapture));
        }
        if config.strategy_confluence {
            strategies.push(Box::new(Confluence));
        }
        info!(
            mode = config.mode.label(),
            risk = config.risk_level.label(),
            strategies = ?config.enabled_strategies(),
            "tick engine assembled"
        );

        let gate = RiskGate::new(RiskLimits::for_level(config.risk_level));
        let quoter = QuoteEngine::new(QuoteParams {
            gamma: config.mm_gamma,
            kappa: config.mm_kappa,
            max_daily_loss_usd: config.mm_max_daily_loss_usd,
            ..QuoteParams::default()
        });

        Self {
            provider,
            router,
            builder: SnapshotBuilder::new(),
            ref_histories: HashMap::new(),
            snapshot_history: HashMap::new(),
            vpins: HashMap::new(),
            strategies,
            signal_engine: SignalEngine::new(),
            oms: OrderManager::new(),
            positions: PositionBook::new(),
            gate,
            kill_switch: KillSwitch::new(),
            stops: StopLossManager::new(StopConfig::default()),
            perf: PerformanceTracker::new(),
            edge_decay: HashMap::new(),
            quoter,
            inventories: HashMap::new(),
            mm_orders: HashMap::new(),
            ref_feed: None,
            session: HashMap::new(),
            token_condition: HashMap::new(),
            telem,
            tick_count: 0,
            config,
        }
    }

    /// Attach a streaming reference-feed handoff. Without one the engine
    /// pulls the provider once per tick.
    pub fn attach_reference_feed(&mut self, feed: Arc<FeedHandoff>) {
        self.ref_feed = Some(feed);
    }

    /// Last known reference price for an asset (0 before warm-up).
    pub fn reference_price(&self, asset: &str) -> f64 {
        self.builder
            .ring(asset)
            .and_then(|r| r.last())
            .map_or(0.0, |(_, px)| px)
    }

    /// Snapshot copy of engine state for external readers.
    pub fn status(&self, now_ms: i64) -> EngineStatus {
        let mut strategies: Vec<StrategyStatus> = self
            .session
            .iter()
            .map(|(name, s)| StrategyStatus {
                strategy: name.clone(),
                opportunities: s.opportunities,
                approved: s.approved,
                filled: s.filled,
                edge_multiplier: self.edge_decay.get(name).map_or(1.0, |m| m.multiplier()),
                rolling_sharpe: self
                    .edge_decay
                    .get(name)
                    .map_or(0.0, |m| m.rolling_sharpe()),
            })
            .collect();
        strategies.sort_by(|a, b| a.strategy.cmp(&b.strategy));

        EngineStatus {
            tick: self.tick_count,
            mode: self.config.mode.label().to_string(),
            halted: self.gate.is_halted(),
            halt_reason: self.gate.halt_reason().map(|s| s.to_string()),
            kill_armed: self.kill_switch.is_armed(),
            open_orders: self.oms.open_order_count(),
            open_positions: self.positions.open_count(),
            total_exposure_usd: self.positions.total_exposure()
                + self.inventories.values().map(|i| i.position_usd.abs()).sum::<f64>(),
            unrealized_pnl: self.positions.total_unrealized(),
            daily_realized_pnl: self.positions.daily_realized(),
            risk: self.gate.status(now_ms),
            strategies,
        }
    }

    /// Pull venue positions and diff them against the local book. Runs from
    /// a slow loop outside the tick path.
    pub async fn reconcile_once(&self) -> anyhow::Result<Vec<Discrepancy>> {
        let external = self.router.get_positions().await?;
        let diffs = reconcile(&self.positions, &external);
        if !diffs.is_empty() {
            warn!(count = diffs.len(), "position reconciliation found discrepancies");
        }
        Ok(diffs)
    }

    /// Fixed-cadence loop. Returns when the kill switch latches.
    pub async fn run(&mut self) {
        let wall_base = chrono::Utc::now().timestamp_millis();
        let anchor = std::time::Instant::now();
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms.max(1) as u64));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let now_ms = wall_base + anchor.elapsed().as_millis() as i64;
            self.tick(now_ms).await;
            if self.kill_switch.is_armed() {
                warn!("kill switch armed — tick loop stopping");
                break;
            }
        }
    }

    /// One full tick. Errors in any single market, strategy, or opportunity
    /// are contained — the loop always reaches the end of the tick.
    pub async fn tick(&mut self, now_ms: i64) {
        self.tick_count += 1;
        let utc_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        self.positions.roll_daily(&utc_date);

        // ── 1. Active markets (≥60s to resolution) ──
        let markets = match self.provider.active_markets().await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "market enumeration failed, skipping tick");
                return;
            }
        };
        // Re-listings of the same condition are idempotent; intervals the
        // config does not trade are skipped up front.
        let mut active: Vec<MarketMeta> = Vec::new();
        for m in markets {
            if (m.end_ms - now_ms) as f64 / 1000.0 >= MIN_RESOLUTION_S
                && self.config.interval_enabled(&m.interval)
                && !active.iter().any(|a| a.condition_id == m.condition_id)
            {
                active.push(m);
            }
        }

        // ── 2. Reference feed: drain the stream handoff, then pull ──
        if let Some(feed) = &self.ref_feed {
            for (asset, update) in feed.drain() {
                self.builder
                    .on_reference_price(&asset, update.price, update.ts_ms);
                self.ref_histories
                    .entry(asset)
                    .or_insert_with(PriceHistory::with_default_capacity)
                    .push_parts(update.price, update.volume, update.ts_ms);
            }
        }
        let deadline = Duration::from_millis(self.config.fetch_deadline_ms.max(1) as u64);
        let mut assets: Vec<String> = Vec::new();
        for m in &active {
            if !assets.contains(&m.asset) {
                assets.push(m.asset.clone());
            }
        }
        for asset in &assets {
            match tokio::time::timeout(deadline, self.provider.reference_price(asset)).await {
                Ok(Ok(sample)) => {
                    self.builder.on_reference_price(asset, sample.price, now_ms);
                    self.ref_histories
                        .entry(asset.clone())
                        .or_insert_with(PriceHistory::with_default_capacity)
                        .push_parts(sample.price, sample.volume, now_ms);
                }
                Ok(Err(e)) => warn!(asset = %asset, error = %e, "reference fetch failed"),
                Err(_) => warn!(asset = %asset, "reference fetch timed out"),
            }
        }

        // ── 3. Fan-out book fetches, joined with a per-call deadline ──
        let fetches = active.iter().map(|m| {
            let provider = self.provider.clone();
            let yes = m.yes_token_id.clone();
            let no = m.no_token_id.clone();
            async move {
                tokio::join!(
                    tokio::time::timeout(deadline, provider.get_orderbook(&yes)),
                    tokio::time::timeout(deadline, provider.get_orderbook(&no)),
                )
            }
        });
        let books = futures_util::future::join_all(fetches).await;

        let mut snapshots = 0usize;
        let mut opportunities = 0usize;
        let mut approved = 0usize;

        // ── 4–6. Per-market: snapshot → strategies → risk → OMS ──
        for (meta, (yes_res, no_res)) in active.iter().zip(books) {
            let yes_book = match yes_res {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => {
                    debug!(market = %meta.condition_id, error = %e, "yes book unavailable");
                    continue;
                }
                Err(_) => {
                    warn!(market = %meta.condition_id, "yes book fetch timed out");
                    continue;
                }
            };
            let no_book = match no_res {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => {
                    debug!(market = %meta.condition_id, error = %e, "no book unavailable");
                    continue;
                }
                Err(_) => {
                    warn!(market = %meta.condition_id, "no book fetch timed out");
                    continue;
                }
            };

            let Some(snap) = self.builder.build(meta, yes_book, no_book, now_ms) else {
                continue; // one-sided book: skip silently this tick
            };
            snapshots += 1;
            self.token_condition
                .insert(snap.yes_token_id.clone(), snap.condition_id.clone());
            self.token_condition
                .insert(snap.no_token_id.clone(), snap.condition_id.clone());

            // Flow toxicity, marks, exits.
            let flow = {
                let vpin = self
                    .vpins
                    .entry(meta.condition_id.clone())
                    .or_insert_with(VpinEstimator::with_default_window);
                vpin.on_mid(snap.yes_mid);
                vpin.flow_imbalance()
            };
            self.positions.mark_token(&snap.yes_token_id, snap.yes_mid);
            self.positions.mark_token(&snap.no_token_id, snap.no_mid);
            if let Some(inv) = self.inventories.get_mut(&meta.condition_id) {
                inv.mark(snap.yes_mid);
            }
            self.run_stops(&snap, now_ms, &utc_date);

            // Quant pipeline (generators + combiner) and tick strategies.
            let mut opps: Vec<Opportunity> = Vec::new();
            {
                let ref_history = self
                    .ref_histories
                    .entry(snap.asset.clone())
                    .or_insert_with(PriceHistory::with_default_capacity);
                let agg = self.signal_engine.evaluate(&snap, ref_history);
                let _ = self.telem.try_send(TelemetryEvent::Signal {
                    ts_ms: now_ms,
                    condition_id: snap.condition_id.clone(),
                    direction: agg.direction.to_string(),
                    conviction: agg.conviction,
                    confidence: agg.confidence,
                    expected_return_bps: agg.expected_return_bps,
                });
                if self.config.strategy_quant {
                    if let Some(opp) = quant_opportunity(&snap, &agg) {
                        opps.push(opp);
                    }
                }

                let history = self
                    .snapshot_history
                    .entry(snap.condition_id.clone())
                    .or_default();
                let ctx = TickContext {
                    history: history.as_slice(),
                    ref_history,
                    fee_per_side: self.config.fee_per_side,
                    inventory_usd: self
                        .inventories
                        .get(&snap.condition_id)
                        .map_or(0.0, |i| i.position_usd),
                    max_inventory_usd: self.config.mm_max_inventory_usd,
                    flow_imbalance: flow,
                    now_ms,
                };
                let mut buf = Vec::with_capacity(8);
                evaluate_all(&self.strategies, &snap, &ctx, &mut buf);
                opps.extend(buf);
            }

            // Market-making quotes and hedges.
            if self.config.market_making {
                self.requote_market(&snap, flow, &mut opps, now_ms);
            }

            // Risk gate then execution, in emission order.
            opportunities += opps.len();
            for opp in opps {
                let view = self.portfolio_view(&opp, &snap);
                let verdict = self.gate.check(&opp, &view, now_ms);
                {
                    let s = self.session.entry(opp.strategy.to_string()).or_default();
                    s.opportunities += 1;
                    if verdict.is_approved() {
                        s.approved += 1;
                    }
                }
                let _ = self.telem.try_send(TelemetryEvent::Opportunity {
                    ts_ms: now_ms,
                    strategy: opp.strategy.to_string(),
                    condition_id: opp.condition_id.clone(),
                    side: opp.side.to_string(),
                    price: opp.price,
                    size_usd: opp.size_usd,
                    edge: opp.edge,
                    confidence: opp.confidence,
                    approved: verdict.is_approved(),
                    deny_reason: match &verdict {
                        RiskVerdict::Denied { reason } => Some(reason.to_string()),
                        RiskVerdict::Approved { .. } => None,
                    },
                });
                if let RiskVerdict::Approved { size_usd } = verdict {
                    approved += 1;
                    self.execute(&opp, size_usd, now_ms).await;
                }
            }

            // Snapshot history (≤ depth per market), current appended last.
            let ring = self
                .snapshot_history
                .entry(snap.condition_id.clone())
                .or_default();
            if ring.len() == self.config.tick_history_depth {
                ring.remove(0);
            }
            ring.push(snap);
        }

        // A latched gate halt flattens the book exactly once.
        if self.gate.is_halted() && !self.kill_switch.is_armed() {
            let reason = self
                .gate
                .halt_reason()
                .unwrap_or("risk gate halted")
                .to_string();
            self.trigger_kill(&reason, now_ms, &utc_date);
        }

        // ── 7. Stale-order sweep every Nth tick ──
        if self.tick_count % self.config.stale_order_sweep_every == 0 {
            for id in self
                .oms
                .stale_order_ids(self.config.stale_order_max_age_ms, now_ms)
            {
                let client_id = self.oms.order(id).map(|o| o.client_id.clone());
                if self
                    .oms
                    .transition(id, OrderState::Cancelled, "stale order sweep", now_ms)
                    .is_ok()
                    && self.config.mode == Mode::Live
                {
                    if let Some(client_id) = client_id {
                        let router = self.router.clone();
                        tokio::spawn(async move {
                            let _ = router.cancel(&client_id).await;
                        });
                    }
                }
            }
            self.oms.expire_due(now_ms);
        }

        let _ = self.telem.try_send(TelemetryEvent::TickStats {
            ts_ms: now_ms,
            tick: self.tick_count,
            markets: active.len(),
            snapshots,
            opportunities,
            approved,
            open_orders: self.oms.open_order_count(),
            open_positions: self.positions.open_count(),
        });
    }

    /// Pull the previous round of quotes and emit fresh ones.
    fn requote_market(
        &mut self,
        snap: &TickSnapshot,
        flow: f64,
        opps: &mut Vec<Opportunity>,
        now_ms: i64,
    ) {
        if let Some(old) = self.mm_orders.remove(&snap.condition_id) {
            for id in old {
                let _ = self
                    .oms
                    .transition(id, OrderState::Cancelled, "requote", now_ms);
            }
        }

        let inv = self
            .inventories
            .entry(snap.condition_id.clone())
            .or_insert_with(|| InventoryState::new(self.config.mm_max_inventory_usd));
        let sigma = market_mid_vol(
            self.snapshot_history
                .get(&snap.condition_id)
                .map_or(&[][..], |v| v.as_slice()),
            snap.yes_mid,
        );
        let daily_pnl = self.positions.daily_realized();

        if let Some(pair) = self
            .quoter
            .quotes(snap.yes_mid, sigma, inv, flow.abs(), daily_pnl)
        {
            for (quote, side, direction) in [
                (pair.bid, OrderSide::Buy, Direction::Long),
                (pair.ask, OrderSide::Sell, Direction::Short),
            ] {
                if let Some(q) = quote {
                    opps.push(Opportunity {
                        strategy: MM_ID,
                        kind: OpportunityKind::MmQuote,
                        asset: snap.asset.clone(),
                        condition_id: snap.condition_id.clone(),
                        direction,
                        token_id: snap.yes_token_id.clone(),
                        side,
                        price: q.price,
                        size_usd: q.size_usd,
                        expected_profit: q.size_usd * pair.spread_bps / 10_000.0 / 2.0,
                        confidence: 0.55,
                        edge: pair.spread_bps / 10_000.0 / 2.0,
                        tif: Tif::Gtc,
                        meta: OpportunityMeta::MmQuote {
                            reservation: pair.reservation,
                            spread_bps: pair.spread_bps,
                            skew: pair.skew,
                        },
                    });
                }
            }
        }

        if let Some(hedge) = self.quoter.hedge(inv) {
            let price = match hedge.side {
                OrderSide::Buy => snap.yes_best_ask,
                OrderSide::Sell => snap.yes_best_bid,
            };
            if price > 0.0 && price < 1.0 {
                opps.push(Opportunity {
                    strategy: MM_ID,
                    kind: OpportunityKind::Hedge,
                    asset: snap.asset.clone(),
                    condition_id: snap.condition_id.clone(),
                    direction: match hedge.side {
                        OrderSide::Buy => Direction::Long,
                        OrderSide::Sell => Direction::Short,
                    },
                    token_id: snap.yes_token_id.clone(),
                    side: hedge.side,
                    price,
                    size_usd: hedge.size_usd,
                    expected_profit: 0.0,
                    confidence: 1.0,
                    edge: 0.0,
                    tif: Tif::Fok,
                    meta: OpportunityMeta::Hedge { urgent: hedge.urgent },
                });
            }
        }
    }

    /// Evaluate stops for every open position on this market's tokens.
    fn run_stops(&mut self, snap: &TickSnapshot, now_ms: i64, utc_date: &str) {
        let mut hits: Vec<(String, StopKind, f64)> = Vec::new();
        for p in self.positions.open_positions() {
            if p.token_id != snap.yes_token_id && p.token_id != snap.no_token_id {
                continue;
            }
            if let Some(hit) = self.stops.evaluate(p, now_ms) {
                hits.push((p.id.clone(), hit.kind, hit.stop_price));
            }
        }
        for (id, kind, stop_price) in hits {
            self.close_position(&id, stop_price, Some(kind), now_ms, utc_date);
        }
    }

    /// Close a position and feed the outcome to every consumer of trade
    /// results (performance, edge decay, loss windows, combiner weights).
    fn close_position(
        &mut self,
        position_id: &str,
        exit_price: f64,
        stop: Option<StopKind>,
        now_ms: i64,
        utc_date: &str,
    ) {
        let Some(record) = self.positions.close(position_id, exit_price, now_ms) else {
            return;
        };
        self.record_trade(&record, stop, now_ms, utc_date);
    }

    fn record_trade(
        &mut self,
        record: &TradeRecord,
        stop: Option<StopKind>,
        now_ms: i64,
        utc_date: &str,
    ) {
        self.perf.record(record.clone());
        self.gate
            .record_trade(&record.asset, record.pnl, record.size_usd, utc_date, now_ms);
        self.edge_decay
            .entry(record.strategy.clone())
            .or_default()
            .record(record.pnl);
        if record.strategy == QUANT_ID {
            self.signal_engine.combiner.record_outcome(
                &[
                    crate::signals::momentum::NAME,
                    crate::signals::mean_reversion::NAME,
                    crate::signals::microstructure::NAME,
                    crate::signals::cross_asset::NAME,
                    crate::signals::spread_regime::NAME,
                    crate::signals::volume_profile::NAME,
                ],
                record.pnl,
            );
        }
        let _ = self.telem.try_send(TelemetryEvent::TradeClosed {
            ts_ms: now_ms,
            strategy: record.strategy.clone(),
            pnl: record.pnl,
            hold_ms: record.hold_ms(),
            stop: stop.map(|s| s.to_string()),
        });
    }

    fn portfolio_view(&self, opp: &Opportunity, snap: &TickSnapshot) -> PortfolioView {
        let inventory_total: f64 = self.inventories.values().map(|i| i.position_usd.abs()).sum();
        let book = if opp.token_id == snap.no_token_id {
            &snap.no_book
        } else {
            &snap.yes_book
        };
        let book_depth_usd = match opp.side {
            OrderSide::Buy => book
                .asks
                .iter()
                .take(TOP_LEVELS)
                .map(|l| l.price * l.size)
                .sum(),
            OrderSide::Sell => book
                .bids
                .iter()
                .take(TOP_LEVELS)
                .map(|l| l.price * l.size)
                .sum(),
        };
        PortfolioView {
            asset_exposure_usd: self
                .positions
                .exposure_by_asset()
                .get(&opp.asset)
                .copied()
                .unwrap_or(0.0)
                + self
                    .inventories
                    .get(&opp.condition_id)
                    .map_or(0.0, |i| i.position_usd.abs()),
            total_exposure_usd: self.positions.total_exposure() + inventory_total,
            open_order_count: self.oms.open_order_count(),
            book_depth_usd,
            time_to_resolution_s: snap.time_to_resolution_s,
            ref_age_ms: self
                .builder
                .ring(&opp.asset)
                .and_then(|r| r.last())
                .map_or(i64::MAX, |(ts, _)| (snap.ts_ms - ts).max(0)),
            edge_multiplier: self
                .edge_decay
                .get(opp.strategy)
                .map_or(1.0, |m| m.multiplier()),
        }
    }

    /// Create and route one approved opportunity. Any router or transition
    /// failure terminates only this opportunity.
    async fn execute(&mut self, opp: &Opportunity, size_usd: f64, now_ms: i64) {
        let order_type = match opp.kind {
            OpportunityKind::Hedge | OpportunityKind::StopExit => OrderType::Market,
            _ => OrderType::Limit,
        };
        let id = self.oms.create(
            NewOrder {
                instrument: InstrumentKey::new(Venue::PredictionClob, opp.asset.clone()),
                token_id: opp.token_id.clone(),
                side: opp.side,
                order_type,
                tif: opp.tif,
                price: opp.price,
                size: size_usd,
                strategy: opp.strategy.to_string(),
                signal_id: None,
            },
            now_ms,
        );

        for (state, reason) in [
            (OrderState::Validated, "risk approved"),
            (OrderState::Submitted, "dispatched"),
        ] {
            if let Err(e) = self.oms.transition(id, state, reason, now_ms) {
                warn!(order_id = id, error = %e, "order aborted before submit");
                return;
            }
        }
        let _ = self.telem.try_send(TelemetryEvent::OrderPlaced {
            ts_ms: now_ms,
            order_id: id,
            strategy: opp.strategy.to_string(),
            token_id: opp.token_id.clone(),
            side: opp.side.to_string(),
            price: opp.price,
            size_usd,
        });
        self.gate.on_order_sent(opp.strategy, &opp.condition_id, now_ms);

        if self.config.mode == Mode::Live {
            let order = self.oms.order(id).cloned().expect("order just created");
            match self.router.place(&order).await {
                Ok(ack) if ack.success => {
                    let _ = self.oms.transition(id, OrderState::Acknowledged, "venue ack", now_ms);
                    if opp.kind == OpportunityKind::MmQuote {
                        self.mm_orders
                            .entry(opp.condition_id.clone())
                            .or_default()
                            .push(id);
                    }
                }
                Ok(ack) => {
                    let msg = ack.err_msg.unwrap_or_else(|| "rejected".into());
                    let _ = self.oms.transition(id, OrderState::Rejected, &msg, now_ms);
                }
                Err(e) => {
                    let _ = self
                        .oms
                        .transition(id, OrderState::Error, &format!("route: {e}"), now_ms);
                }
            }
            return;
        }

        // Paper / backtest: synchronous walk to FILLED with the taker fee.
        if self
            .oms
            .transition(id, OrderState::Acknowledged, "paper ack", now_ms)
            .is_err()
        {
            return;
        }
        let fee = PAPER_FEE_FRAC * size_usd;
        match self.oms.apply_fill(id, opp.price, size_usd, fee, now_ms) {
            Ok(_) => {
                self.session
                    .entry(opp.strategy.to_string())
                    .or_default()
                    .filled += 1;
                let _ = self.telem.try_send(TelemetryEvent::Fill {
                    ts_ms: now_ms,
                    order_id: id,
                    price: opp.price,
                    size_usd,
                    fee,
                });
                self.on_entry_fill(opp, id, size_usd, now_ms);
            }
            Err(e) => warn!(order_id = id, error = %e, "paper fill refused"),
        }
    }

    /// Route a fill into inventory (quoting flows) or a tracked position
    /// (directional entries).
    fn on_entry_fill(&mut self, opp: &Opportunity, order_id: u64, size_usd: f64, now_ms: i64) {
        match opp.kind {
            OpportunityKind::SpreadCapture
            | OpportunityKind::MmQuote
            | OpportunityKind::Hedge => {
                self.inventories
                    .entry(opp.condition_id.clone())
                    .or_insert_with(|| InventoryState::new(self.config.mm_max_inventory_usd))
                    .on_fill(opp.side, opp.price, size_usd);
            }
            OpportunityKind::StopExit => {
                // Exit fills are realized by close_position.
            }
            _ => {
                // Position side follows the order side on THAT token: buying
                // NO is a long NO-token position, marked with NO prices.
                let side = match opp.side {
                    OrderSide::Buy => PositionSide::Long,
                    OrderSide::Sell => PositionSide::Short,
                };
                let entry_vol = market_mid_vol(
                    self.snapshot_history
                        .get(&opp.condition_id)
                        .map_or(&[][..], |v| v.as_slice()),
                    opp.price,
                );
                self.positions.open(
                    OpenPosition {
                        instrument: InstrumentKey::new(
                            Venue::PredictionClob,
                            opp.asset.clone(),
                        ),
                        token_id: opp.token_id.clone(),
                        side,
                        size_usd,
                        entry_price: opp.price,
                        strategy: opp.strategy.to_string(),
                        order_id,
                        entry_vol,
                    },
                    now_ms,
                );
            }
        }
    }

    /// Fill callback surface for live adapters: route a venue fill through
    /// the OMS and into inventory or a tracked position, mirroring the
    /// paper path.
    pub fn apply_venue_fill(
        &mut self,
        order_id: u64,
        price: f64,
        size_usd: f64,
        fee: f64,
        now_ms: i64,
    ) -> Result<OrderState, OmsError> {
        let state = self.oms.apply_fill(order_id, price, size_usd, fee, now_ms)?;
        let order = self.oms.order(order_id).cloned().expect("fill just applied");
        self.session
            .entry(order.strategy.clone())
            .or_default()
            .filled += 1;
        let _ = self.telem.try_send(TelemetryEvent::Fill {
            ts_ms: now_ms,
            order_id,
            price,
            size_usd,
            fee,
        });

        if order.strategy == MM_ID || order.strategy == crate::strategies::spread_capture::ID {
            if let Some(cond) = self.token_condition.get(&order.token_id).cloned() {
                self.inventories
                    .entry(cond)
                    .or_insert_with(|| InventoryState::new(self.config.mm_max_inventory_usd))
                    .on_fill(order.side, price, size_usd);
                return Ok(state);
            }
        }

        let side = match order.side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };
        let entry_vol = self
            .token_condition
            .get(&order.token_id)
            .and_then(|c| self.snapshot_history.get(c))
            .map_or(0.0, |h| market_mid_vol(h, price));
        self.positions.open(
            OpenPosition {
                instrument: order.instrument.clone(),
                token_id: order.token_id.clone(),
                side,
                size_usd,
                entry_price: price,
                strategy: order.strategy.clone(),
                order_id,
                entry_vol,
            },
            now_ms,
        );
        Ok(state)
    }

    /// Flatten everything: cancel-all, close positions at last marks, halt.
    pub fn trigger_kill(&mut self, reason: &str, now_ms: i64, utc_date: &str) {
        let report = self.kill_switch.trigger(
            reason,
            &mut self.oms,
            &mut self.positions,
            &mut self.gate,
            now_ms,
            utc_date,
        );
        if !report.acted {
            return;
        }
        for record in &report.closed_trades {
            self.perf.record(record.clone());
            self.edge_decay
                .entry(record.strategy.clone())
                .or_default()
                .record(record.pnl);
        }
        let _ = self.telem.try_send(TelemetryEvent::Alert {
            ts_ms: now_ms,
            level: AlertLevel::Critical,
            message: format!(
                "kill switch armed: {reason} ({} orders cancelled, {} positions closed, est pnl {:+.2})",
                report.cancelled_orders.len(),
                report.closed_trades.len(),
                report.estimated_pnl,
            ),
        });
    }
}

/// Realized vol of a market's recent YES mids (log-return stddev over the
/// snapshot ring, current mid appended).
fn market_mid_vol(history: &[TickSnapshot], current_mid: f64) -> f64 {
    if history.len() < 3 {
        return 0.0;
    }
    let mut returns = Vec::with_capacity(history.len());
    let mut prev = history[0].yes_mid;
    for s in history.iter().skip(1).map(|s| s.yes_mid).chain([current_mid]) {
        if prev > 0.0 && s > 0.0 {
            returns.push((s / prev).ln());
        }
        prev = s;
    }
    stats::stddev(&returns)
}

/// Convert a non-FLAT aggregated signal into a taker order on the voted
/// side, sized by confidence.
fn quant_opportunity(snap: &TickSnapshot, agg: &AggregatedSignal) -> Option<Opportunity> {
    let (token_id, price, direction) = match agg.direction {
        Direction::Long => (snap.yes_token_id.clone(), snap.yes_best_ask, Direction::Long),
        Direction::Short => (snap.no_token_id.clone(), snap.no_best_ask, Direction::Short),
        Direction::Flat => return None,
    };
    if price <= 0.0 || price >= 1.0 {
        return None;
    }
    Some(Opportunity {
        strategy: QUANT_ID,
        kind: OpportunityKind::QuantSignal,
        asset: snap.asset.clone(),
        condition_id: snap.condition_id.clone(),
        direction,
        token_id,
        side: OrderSide::Buy,
        price,
        size_usd: QUANT_SIZE_USD * agg.confidence,
        expected_profit: QUANT_SIZE_USD * agg.confidence * agg.conviction.abs() * 0.05,
        confidence: agg.confidence,
        edge: agg.conviction.abs() * agg.confidence * 0.05,
        tif: Tif::Fok,
        meta: OpportunityMeta::Quant {
            conviction: agg.conviction,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::book::Book;
    use crate::market::provider::SimulatedVenue;

    fn market(cond: &str, yes: &str, no: &str, end_ms: i64) -> MarketMeta {
        MarketMeta {
            asset: "BTC".into(),
            interval: "5m".into(),
            condition_id: cond.into(),
            yes_token_id: yes.into(),
            no_token_id: no.into(),
            end_ms,
        }
    }

    // Priced so no structural form fires: asks sum 1.03, bids sum 0.96,
    // cross sums 1.00 and 0.99 (at the strict boundary).
    fn fair_books(venue: &SimulatedVenue, yes: &str, no: &str) {
        venue.set_book(yes, Book::from_levels(vec![(0.49, 100.0)], vec![(0.52, 100.0)]));
        venue.set_book(no, Book::from_levels(vec![(0.47, 100.0)], vec![(0.51, 100.0)]));
    }

    fn engine_with(venue: Arc<SimulatedVenue>, config: Config) -> (TickEngine, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel(4096);
        let engine = TickEngine::new(config, venue.clone(), venue, tx);
        (engine, rx)
    }

    // Everything off; each test switches on exactly what it exercises.
    fn quiet_config() -> Config {
        let mut c = Config::default();
        c.strategy_structural_arb = false;
        c.strategy_latency_arb = false;
        c.strategy_spread_capture = false;
        c.strategy_confluence = false;
        c.strategy_quant = false;
        c.market_making = false;
        c
    }

    /// Scenario: YES asks (0.45, 20), NO asks
    /// (0.50, 20), fee 0.005 — a mispriced pair.
    /// Expected: One tick creates and paper-fills both FOK legs
    /// (VALIDATED→SUBMITTED→ACKNOWLEDGED→FILLED), opens two positions, and
    /// charges the ~0.1% paper fee.
    #[tokio::test]
    async fn test_structural_arb_end_to_end() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);

        engine.tick(1_000).await;

        let filled: Vec<_> = engine
            .oms
            .open_orders()
            .iter()
            .map(|o| o.id)
            .collect();
        assert!(filled.is_empty(), "paper orders should all be terminal");
        assert_eq!(engine.positions.open_count(), 2, "both legs open positions");
        let exposure = engine.positions.total_exposure();
        // 20 shares: $9 YES + $10 NO
        assert!((exposure - 19.0).abs() < 1e-6, "exposure = {exposure}");

        // The YES order walked the full lifecycle.
        let order = engine.oms.order(1).unwrap();
        assert_eq!(order.state, OrderState::Filled);
        let states: Vec<OrderState> = order.state_history.iter().map(|c| c.to).collect();
        assert_eq!(
            states,
            vec![
                OrderState::Validated,
                OrderState::Submitted,
                OrderState::Acknowledged,
                OrderState::Filled
            ]
        );
        let fee = order.fills[0].fee;
        assert!((fee - 0.001 * order.size).abs() < 1e-9);
    }

    /// Scenario: Fairly priced, quiet market with the directional strategies
    /// enabled.
    /// Expected: A tick produces no orders and no positions.
    #[tokio::test]
    async fn test_fair_market_no_trades() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        fair_books(&venue, "y1", "n1");
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        c.strategy_latency_arb = true;
        c.strategy_confluence = true;
        c.strategy_quant = true;
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;
        assert_eq!(engine.oms.open_order_count(), 0);
        assert_eq!(engine.positions.open_count(), 0);
    }

    /// Scenario: Reference price rips 0.7%/tick for 25 ticks while the YES
    /// book sits frozen at mid 0.50.
    /// Expected: Latency arb detects the stale book and buys YES FOK; a
    /// position opens attributed to latency_arb.
    #[tokio::test]
    async fn test_latency_arb_end_to_end() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        fair_books(&venue, "y1", "n1");

        let mut c = quiet_config();
        c.strategy_latency_arb = true;
        let (mut engine, _rx) = engine_with(venue.clone(), c);

        let mut px = 95_000.0;
        for t in 0..25 {
            px *= 1.007;
            let now = 1_000 + t * 500;
            venue.set_reference("BTC", px, 1.0, now);
            engine.tick(now).await;
            if engine.positions.open_count() > 0 {
                break;
            }
        }
        assert_eq!(engine.positions.open_count(), 1, "latency arb should fire once warm");
        let pos = &engine.positions.open_positions()[0];
        assert_eq!(pos.strategy, "latency_arb");
        assert_eq!(pos.token_id, "y1");
    }

    /// Scenario: Structural arb opens two legs at 0.45/0.50, then both mids
    /// crash more than 3% the next tick.
    /// Expected: Fixed stops close both positions at a loss; the trades land
    /// in the performance tracker.
    #[tokio::test]
    async fn test_stop_loss_closes_positions() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue.clone(), c);
        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 2);

        // Crash both tokens well past the 3% fixed stop.
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.42, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.43, 20.0)], vec![(0.45, 20.0)]));
        engine.tick(1_500).await;

        assert_eq!(engine.perf.len(), 2, "both stop-outs recorded");
        let report = engine.perf.report(None, None, 2_000);
        assert_eq!(report.losses, 2);
        assert!(report.net_pnl < 0.0);
    }

    /// Scenario: A mispriced 1h market while the config trades only 5m.
    /// Expected: Filtered before fetch — nothing trades.
    #[tokio::test]
    async fn test_interval_filter_skips_market() {
        let venue = Arc::new(SimulatedVenue::new());
        let mut hourly = market("c1", "y1", "n1", 10_000_000);
        hourly.interval = "1h".into();
        venue.add_market(hourly);
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        c.intervals = vec![crate::config::Interval::M5];
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 0);
    }

    /// Scenario: Ten live orders already resting (the moderate concurrent
    /// cap) when a mispriced market shows up.
    /// Expected: Denied by the concurrent-order cap — no new positions.
    #[tokio::test]
    async fn test_concurrent_cap_end_to_end() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);
        for _ in 0..10 {
            engine.oms.create(
                NewOrder {
                    instrument: InstrumentKey::new(Venue::PredictionClob, "BTC"),
                    token_id: "y1".into(),
                    side: OrderSide::Buy,
                    order_type: OrderType::Limit,
                    tif: Tif::Gtc,
                    price: 0.40,
                    size: 5.0,
                    strategy: "spread_capture".into(),
                    signal_id: None,
                },
                500,
            );
        }

        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 0, "cap blocks new risk");
        let status = engine.status(1_000);
        let s = status
            .strategies
            .iter()
            .find(|s| s.strategy == "structural_arb")
            .unwrap();
        assert_eq!(s.approved, 0);
        assert_eq!(s.opportunities, 2);
    }

    /// Scenario: Streaming reference updates published into an attached
    /// handoff while the provider has no pullable reference price.
    /// Expected: The tick drains the handoff — the engine's last reference
    /// price reflects the newest streamed sample.
    #[tokio::test]
    async fn test_reference_feed_handoff_drained() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        fair_books(&venue, "y1", "n1");
        // No set_reference: the pull path warns and contributes nothing.

        let (mut engine, _rx) = engine_with(venue, quiet_config());
        let feed = FeedHandoff::new(256);
        engine.attach_reference_feed(feed.clone());

        feed.publish("BTC", crate::market::feed::ReferenceUpdate {
            price: 94_000.0,
            volume: 0.5,
            ts_ms: 400,
        });
        feed.publish("BTC", crate::market::feed::ReferenceUpdate {
            price: 94_100.0,
            volume: 0.7,
            ts_ms: 900,
        });
        engine.tick(1_000).await;

        assert!((engine.reference_price("BTC") - 94_100.0).abs() < 1e-9);
        assert!(feed.is_empty(), "handoff fully drained");
    }

    /// Scenario: Status snapshot after a tick that approved and filled two
    /// structural-arb legs.
    /// Expected: Counters for structural_arb show 2/2/2; exposure and mode
    /// are reported; nothing halted.
    #[tokio::test]
    async fn test_status_snapshot() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;

        let status = engine.status(1_000);
        assert_eq!(status.tick, 1);
        assert_eq!(status.mode, "paper");
        assert!(!status.halted && !status.kill_armed);
        assert!(!status.risk.halted);
        assert_eq!(status.risk.kill_remaining_s, 0.0);
        assert_eq!(status.open_positions, 2);
        assert!((status.total_exposure_usd - 19.0).abs() < 1e-6);
        let s = status
            .strategies
            .iter()
            .find(|s| s.strategy == "structural_arb")
            .expect("structural_arb session stats");
        assert_eq!(s.opportunities, 2);
        assert_eq!(s.approved, 2);
        assert_eq!(s.filled, 2);
    }

    /// Scenario: Live-style fill callback on an ACKNOWLEDGED order (the ack
    /// path an adapter would drive).
    /// Expected: Order FILLED and a long position opened on the token.
    #[tokio::test]
    async fn test_apply_venue_fill_opens_position() {
        let venue = Arc::new(SimulatedVenue::new());
        let (mut engine, _rx) = engine_with(venue, quiet_config());
        let id = engine.oms.create(
            NewOrder {
                instrument: InstrumentKey::new(Venue::PredictionClob, "BTC"),
                token_id: "y1".into(),
                side: OrderSide::Buy,
                order_type: OrderType::Limit,
                tif: Tif::Fok,
                price: 0.50,
                size: 10.0,
                strategy: "latency_arb".into(),
                signal_id: None,
            },
            0,
        );
        engine.oms.transition(id, OrderState::Validated, "ok", 1).unwrap();
        engine.oms.transition(id, OrderState::Submitted, "sent", 2).unwrap();
        engine.oms.transition(id, OrderState::Acknowledged, "ack", 3).unwrap();

        let state = engine.apply_venue_fill(id, 0.50, 10.0, 0.01, 10).unwrap();
        assert_eq!(state, OrderState::Filled);
        assert_eq!(engine.positions.open_count(), 1);
        let pos = &engine.positions.open_positions()[0];
        assert_eq!(pos.side, PositionSide::Long);
        assert_eq!(pos.token_id, "y1");

        // A second fill on a terminal order is refused.
        assert!(engine.apply_venue_fill(id, 0.50, 1.0, 0.0, 11).is_err());
    }

    /// Scenario: Local position exists but the venue reports nothing.
    /// Expected: reconcile_once surfaces one MissingExternal discrepancy.
    #[tokio::test]
    async fn test_reconcile_once() {
        let venue = Arc::new(SimulatedVenue::new());
        let (mut engine, _rx) = engine_with(venue, quiet_config());
        engine.positions.open(
            OpenPosition {
                instrument: InstrumentKey::new(Venue::PredictionClob, "BTC"),
                token_id: "y1".into(),
                side: PositionSide::Long,
                size_usd: 10.0,
                entry_price: 0.50,
                strategy: "latency_arb".into(),
                order_id: 1,
                entry_vol: 0.0,
            },
            0,
        );
        let diffs = engine.reconcile_once().await.unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(matches!(diffs[0], Discrepancy::MissingExternal { .. }));
    }

    /// Scenario: The same market listed twice by the venue.
    /// Expected: Registration is idempotent — one snapshot, one pair of arb
    /// legs, identical to a single listing.
    #[tokio::test]
    async fn test_duplicate_listing_idempotent() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 2, "one pair of legs, not two");
    }

    /// Scenario: One market's YES book fetch fails (transient I/O); a second
    /// healthy market is mispriced.
    /// Expected: The failing market is skipped silently, the healthy one
    /// still trades — errors never kill the tick.
    #[tokio::test]
    async fn test_transient_failure_isolated() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("bad", "yb", "nb", 10_000_000));
        venue.add_market(market("good", "yg", "ng", 10_000_000));
        venue.fail_token("yb");
        venue.set_book("nb", Book::from_levels(vec![(0.46, 10.0)], vec![(0.50, 10.0)]));
        venue.set_book("yg", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("ng", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 2, "healthy market traded");
    }

    /// Scenario: Market 30s from resolution with a juicy mispricing.
    /// Expected: Filtered out before fetch — nothing trades.
    #[tokio::test]
    async fn test_near_resolution_market_skipped() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 31_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 20.0)], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 0);
    }

    /// Scenario: A one-sided NO book (no bids).
    /// Expected: Snapshot skipped silently; tick completes.
    #[tokio::test]
    async fn test_one_sided_book_skipped() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 10_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.40, 20.0)], vec![(0.45, 20.0)]));
        venue.set_book("n1", Book::from_levels(vec![], vec![(0.50, 20.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_structural_arb = true;
        let (mut engine, _rx) = engine_with(venue, c);
        engine.tick(1_000).await;
        assert_eq!(engine.positions.open_count(), 0);
        assert_eq!(engine.tick_count, 1);
    }

    /// Scenario: A GTC order resting 35s (manually staged in the OMS), fair
    /// market, sweep-every-10 config.
    /// Expected: The 10th tick cancels it as stale; earlier ticks leave it.
    #[tokio::test]
    async fn test_stale_sweep_on_nth_tick() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        fair_books(&venue, "y1", "n1");
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let (mut engine, _rx) = engine_with(venue, quiet_config());
        let id = engine.oms.create(
            NewOrder {
                instrument: InstrumentKey::new(Venue::PredictionClob, "c1"),
                token_id: "y1".into(),
                side: OrderSide::Buy,
                order_type: OrderType::Limit,
                tif: Tif::Gtc,
                price: 0.40,
                size: 5.0,
                strategy: "spread_capture".into(),
                signal_id: None,
            },
            0,
        );

        // Ticks 1..9: order aged > 30s but no sweep yet.
        for t in 1..10 {
            engine.tick(40_000 + t).await;
            assert_eq!(engine.oms.state(id), Some(OrderState::Created), "tick {t}");
        }
        engine.tick(40_010).await; // tick 10
        assert_eq!(engine.oms.state(id), Some(OrderState::Cancelled));
    }

    /// Scenario: Gate halted (drawdown latch) with open positions on a fair
    /// market.
    /// Expected: The next tick pulls the kill switch once — orders cancelled,
    /// positions flattened, engine reports armed.
    #[tokio::test]
    async fn test_halt_triggers_kill_switch() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        fair_books(&venue, "y1", "n1");
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let (mut engine, _rx) = engine_with(venue, quiet_config());
        engine.positions.open(
            OpenPosition {
                instrument: InstrumentKey::new(Venue::PredictionClob, "BTC"),
                token_id: "y1".into(),
                side: PositionSide::Long,
                size_usd: 10.0,
                entry_price: 0.50,
                strategy: "latency_arb".into(),
                order_id: 99,
                entry_vol: 0.0,
            },
            0,
        );
        engine.gate.halt("test drawdown");

        engine.tick(1_000).await;
        assert!(engine.kill_switch.is_armed());
        assert_eq!(engine.positions.open_count(), 0, "flattened");
        assert_eq!(engine.perf.len(), 1, "flatten recorded as a trade");
    }

    /// Scenario: Ten ticks of steadily rising mids (hot one-sided VPIN),
    /// then the bid side trebles in depth.
    /// Expected: Confluence finds two agreeing votes (imbalance momentum +
    /// VPIN) and buys YES FOK — one position attributed to confluence.
    #[tokio::test]
    async fn test_confluence_end_to_end() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_confluence = true;
        let (mut engine, _rx) = engine_with(venue.clone(), c);

        for t in 0..10i64 {
            let d = t as f64 * 0.003;
            venue.set_book(
                "y1",
                Book::from_levels(vec![(0.49 + d, 100.0)], vec![(0.52 + d, 100.0)]),
            );
            venue.set_book(
                "n1",
                Book::from_levels(vec![(0.47 - d, 100.0)], vec![(0.51 - d, 100.0)]),
            );
            engine.tick(1_000 + t * 500).await;
        }
        assert_eq!(engine.positions.open_count(), 0, "no signal while balanced");

        // Bid wall appears with the trend still rising.
        let d = 10.0 * 0.003;
        venue.set_book(
            "y1",
            Book::from_levels(vec![(0.49 + d, 300.0)], vec![(0.52 + d, 100.0)]),
        );
        venue.set_book(
            "n1",
            Book::from_levels(vec![(0.47 - d, 100.0)], vec![(0.51 - d, 100.0)]),
        );
        engine.tick(6_000).await;

        assert_eq!(engine.positions.open_count(), 1, "confluence should fire");
        let pos = &engine.positions.open_positions()[0];
        assert_eq!(pos.strategy, "confluence");
        assert_eq!(pos.token_id, "y1");
        assert_eq!(pos.side, PositionSide::Long);
    }

    /// Scenario: Acknowledged GTD order expiring at t=5s; ticks run past it
    /// to the 10th-tick sweep.
    /// Expected: The sweep expires it (EXPIRED, not CANCELLED).
    #[tokio::test]
    async fn test_gtd_expiry_on_sweep() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        fair_books(&venue, "y1", "n1");
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let (mut engine, _rx) = engine_with(venue, quiet_config());
        let id = engine.oms.create(
            NewOrder {
                instrument: InstrumentKey::new(Venue::PredictionClob, "BTC"),
                token_id: "y1".into(),
                side: OrderSide::Buy,
                order_type: OrderType::Limit,
                tif: Tif::Gtd(5_000),
                price: 0.40,
                size: 5.0,
                strategy: "spread_capture".into(),
                signal_id: None,
            },
            4_000,
        );
        engine.oms.transition(id, OrderState::Validated, "ok", 4_001).unwrap();
        engine.oms.transition(id, OrderState::Submitted, "sent", 4_002).unwrap();
        engine.oms.transition(id, OrderState::Acknowledged, "ack", 4_003).unwrap();

        for t in 0..10i64 {
            engine.tick(6_000 + t).await;
        }
        assert_eq!(engine.oms.state(id), Some(OrderState::Expired));
    }

    /// Scenario: quant_opportunity mapping for LONG, SHORT, and FLAT
    /// aggregates on a fair snapshot.
    /// Expected: LONG buys the YES ask, SHORT buys the NO ask sized by
    /// confidence, FLAT yields nothing.
    #[test]
    fn test_quant_opportunity_mapping() {
        let builder = SnapshotBuilder::new();
        let meta = market("c1", "y1", "n1", 10_000_000);
        let snap = builder
            .build(
                &meta,
                Book::from_levels(vec![(0.49, 100.0)], vec![(0.52, 100.0)]),
                Book::from_levels(vec![(0.47, 100.0)], vec![(0.51, 100.0)]),
                1_000,
            )
            .unwrap();

        let agg = |direction: Direction| AggregatedSignal {
            direction,
            conviction: 0.8,
            confidence: 0.7,
            expected_return_bps: 80.0,
            expected_hold_ms: 30_000,
            components: Vec::new(),
        };

        let long = quant_opportunity(&snap, &agg(Direction::Long)).unwrap();
        assert_eq!(long.token_id, "y1");
        assert!((long.price - 0.52).abs() < 1e-12);
        assert!((long.size_usd - 7.0).abs() < 1e-9, "sized by confidence");

        let short = quant_opportunity(&snap, &agg(Direction::Short)).unwrap();
        assert_eq!(short.token_id, "n1");
        assert!((short.price - 0.51).abs() < 1e-12);

        assert!(quant_opportunity(&snap, &agg(Direction::Flat)).is_none());
    }

    /// Scenario: Spread capture alone on a wide (6-cent) market, two ticks
    /// 500ms apart.
    /// Expected: First tick joins both sides (fills route to inventory, not
    /// positions); the second tick is inside the 2s cooldown and adds
    /// nothing.
    #[tokio::test]
    async fn test_spread_capture_end_to_end() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        venue.set_book("y1", Book::from_levels(vec![(0.47, 100.0)], vec![(0.53, 100.0)]));
        venue.set_book("n1", Book::from_levels(vec![(0.45, 100.0)], vec![(0.51, 100.0)]));
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.strategy_spread_capture = true;
        let (mut engine, _rx) = engine_with(venue, c);

        engine.tick(1_000).await;
        let session = engine.status(1_000);
        let s = session
            .strategies
            .iter()
            .find(|s| s.strategy == "spread_capture")
            .unwrap();
        assert_eq!(s.approved, 2, "both quote sides approved");
        assert_eq!(engine.positions.open_count(), 0, "quote fills are inventory");
        let inv = engine.inventories.get("c1").expect("inventory created");
        assert!(inv.position_usd.abs() < 1e-9, "bid and ask fills net flat");

        engine.tick(1_500).await;
        let s2 = engine.status(1_500);
        let s2 = s2
            .strategies
            .iter()
            .find(|s| s.strategy == "spread_capture")
            .unwrap();
        assert_eq!(s2.approved, 2, "cooldown paces the requote");
        assert!(s2.opportunities > 2, "quotes were emitted and denied");
    }

    /// Scenario: Market making enabled on a fair, calm market.
    /// Expected: Paper quotes fill into the MM inventory (not positions);
    /// inventory stays inside ±max.
    #[tokio::test]
    async fn test_mm_quotes_fill_inventory() {
        let venue = Arc::new(SimulatedVenue::new());
        venue.add_market(market("c1", "y1", "n1", 100_000_000));
        fair_books(&venue, "y1", "n1");
        venue.set_reference("BTC", 95_000.0, 1.0, 500);

        let mut c = quiet_config();
        c.market_making = true;
        let (mut engine, _rx) = engine_with(venue, c);
        for t in 0..5 {
            engine.tick(1_000 + t * 500).await;
        }
        let inv = engine.inventories.get("c1").expect("inventory created");
        assert!(inv.position_usd.abs() <= engine.config.mm_max_inventory_usd + 1e-9);
        assert_eq!(engine.positions.open_count(), 0, "quote fills are inventory");
    }
}
