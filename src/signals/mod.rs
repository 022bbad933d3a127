pub mod combiner;
pub mod cross_asset;
pub mod mean_reversion;
pub mod microstructure;
pub mod momentum;
pub mod spread_regime;
pub mod volume_profile;

use std::collections::{HashMap, VecDeque};

use crate::market::book::TOP_LEVELS;
use crate::market::snapshot::TickSnapshot;
use crate::math::history::PriceHistory;
use crate::types::AggregatedSignal;
use self::combiner::SignalCombiner;

/// Per-market rolling inputs the generators need beyond the snapshot itself.
const MID_HISTORY_CAP: usize = 240;
const SERIES_CAP: usize = 120;

struct MarketSignalState {
    mid_history: PriceHistory,
    spread_history: VecDeque<f64>,
    ofi_history: VecDeque<f64>,
}

impl MarketSignalState {
    fn new() -> Self {
        Self {
            mid_history: PriceHistory::new(MID_HISTORY_CAP),
            spread_history: VecDeque::with_capacity(SERIES_CAP),
            ofi_history: VecDeque::with_capacity(SERIES_CAP),
        }
    }

    fn push(&mut self, snap: &TickSnapshot) {
        self.mid_history.push_parts(snap.yes_mid, 0.0, snap.ts_ms);
        if self.spread_history.len() == SERIES_CAP {
            self.spread_history.pop_front();
        }
        self.spread_history.push_back(snap.yes_spread);
        if self.ofi_history.len() == SERIES_CAP {
            self.ofi_history.pop_front();
        }
        self.ofi_history
            .push_back(snap.yes_book.flow_imbalance(TOP_LEVELS));
    }
}

/// Runs the six generators against one market per tick and folds their
/// votes through the adaptive combiner. Owned by the tick engine; all
/// mutation happens on the tick thread.
pub struct SignalEngine {
    states: HashMap<String, MarketSignalState>,
    pub combiner: SignalCombiner,
}

impl SignalEngine {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            combiner: SignalCombiner::new(),
        }
    }

    /// Evaluate one market's snapshot. `ref_history` is the shared
    /// reference-exchange history for the snapshot's asset.
    pub fn evaluate(
        &mut self,
        snap: &TickSnapshot,
        ref_history: &PriceHistory,
    ) -> AggregatedSignal {
        let state = self
            .states
            .entry(snap.condition_id.clone())
            .or_insert_with(MarketSignalState::new);
        state.push(snap);

        let spread_hist: Vec<f64> = state.spread_history.iter().copied().collect();
        let ofi_hist: Vec<f64> = state.ofi_history.iter().copied().collect();

        let components = vec![
            momentum::generate(&state.mid_history),
            mean_reversion::generate(&state.mid_history),
            microstructure::generate(&snap.yes_book, &ofi_hist),
            cross_asset::generate(ref_history, &state.mid_history),
            spread_regime::generate(snap.yes_spread, &spread_hist),
            volume_profile::generate(ref_history),
        ];

        self.combiner.combine(components)
    }

    /// Forget a market's rolling state (after resolution).
    pub fn retire_market(&mut self, condition_id: &str) {
        self.states.remove(condition_id);
    }

    pub fn tracked_markets(&self) -> usize {
        self.states.len()
    }
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new()
    }
}
