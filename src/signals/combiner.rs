use std::collections::{HashMap, VecDeque};

use crate::types::{AggregatedSignal, Direction, SignalComponent};

/// Realized PnLs kept per component name.
const PNL_MEMORY: usize = 50;

/// Default gates for emitting a non-FLAT aggregate.
pub const DEFAULT_CONV_MIN: f64 = 0.15;
pub const DEFAULT_CONF_MIN: f64 = 0.40;

/// Adaptive-weight meta-learner over the six signal components.
///
/// Each component's base weight is tilted by the mean of its last 50
/// associated trade PnLs: adjusted = base · (1 + 0.3·tanh(10·mean_pnl)).
/// Components that have been paying get up to +30% weight; bleeders −30%.
pub struct SignalCombiner {
    recent_pnls: HashMap<String, VecDeque<f64>>,
    conv_min: f64,
    conf_min: f64,
}

impl SignalCombiner {
    pub fn new() -> Self {
        Self::with_gates(DEFAULT_CONV_MIN, DEFAULT_CONF_MIN)
    }

    pub fn with_gates(conv_min: f64, conf_min: f64) -> Self {
        Self {
            recent_pnls: HashMap::new(),
            conv_min,
            conf_min,
        }
    }

    /// Record the realized PnL of a trade against every component that voted
    /// for it.
    pub fn record_outcome(&mut self, component_names: &[&str], pnl: f64) {
        for name in component_names {
            let ring = self
                .recent_pnls
                .entry((*name).to_string())
                .or_insert_with(|| VecDeque::with_capacity(PNL_MEMORY));
            if ring.len() == PNL_MEMORY {
                ring.pop_front();
            }
            ring.push_back(pnl);
        }
    }

    /// Current PnL-adjusted weight for a component.
    pub fn adjusted_weight(&self, name: &str, base_weight: f64) -> f64 {
        match self.recent_pnls.get(name) {
            Some(ring) if !ring.is_empty() => {
                let mean_pnl = ring.iter().sum::<f64>() / ring.len() as f64;
                base_weight * (1.0 + 0.3 * (10.0 * mean_pnl).tanh())
            }
            _ => base_weight,
        }
    }

    /// Aggregate component votes into (direction, conviction, confidence).
    pub fn combine(&self, components: Vec<SignalComponent>) -> AggregatedSignal {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut sign_sum = 0.0;
        let mut abs_z_sum = 0.0;

        for c in &components {
            let w = self.adjusted_weight(c.name, c.weight);
            weighted_sum += c.value * w;
            weight_sum += w;
            sign_sum += c.value.signum() * if c.value == 0.0 { 0.0 } else { 1.0 };
            abs_z_sum += c.z_score.abs();
        }

        let n = components.len().max(1) as f64;
        let conviction = if weight_sum > 0.0 {
            (weighted_sum / weight_sum).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let agreement = (sign_sum / n).abs();
        let confidence = 0.6 * agreement + 0.4 * (abs_z_sum / n / 3.0).min(1.0);

        let direction = if conviction.abs() >= self.conv_min && confidence >= self.conf_min {
            if conviction > 0.0 {
                Direction::Long
            } else {
                Direction::Short
            }
        } else {
            Direction::Flat
        };

        AggregatedSignal {
            direction,
            conviction,
            confidence,
            expected_return_bps: conviction * 100.0,
            expected_hold_ms: 30_000,
            components,
        }
    }
}

impl Default for SignalCombiner {
    fn default() -> Self {
        Self::new()
    }
}
