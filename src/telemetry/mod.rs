pub mod writer;

use serde::Serialize;

/// Alert severity. Critical alerts also surface through the log at error
/// level ("trading halted", "kill switch armed").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// Events drained by the telemetry writer task. The hot path only ever
/// `try_send`s — a full channel drops the event rather than blocking a tick.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Signal {
        ts_ms: i64,
        condition_id: String,
        direction: String,
        conviction: f64,
        confidence: f64,
        expected_return_bps: f64,
    },
    Opportunity {
        ts_ms: i64,
        strategy: String,
        condition_id: String,
        side: String,
        price: f64,
        size_usd: f64,
        edge: f64,
        confidence: f64,
        approved: bool,
        deny_reason: Option<String>,
    },
    OrderPlaced {
        ts_ms: i64,
        order_id: u64,
        strategy: String,
        token_id: String,
        side: String,
        price: f64,
        size_usd: f64,
    },
    Fill {
        ts_ms: i64,
        order_id: u64,
        price: f64,
        size_usd: f64,
        fee: f64,
    },
    TradeClosed {
        ts_ms: i64,
        strategy: String,
        pnl: f64,
        hold_ms: i64,
        stop: Option<String>,
    },
    TickStats {
        ts_ms: i64,
        tick: u64,
        markets: usize,
        snapshots: usize,
        opportunities: usize,
        approved: usize,
        open_orders: usize,
        open_positions: usize,
    },
    Alert {
        ts_ms: i64,
        level: AlertLevel,
        message: String,
    },
}
