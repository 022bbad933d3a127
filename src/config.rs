use serde::{Deserialize, Serialize};

/// Execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Paper,
    Live,
    Backtest,
}

impl Mode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "live" => Mode::Live,
            "backtest" => Mode::Backtest,
            _ => Mode::Paper,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Paper => "paper",
            Mode::Live => "live",
            Mode::Backtest => "backtest",
        }
    }
}

/// Market interval bucket on the prediction venue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    M5,
    M15,
    H1,
    H4,
}

impl Interval {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "15m" => Interval::M15,
            "1h" => Interval::H1,
            "4h" => Interval::H4,
            _ => Interval::M5,
        }
    }

    /// Window duration in seconds.
    pub fn window_secs(&self) -> i64 {
        match self {
            Interval::M5 => 300,
            Interval::M15 => 900,
            Interval::H1 => 3600,
            Interval::H4 => 14400,
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_secs() * 1000
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
        }
    }
}

/// Risk preset selecting the limit table in `risk::gate::RiskLimits`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "conservative" => RiskLevel::Conservative,
            "aggressive" => RiskLevel::Aggressive,
            _ => RiskLevel::Moderate,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Conservative => "conservative",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Aggressive => "aggressive",
        }
    }
}

/// Configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub mode: Mode,
    pub risk_level: RiskLevel,
    /// Market intervals the engine will trade.
    pub intervals: Vec<Interval>,

    // Tick engine
    pub tick_interval_ms: i64,
    pub tick_history_depth: usize,
    pub fetch_deadline_ms: i64,
    pub stale_order_max_age_ms: i64,
    pub stale_order_sweep_every: u64,

    // Fees (single per-side constant; no maker/taker bifurcation)
    pub fee_per_side: f64,

    // Strategy toggles
    pub strategy_structural_arb: bool,
    pub strategy_latency_arb: bool,
    pub strategy_spread_capture: bool,
    pub strategy_confluence: bool,
    pub strategy_quant: bool,
    pub market_making: bool,

    // Exposure
    pub max_total_exposure_usd: f64,

    // Market making
    pub mm_gamma: f64,
    pub mm_kappa: f64,
    pub mm_max_inventory_usd: f64,
    pub mm_max_daily_loss_usd: f64,

    // Telemetry
    pub log_dir: String,

    // Live credentials (only required when mode == Live)
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let mode = Mode::from_str(&std::env::var("MODE").unwrap_or_else(|_| "paper".into()));
        let risk_level =
            RiskLevel::from_str(&std::env::var("RISK").unwrap_or_else(|_| "moderate".into()));

        // ENABLED is a comma list of strategy ids; unset means all on.
        let enabled = std::env::var("ENABLED").ok().map(|s| {
            s.split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
        });
        let on = |name: &str| enabled.as_ref().map_or(true, |e| e.iter().any(|s| s == name));

        let intervals = std::env::var("INTERVALS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|p| Interval::from_str(p.trim()))
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| vec![Interval::M5, Interval::M15, Interval::H1, Interval::H4]);

        Self {
            mode,
            risk_level,
            intervals,
            tick_interval_ms: env_i64("TICK_INTERVAL_MS", 500),
            tick_history_depth: env_usize("TICK_HISTORY_DEPTH", 60),
            fetch_deadline_ms: env_i64("FETCH_DEADLINE_MS", 10_000),
            stale_order_max_age_ms: env_i64("STALE_ORDER_MAX_AGE_MS", 30_000),
            stale_order_sweep_every: env_i64("STALE_ORDER_SWEEP_EVERY", 10).max(1) as u64,
            fee_per_side: env_f64("FEE_PER_SIDE", 0.005),
            strategy_structural_arb: on("structural_arb"),
            strategy_latency_arb: on("latency_arb"),
            strategy_spread_capture: on("spread_capture"),
            strategy_confluence: on("confluence"),
            strategy_quant: on("quant"),
            market_making: on("market_making"),
            max_total_exposure_usd: env_f64("MAX_EXPOSURE", 150.0),
            mm_gamma: env_f64("MM_GAMMA", 0.5),
            mm_kappa: env_f64("MM_KAPPA", 200.0),
            mm_max_inventory_usd: env_f64("MM_MAX_INVENTORY", 50.0),
            mm_max_daily_loss_usd: env_f64("MM_MAX_DAILY_LOSS", 25.0),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".into()),
            api_key: std::env::var("CLOB_API_KEY").ok(),
            api_secret: std::env::var("CLOB_API_SECRET").ok(),
        }
    }

    /// Whether markets of this interval label are tradable.
    pub fn interval_enabled(&self, label: &str) -> bool {
        self.intervals.contains(&Interval::from_str(label))
    }

    /// Strategy ids enabled by this config, for the startup banner.
    pub fn enabled_strategies(&self) -> Vec<&'static str> {
        [
            (self.strategy_structural_arb, "structural_arb"),
            (self.strategy_latency_arb, "latency_arb"),
            (self.strategy_spread_capture, "spread_capture"),
            (self.strategy_confluence, "confluence"),
            (self.strategy_quant, "quant"),
            (self.market_making, "market_making"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Paper,
            risk_level: RiskLevel::Moderate,
            intervals: vec![Interval::M5, Interval::M15, Interval::H1, Interval::H4],
            tick_interval_ms: 500,
            tick_history_depth: 60,
            fetch_deadline_ms: 10_000,
            stale_order_max_age_ms: 30_000,
            stale_order_sweep_every: 10,
            fee_per_side: 0.005,
            strategy_structural_arb: true,
            strategy_latency_arb: true,
            strategy_spread_capture: true,
            strategy_confluence: true,
            strategy_quant: true,
            market_making: true,
            max_total_exposure_usd: 150.0,
            mm_gamma: 0.5,
            mm_kappa: 200.0,
            mm_max_inventory_usd: 50.0,
            mm_max_daily_loss_usd: 25.0,
            log_dir: "logs".into(),
            api_key: None,
            api_secret: None,
        }
    }
}
