use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clob_hft::config::{Config, Mode};
use clob_hft::engine::tick::TickEngine;
use clob_hft::market::book::Book;
use clob_hft::market::feed::{FeedHandoff, ReferenceUpdate};
use clob_hft::market::provider::SimulatedVenue;
use clob_hft::telemetry::writer::telemetry_writer;
use clob_hft::types::MarketMeta;

/// Exit codes: 0 clean shutdown, 1 startup failure, 2 authentication
/// failure, 3 kill switch triggered.
#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!("╔══════════════════════════════════════════════════╗");
    info!("║  clob-hft tick engine");
    info!("║  mode={} risk={} tick={}ms", config.mode.label(), config.risk_level.label(), config.tick_interval_ms);
    info!("║  strategies: {:?}", config.enabled_strategies());
    info!("║  max exposure: ${:.0} | fee/side: {:.3}", config.max_total_exposure_usd, config.fee_per_side);
    info!("╚══════════════════════════════════════════════════╝");

    match config.mode {
        Mode::Live => {
            if config.api_key.is_none() || config.api_secret.is_none() {
                error!("live mode requires CLOB_API_KEY and CLOB_API_SECRET");
                std::process::exit(2);
            }
            // Venue adapters ship separately; the core only consumes their
            // traits (market-data provider + order router).
            error!("live mode needs a venue adapter wired at build time");
            std::process::exit(1);
        }
        Mode::Backtest => {
            error!("backtesting runs through the dedicated backtest harness");
            std::process::exit(1);
        }
        Mode::Paper => {}
    }

    // Paper mode exercises the full pipeline against the in-memory venue.
    let venue = Arc::new(SimulatedVenue::new());
    seed_paper_venue(&venue);

    let (telem_tx, telem_rx) = mpsc::channel(4096);
    let writer = tokio::spawn(telemetry_writer(telem_rx, config.log_dir.clone()));

    let mut engine = TickEngine::new(config, venue.clone(), venue, telem_tx);

    // Streamed reference prices flow through the same handoff a live feed
    // task would use; the paper publisher oscillates a BTC mark.
    let feed = FeedHandoff::new(1024);
    engine.attach_reference_feed(feed.clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(250));
        let mut step = 0u64;
        loop {
            interval.tick().await;
            step += 1;
            let wobble = (step as f64 * 0.05).sin() * 40.0;
            feed.publish(
                "BTC",
                ReferenceUpdate {
                    price: 95_000.0 + wobble,
                    volume: 1.0 + (step % 5) as f64 * 0.2,
                    ts_ms: chrono::Utc::now().timestamp_millis(),
                },
            );
        }
    });

    let exit_code = tokio::select! {
        // run() only returns once the kill switch latches.
        _ = engine.run() => 3,
        _ = tokio::signal::ctrl_c() => 0,
    };

    if exit_code == 3 {
        error!("engine stopped by kill switch");
    } else {
        warn!("shutdown signal received — cancelling open orders");
        let now_ms = chrono::Utc::now().timestamp_millis();
        let cancelled = engine.oms.cancel_all("shutdown", now_ms);
        info!(cancelled = cancelled.len(), "open orders cancelled");
    }

    drop(engine); // closes the telemetry channel
    let _ = writer.await;
    info!("shutdown complete");
    std::process::exit(exit_code);
}

/// Static demo market so the paper loop has something to chew on until a
/// real adapter is wired in front of the engine.
fn seed_paper_venue(venue: &SimulatedVenue) {
    let now_ms = chrono::Utc::now().timestamp_millis();
    venue.add_market(MarketMeta {
        asset: "BTC".into(),
        interval: "5m".into(),
        condition_id: "paper-btc-updown".into(),
        yes_token_id: "paper-btc-yes".into(),
        no_token_id: "paper-btc-no".into(),
        end_ms: now_ms + 3_600_000,
    });
    venue.set_book(
        "paper-btc-yes",
        Book::from_levels(
            vec![(0.48, 120.0), (0.47, 80.0), (0.46, 60.0)],
            vec![(0.52, 110.0), (0.53, 90.0), (0.54, 70.0)],
        ),
    );
    venue.set_book(
        "paper-btc-no",
        Book::from_levels(
            vec![(0.46, 100.0), (0.45, 80.0), (0.44, 50.0)],
            vec![(0.50, 100.0), (0.51, 70.0), (0.52, 60.0)],
        ),
    );
    venue.set_reference("BTC", 95_000.0, 1.5, now_ms);
}
