use std::fs;
use std::io::Write;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::telemetry::{AlertLevel, TelemetryEvent};

/// Single background consumer for ALL telemetry: one JSONL event stream plus
/// log-surfaced alerts. Consolidates file I/O into a task that never touches
/// the tick path; flushes on shutdown.
pub async fn telemetry_writer(mut rx: mpsc::Receiver<TelemetryEvent>, log_dir: String) {
    if let Err(e) = fs::create_dir_all(&log_dir) {
        error!(error = %e, dir = %log_dir, "cannot create log dir, telemetry disabled");
        while rx.recv().await.is_some() {}
        return;
    }
    let path = format!("{}/events.jsonl", log_dir);
    let mut file = match fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, path = %path, "cannot open event log, telemetry disabled");
            while rx.recv().await.is_some() {}
            return;
        }
    };
    info!(path = %path, "telemetry writer started");

    while let Some(event) = rx.recv().await {
        if let TelemetryEvent::Alert { level, message, .. } = &event {
            match level {
                AlertLevel::Critical => error!(alert = %message, "CRITICAL ALERT"),
                AlertLevel::Warning => warn!(alert = %message, "alert"),
                AlertLevel::Info => info!(alert = %message, "alert"),
            }
        }
        match serde_json::to_string(&event) {
            Ok(line) => {
                let _ = writeln!(file, "{line}");
            }
            Err(e) => warn!(error = %e, "unserializable telemetry event dropped"),
        }
    }

    let _ = file.flush();
    info!("telemetry writer stopped, events flushed");
}
