use std::collections::HashMap;

use serde::Serialize;

use crate::market::provider::ExternalPosition;
use crate::portfolio::positions::PositionBook;
use crate::types::PositionSide;

/// Tolerance for venue-vs-local size comparison (venue rounding).
const SIZE_TOLERANCE_USD: f64 = 0.01;

/// One disagreement between the venue's view and ours.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Discrepancy {
    /// Venue reports a token we have no open position on.
    MissingLocal { token_id: String, venue_size: f64 },
    /// We hold a token the venue does not report.
    MissingExternal { token_id: String, local_size: f64 },
    /// Both sides know the token but sizes differ beyond tolerance.
    SizeMismatch {
        token_id: String,
        local_size: f64,
        venue_size: f64,
    },
}

/// Compare venue-reported positions against the local book, netted per
/// token. Pure — the caller decides whether to alert, halt, or adopt.
pub fn reconcile(local: &PositionBook, external: &[ExternalPosition]) -> Vec<Discrepancy> {
    let mut local_by_token: HashMap<String, f64> = HashMap::new();
    for p in local.open_positions() {
        let signed = match p.side {
            PositionSide::Long => p.size,
            PositionSide::Short => -p.size,
        };
        *local_by_token.entry(p.token_id.clone()).or_insert(0.0) += signed;
    }
    // Flat-netted tokens are indistinguishable from no position.
    local_by_token.retain(|_, v| v.abs() > SIZE_TOLERANCE_USD);

    let mut external_by_token: HashMap<String, f64> = HashMap::new();
    for e in external {
        *external_by_token.entry(e.token_id.clone()).or_insert(0.0) += e.size;
    }
    external_by_token.retain(|_, v| v.abs() > SIZE_TOLERANCE_USD);

    let mut out = Vec::new();
    for (token, &venue_size) in &external_by_token {
        match local_by_token.get(token) {
            None => out.push(Discrepancy::MissingLocal {
                token_id: token.clone(),
                venue_size,
            }),
            Some(&local_size) if (local_size - venue_size).abs() > SIZE_TOLERANCE_USD => {
                out.push(Discrepancy::SizeMismatch {
                    token_id: token.clone(),
                    local_size,
                    venue_size,
                })
            }
            Some(_) => {}
        }
    }
    for (token, &local_size) in &local_by_token {
        if !external_by_token.contains_key(token) {
            out.push(Discrepancy::MissingExternal {
                token_id: token.clone(),
                local_size,
            });
        }
    }
    out.sort_by(|a, b| token_of(a).cmp(token_of(b)));
    out
}

fn token_of(d: &Discrepancy) -> &String {
    match d {
        Discrepancy::MissingLocal { token_id, .. }
        | Discrepancy::MissingExternal { token_id, .. }
        | Discrepancy::SizeMismatch { token_id, .. } => token_id,
    }
}
