use axum::extract::State;
use serde_json::{Value, json};

use crate::api::AppState;
use crate::api::response::{Envelope, ok};

/// Liveness probe with record counts.
pub async fn health(State(state): State<AppState>) -> Envelope<Value> {
    let counts = state.db.read().await.counts();
    ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started.elapsed().as_secs(),
        "counts": counts,
    }))
}
