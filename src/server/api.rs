//! Dashboard JSON API, mounted at `/api/v1`

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::AppState;
use super::catalog::{BundleSummary, FailedBundle, GraphicGroup, PanelEntry};
use crate::relay::RelayStats;

/// Relay activity plus the bundles that are not running
#[derive(Debug, Serialize)]
struct Status {
    #[serde(flatten)]
    relay: RelayStats,
    failed: Vec<FailedBundle>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bundles", get(bundles))
        .route("/panels", get(panels))
        .route("/graphics", get(graphics))
        .route("/status", get(status))
}

async fn bundles(State(state): State<AppState>) -> Json<Vec<BundleSummary>> {
    Json(state.catalog.summaries())
}

async fn panels(State(state): State<AppState>) -> Json<Vec<PanelEntry>> {
    Json(state.catalog.panels())
}

async fn graphics(State(state): State<AppState>) -> Json<Vec<GraphicGroup>> {
    Json(state.catalog.graphics())
}

async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        relay: state.relay.stats(),
        failed: state.catalog.failed().to_vec(),
    })
}
