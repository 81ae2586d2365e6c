use axum::{extract::State, routing::get, Json, Router};
use fibreflow::metrics::MetricsReport;

use crate::state::AppState;

async fn report(State(state): State<AppState>) -> Json<MetricsReport> {
    Json(state.metrics.report())
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(report))
}
