pub mod agent;
pub mod health;
pub mod metrics;
pub mod orchestrator;

use axum::{middleware, Router};

use crate::auth::require_api_key;
use crate::state::AppState;

/// Assemble every route. Everything except `/` and `/health` sits behind the API key check.
pub fn configure(state: AppState) -> Router {
    let protected = Router::new()
        .merge(orchestrator::routes())
        .merge(agent::routes())
        .merge(metrics::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(health::routes())
        .merge(protected)
        .with_state(state)
}
