use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

mod public_handoff;
mod service_internal;

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(public_handoff::build_public_handoff_routes())
        .merge(service_internal::build_service_internal_routes(
            app_state.clone(),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
