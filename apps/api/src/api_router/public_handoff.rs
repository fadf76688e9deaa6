use axum::Router;
use axum::routing::get;

use crate::handlers;
use crate::state::AppState;

pub(super) fn build_public_handoff_routes() -> Router<AppState> {
    Router::new()
        .route("/r/{code}", get(handlers::handoff::short_code_redirect_handler))
        .route("/handoff", get(handlers::handoff::signed_token_redirect_handler))
}
