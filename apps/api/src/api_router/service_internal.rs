use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::state::AppState;
use crate::{handlers, middleware};

pub(super) fn build_service_internal_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/internal/tokens",
            post(handlers::tokens::issue_signed_token_handler),
        )
        .route(
            "/api/internal/short-codes",
            post(handlers::tokens::issue_short_code_handler),
        )
        .route(
            "/api/internal/access-tokens",
            post(handlers::grants::create_access_token_handler),
        )
        .route(
            "/api/internal/access-tokens/redeem",
            post(handlers::grants::redeem_access_token_handler),
        )
        .route(
            "/api/internal/join-site",
            post(handlers::grants::join_site_handler),
        )
        .route(
            "/api/internal/grants",
            get(handlers::grants::list_grants_handler),
        )
        .route(
            "/api/internal/grants/{grant_id}/revoke",
            post(handlers::grants::revoke_grant_handler),
        )
        .route_layer(from_fn_with_state(
            app_state,
            middleware::require_service_auth,
        ))
}
