use super::checks::{check_handoff_store, check_rate_limit_store, summarize};
use super::*;

/// `GET /health`: ready while the handoff store is migrated and reachable.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let handoff_store = check_handoff_store(&state.postgres_pool).await;
    let rate_limit_store = check_rate_limit_store(
        state.rate_limit_store,
        &handoff_store,
        state.redis_client.clone(),
    )
    .await;

    let (http_status, status, ready) = summarize(&handoff_store, &rate_limit_store);

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            handoff_store,
            rate_limit_store,
        }),
    )
}
