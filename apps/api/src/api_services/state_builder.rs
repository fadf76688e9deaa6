use std::sync::Arc;

use chrono::Duration;
use handoff_application::{AccessGrantService, ShortCodeService, TokenCodec};
use handoff_core::{AppError, Clock, SystemClock};
use handoff_infrastructure::{PostgresAccessGrantRepository, PostgresShortCodeRepository};
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::redis::build_redis_client;

mod caches;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let token_codec = TokenCodec::new(
        config.signing_secret.as_bytes(),
        config.allowed_apps.iter().cloned(),
        clock.clone(),
    )?
    .with_max_clock_skew(Duration::seconds(config.clock_skew_seconds));

    let short_code_service = ShortCodeService::new(
        Arc::new(PostgresShortCodeRepository::new(pool.clone())),
        clock.clone(),
    );
    let access_grant_service = AccessGrantService::new(
        Arc::new(PostgresAccessGrantRepository::new(pool.clone())),
        clock,
    )
    .with_pending_ttl(Duration::minutes(config.pending_token_ttl_minutes));
    let rate_limit_service = caches::build_rate_limit_service(&pool, config, redis_client.clone())?;

    Ok(AppState {
        token_codec,
        short_code_service,
        access_grant_service,
        rate_limit_service,
        destinations: Arc::new(config.destinations.clone()),
        public_base_url: config.public_base_url.clone(),
        service_shared_secret: Arc::from(config.service_shared_secret.as_str()),
        signed_token_ttl: Duration::seconds(config.signed_token_ttl_seconds),
        trusted_proxies: Arc::from(config.trusted_proxies.as_slice()),
        postgres_pool: pool,
        rate_limit_store: config.rate_limit_store,
        redis_client,
    })
}
