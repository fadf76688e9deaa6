use std::sync::Arc;

use handoff_application::{RateLimitRepository, RateLimitService};
use handoff_core::{AppError, AppResult};
use handoff_infrastructure::{PostgresRateLimitRepository, RedisRateLimitRepository};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, RateLimitStoreConfig};

pub(super) fn build_rate_limit_service(
    pool: &PgPool,
    config: &ApiConfig,
    redis_client: Option<redis::Client>,
) -> AppResult<RateLimitService> {
    let rate_limit_repository: Arc<dyn RateLimitRepository> = match config.rate_limit_store {
        RateLimitStoreConfig::Postgres => Arc::new(PostgresRateLimitRepository::new(pool.clone())),
        RateLimitStoreConfig::Redis => {
            let redis_client = redis_client.ok_or_else(|| {
                AppError::Validation("REDIS_URL is required when RATE_LIMIT_STORE=redis".to_owned())
            })?;
            Arc::new(RedisRateLimitRepository::new(
                redis_client,
                "handoff:rate_limit",
            ))
        }
    };

    Ok(RateLimitService::new(rate_limit_repository))
}
