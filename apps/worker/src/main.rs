//! Handoff housekeeping worker.
//!
//! Periodically deletes expired short codes, pending tokens and stale rate
//! limit windows. Redemption never depends on this running.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use handoff_application::{
    HousekeepingService, RateLimitRepository, RateLimitService, SweepReport,
};
use handoff_core::{AppError, AppResult, Clock, SystemClock};
use handoff_infrastructure::{
    PostgresAccessGrantRepository, PostgresRateLimitRepository, PostgresShortCodeRepository,
    RedisRateLimitRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateLimitStore {
    Postgres,
    Redis,
}

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    interval_seconds: u64,
    retention_hours: i64,
    rate_limit_store: RateLimitStore,
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let housekeeping = build_housekeeping_service(pool, &config)?;
    let retention = chrono::Duration::hours(config.retention_hours);

    info!(
        interval_seconds = config.interval_seconds,
        retention_hours = config.retention_hours,
        "handoff-worker started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&housekeeping, retention).await;
    }
}

async fn sweep_once(
    housekeeping: &HousekeepingService,
    retention: chrono::Duration,
) -> Option<SweepReport> {
    match housekeeping.sweep(retention).await {
        Ok(report) => Some(report),
        Err(error) => {
            warn!(error = %error, "housekeeping sweep failed, retrying next interval");
            None
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| {
            AppError::StorageUnavailable(format!("failed to connect to database: {error}"))
        })
}

fn build_housekeeping_service(
    pool: PgPool,
    config: &WorkerConfig,
) -> AppResult<HousekeepingService> {
    let rate_limit_repository: Arc<dyn RateLimitRepository> = match config.rate_limit_store {
        RateLimitStore::Postgres => Arc::new(PostgresRateLimitRepository::new(pool.clone())),
        RateLimitStore::Redis => {
            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Validation("REDIS_URL is required when RATE_LIMIT_STORE=redis".to_owned())
            })?;
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Arc::new(RedisRateLimitRepository::new(client, "handoff:rate_limit"))
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(HousekeepingService::new(
        Arc::new(PostgresShortCodeRepository::new(pool.clone())),
        Arc::new(PostgresAccessGrantRepository::new(pool)),
        RateLimitService::new(rate_limit_repository),
        clock,
    ))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let interval_seconds = parse_env_u64("HOUSEKEEPING_INTERVAL_SECONDS", 300)?;
        let retention_hours = parse_env_i64("HOUSEKEEPING_RETENTION_HOURS", 24)?;

        if interval_seconds == 0 {
            return Err(AppError::Validation(
                "HOUSEKEEPING_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if retention_hours < 0 {
            return Err(AppError::Validation(
                "HOUSEKEEPING_RETENTION_HOURS must not be negative".to_owned(),
            ));
        }

        let rate_limit_store = match env::var("RATE_LIMIT_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => RateLimitStore::Postgres,
            "redis" => RateLimitStore::Redis,
            other => {
                return Err(AppError::Validation(format!(
                    "RATE_LIMIT_STORE must be either 'postgres' or 'redis', got '{other}'"
                )));
            }
        };
        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            database_url,
            interval_seconds,
            retention_hours,
            rate_limit_store,
            redis_url,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(value) => value.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use handoff_application::{HousekeepingService, RateLimitService};
    use handoff_core::FixedClock;
    use handoff_infrastructure::InMemoryHandoffStore;

    use super::sweep_once;

    fn service(store: &Arc<InMemoryHandoffStore>) -> HousekeepingService {
        HousekeepingService::new(
            store.clone(),
            store.clone(),
            RateLimitService::new(store.clone()),
            Arc::new(FixedClock::new(Utc::now())),
        )
    }

    #[tokio::test]
    async fn sweep_reports_on_a_healthy_store() {
        let store = Arc::new(InMemoryHandoffStore::new());
        let report = sweep_once(&service(&store), Duration::hours(24)).await;
        assert_eq!(report.map(|report| report.total()), Some(0));
    }

    #[tokio::test]
    async fn failed_sweep_is_logged_and_skipped() {
        let store = Arc::new(InMemoryHandoffStore::new());
        store.set_unavailable(true);
        assert!(sweep_once(&service(&store), Duration::hours(24)).await.is_none());
    }
}
