use sqlx::PgPool;

use super::*;

/// Tables the redirect and service endpoints read and write.
const HANDOFF_TABLES: [&str; 4] = [
    "handoff_short_codes",
    "handoff_pending_tokens",
    "handoff_access_grants",
    "handoff_rate_limits",
];

/// Redemption fails closed, so the handoff tables gate readiness.
pub(super) async fn check_handoff_store(pool: &PgPool) -> HealthDependencyStatus {
    let tables: Vec<String> = HANDOFF_TABLES.iter().map(|table| (*table).to_owned()).collect();
    let missing = sqlx::query_scalar::<_, String>(
        r#"
        SELECT name
        FROM UNNEST($1::text[]) AS handoff_tables(name)
        WHERE to_regclass(name) IS NULL
        ORDER BY name
        "#,
    )
    .bind(tables)
    .fetch_all(pool)
    .await;

    match missing {
        Ok(missing) => schema_status(&missing),
        Err(error) => failed(format!("handoff store unreachable: {error}")),
    }
}

pub(super) fn schema_status(missing_tables: &[String]) -> HealthDependencyStatus {
    if missing_tables.is_empty() {
        return passed();
    }

    failed(format!(
        "migrations not applied, missing {}",
        missing_tables.join(", ")
    ))
}

/// Rate limiting fails open; its store only degrades the report.
pub(super) async fn check_rate_limit_store(
    backend: RateLimitStoreConfig,
    handoff_store: &HealthDependencyStatus,
    redis_client: Option<redis::Client>,
) -> RateLimitStoreHealth {
    let check = match backend {
        RateLimitStoreConfig::Postgres => handoff_store.clone(),
        RateLimitStoreConfig::Redis => ping_redis(redis_client).await,
    };

    RateLimitStoreHealth {
        backend: backend.as_str(),
        status: check.status,
        detail: check.detail,
    }
}

async fn ping_redis(redis_client: Option<redis::Client>) -> HealthDependencyStatus {
    let Some(redis_client) = redis_client else {
        return failed("RATE_LIMIT_STORE=redis but no redis client was built".to_owned());
    };

    let reply = match redis_client.get_multiplexed_async_connection().await {
        Ok(mut connection) => {
            redis::cmd("PING")
                .query_async::<String>(&mut connection)
                .await
        }
        Err(error) => return failed(format!("redis unreachable: {error}")),
    };

    match reply {
        Ok(reply) if reply == "PONG" => passed(),
        Ok(reply) => failed(format!("redis answered PING with '{reply}'")),
        Err(error) => failed(format!("redis PING failed: {error}")),
    }
}

/// Maps both checks to the HTTP status, overall label and readiness flag.
pub(super) fn summarize(
    handoff_store: &HealthDependencyStatus,
    rate_limit_store: &RateLimitStoreHealth,
) -> (StatusCode, &'static str, bool) {
    if handoff_store.status != "ok" {
        return (StatusCode::SERVICE_UNAVAILABLE, "unavailable", false);
    }

    if rate_limit_store.status != "ok" {
        return (StatusCode::OK, "degraded", true);
    }

    (StatusCode::OK, "ok", true)
}

fn passed() -> HealthDependencyStatus {
    HealthDependencyStatus {
        status: "ok",
        detail: None,
    }
}

fn failed(detail: String) -> HealthDependencyStatus {
    HealthDependencyStatus {
        status: "error",
        detail: Some(detail),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::{
        RateLimitStoreConfig, RateLimitStoreHealth, check_rate_limit_store, failed, passed,
        schema_status, summarize,
    };

    fn rate_limits(status: &'static str) -> RateLimitStoreHealth {
        RateLimitStoreHealth {
            backend: "redis",
            status,
            detail: None,
        }
    }

    #[test]
    fn missing_tables_are_named() {
        let status = schema_status(&["handoff_access_grants".to_owned()]);
        assert_eq!(status.status, "error");
        assert_eq!(
            status.detail.as_deref(),
            Some("migrations not applied, missing handoff_access_grants")
        );
        assert_eq!(schema_status(&[]).status, "ok");
    }

    #[test]
    fn rate_limit_outage_degrades_but_stays_ready() {
        assert_eq!(
            summarize(&passed(), &rate_limits("ok")),
            (StatusCode::OK, "ok", true)
        );
        assert_eq!(
            summarize(&passed(), &rate_limits("error")),
            (StatusCode::OK, "degraded", true)
        );
        assert_eq!(
            summarize(&failed("down".to_owned()), &rate_limits("ok")),
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable", false)
        );
    }

    #[tokio::test]
    async fn postgres_rate_limits_share_the_handoff_store_result() {
        let store = failed("handoff store unreachable".to_owned());
        let report = check_rate_limit_store(RateLimitStoreConfig::Postgres, &store, None).await;
        assert_eq!(report.backend, "postgres");
        assert_eq!(report.status, "error");
        assert_eq!(report.detail, store.detail);
    }

    #[tokio::test]
    async fn redis_backend_without_client_is_reported() {
        let report = check_rate_limit_store(RateLimitStoreConfig::Redis, &passed(), None).await;
        assert_eq!(report.backend, "redis");
        assert_eq!(report.status, "error");
    }
}
