use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_core::{AppError, AppResult};
use tokio::sync::Mutex;

use super::{AttemptInfo, RateLimitRepository, RateLimitRule, RateLimitService};

#[derive(Default)]
struct FakeCounter {
    counts: Mutex<HashMap<String, i32>>,
    unavailable: AtomicBool,
}

#[async_trait]
impl RateLimitRepository for FakeCounter {
    async fn record_attempt(
        &self,
        key: &str,
        _window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StorageUnavailable(
                "connection refused".to_owned(),
            ));
        }

        let mut counts = self.counts.lock().await;
        let count = counts.entry(key.to_owned()).or_insert(0);
        *count += 1;
        Ok(AttemptInfo {
            attempt_count: *count,
            window_started_at: Utc::now(),
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        let mut counts = self.counts.lock().await;
        let removed = counts.len() as u64;
        counts.clear();
        Ok(removed)
    }
}

#[tokio::test]
async fn requests_beyond_the_limit_are_rejected() {
    let counter = Arc::new(FakeCounter::default());
    let service = RateLimitService::new(counter.clone());
    let rule = RateLimitRule::new("short_code_redeem", 2, 60);

    assert!(service.check_rate_limit(&rule, "203.0.113.9").await.is_ok());
    assert!(service.check_rate_limit(&rule, "203.0.113.9").await.is_ok());
    assert!(matches!(
        service.check_rate_limit(&rule, "203.0.113.9").await,
        Err(AppError::RateLimited(_))
    ));
    assert!(service.check_rate_limit(&rule, "198.51.100.4").await.is_ok());

    let counts = counter.counts.lock().await;
    assert_eq!(counts.get("short_code_redeem:203.0.113.9"), Some(&3));
}

#[tokio::test]
async fn unavailable_counter_store_fails_open() {
    let counter = Arc::new(FakeCounter::default());
    counter.unavailable.store(true, Ordering::SeqCst);
    let service = RateLimitService::new(counter);
    let rule = RateLimitRule::new("token_handoff", 0, 60);

    assert!(service.check_rate_limit(&rule, "203.0.113.9").await.is_ok());
}

#[test]
fn public_endpoint_rules_allow_thirty_per_minute() {
    for rule in [
        RateLimitRule::short_code_redeem(),
        RateLimitRule::token_handoff(),
    ] {
        assert_eq!(rule.max_attempts, 30);
        assert_eq!(rule.window_seconds, 60);
    }
}
