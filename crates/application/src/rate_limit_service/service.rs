use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use handoff_core::{AppError, AppResult};

use super::config::RateLimitRule;
use super::ports::RateLimitRepository;

/// Application service for rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    repository: Arc<dyn RateLimitRepository>,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>) -> Self {
        Self { repository }
    }

    /// Checks whether the given key is within the rate limit.
    ///
    /// Records the attempt and returns `Ok(())` if allowed, or
    /// `Err(AppError::RateLimited)` if the limit has been exceeded. A failing
    /// counter store never blocks the caller.
    ///
    /// The stored key is `"{category}:{key}"`, where `key` is typically the
    /// client IP address.
    pub async fn check_rate_limit(&self, rule: &RateLimitRule, key: &str) -> AppResult<()> {
        let composite_key = format!("{}:{key}", rule.category);
        let info = match self
            .repository
            .record_attempt(&composite_key, rule.window_seconds)
            .await
        {
            Ok(info) => info,
            Err(error) => {
                warn!(
                    category = %rule.category,
                    error = %error,
                    "rate limit store unavailable, permitting request"
                );
                return Ok(());
            }
        };

        if info.attempt_count > rule.max_attempts {
            return Err(AppError::RateLimited(
                "too many requests, please try again later".to_owned(),
            ));
        }

        Ok(())
    }

    /// Removes rate limit windows that started before `before`.
    pub async fn cleanup(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.repository.cleanup_expired(before).await
    }
}
