use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use handoff_application::RateLimitRepository;

use super::*;

#[async_trait]
impl RateLimitRepository for InMemoryHandoffStore {
    async fn record_attempt(
        &self,
        key: &str,
        window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        self.ensure_available()?;
        let now = Utc::now();
        let mut rate_limits = self.rate_limits.write().await;

        let entry = rate_limits.entry(key.to_owned()).or_insert(AttemptInfo {
            attempt_count: 0,
            window_started_at: now,
        });

        if entry.window_started_at + Duration::seconds(window_duration_seconds) < now {
            entry.attempt_count = 0;
            entry.window_started_at = now;
        }
        entry.attempt_count += 1;

        Ok(entry.clone())
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.ensure_available()?;
        let mut rate_limits = self.rate_limits.write().await;
        let initial = rate_limits.len();
        rate_limits.retain(|_, info| info.window_started_at >= before);
        Ok((initial - rate_limits.len()) as u64)
    }
}
