/// Configuration for a rate limit rule.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    /// Category prefixed to every key (e.g. `short_code_redeem`).
    pub category: String,
    /// Maximum number of attempts allowed in the window.
    pub max_attempts: i32,
    /// Window duration in seconds.
    pub window_seconds: i64,
}

impl RateLimitRule {
    /// Creates a new rate limit rule.
    #[must_use]
    pub fn new(category: impl Into<String>, max_attempts: i32, window_seconds: i64) -> Self {
        Self {
            category: category.into(),
            max_attempts,
            window_seconds,
        }
    }

    /// Limit applied per client to public short code redemption.
    #[must_use]
    pub fn short_code_redeem() -> Self {
        Self::new("short_code_redeem", 30, 60)
    }

    /// Limit applied per client to public signed token handoff.
    #[must_use]
    pub fn token_handoff() -> Self {
        Self::new("token_handoff", 30, 60)
    }
}
