//! Periodic removal of long-expired credentials and counter windows.

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use handoff_core::{AppResult, Clock};

use crate::access_grant_service::AccessGrantRepository;
use crate::rate_limit_service::RateLimitService;
use crate::short_code_service::ShortCodeRepository;

/// Row counts removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Short codes deleted.
    pub short_codes: u64,
    /// Pending tokens deleted.
    pub pending_tokens: u64,
    /// Rate limit windows deleted.
    pub rate_limit_windows: u64,
}

impl SweepReport {
    /// Total rows deleted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.short_codes + self.pending_tokens + self.rate_limit_windows
    }
}

/// Deletes rows that expired more than a retention period ago.
///
/// Expiry is always checked at redemption time, so a late sweep only costs
/// storage.
#[derive(Clone)]
pub struct HousekeepingService {
    short_codes: Arc<dyn ShortCodeRepository>,
    access_grants: Arc<dyn AccessGrantRepository>,
    rate_limits: RateLimitService,
    clock: Arc<dyn Clock>,
}

impl HousekeepingService {
    /// Creates a new housekeeping service.
    #[must_use]
    pub fn new(
        short_codes: Arc<dyn ShortCodeRepository>,
        access_grants: Arc<dyn AccessGrantRepository>,
        rate_limits: RateLimitService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            short_codes,
            access_grants,
            rate_limits,
            clock,
        }
    }

    /// Runs one sweep with the given retention.
    pub async fn sweep(&self, retention: Duration) -> AppResult<SweepReport> {
        let cutoff = self.clock.now() - retention;

        let report = SweepReport {
            short_codes: self.short_codes.delete_expired_short_codes(cutoff).await?,
            pending_tokens: self
                .access_grants
                .delete_expired_pending_tokens(cutoff)
                .await?,
            rate_limit_windows: self.rate_limits.cleanup(cutoff).await?,
        };

        info!(
            short_codes = report.short_codes,
            pending_tokens = report.pending_tokens,
            rate_limit_windows = report.rate_limit_windows,
            "housekeeping sweep finished"
        );

        Ok(report)
    }
}
