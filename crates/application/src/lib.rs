//! Application services and ports of the handoff protocol.

#![forbid(unsafe_code)]

mod access_grant_service;
mod housekeeping_service;
mod rate_limit_service;
mod short_code_service;
mod token_codec;
mod token_crypto;

pub use access_grant_service::{
    AccessGrantRepository, AccessGrantService, CreatedAccessToken, JoinSiteResult,
};
pub use housekeeping_service::{HousekeepingService, SweepReport};
pub use rate_limit_service::{AttemptInfo, RateLimitRepository, RateLimitRule, RateLimitService};
pub use short_code_service::{
    IssueShortCodeInput, IssuedShortCode, ShortCodeRejection, ShortCodeRepository,
    ShortCodeService,
};
pub use token_codec::{
    DEFAULT_MAX_CLOCK_SKEW_SECONDS, MIN_SIGNING_SECRET_BYTES, SignedToken, TokenCodec,
};
