use std::sync::Arc;

use chrono::Duration;
use handoff_application::{AccessGrantService, RateLimitService, ShortCodeService, TokenCodec};
use ipnet::IpNet;
use sqlx::PgPool;
use url::Url;

use crate::api_config::RateLimitStoreConfig;
use crate::redirects::HandoffDestinations;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub token_codec: TokenCodec,
    pub short_code_service: ShortCodeService,
    pub access_grant_service: AccessGrantService,
    pub rate_limit_service: RateLimitService,
    pub destinations: Arc<HandoffDestinations>,
    pub public_base_url: Url,
    pub service_shared_secret: Arc<str>,
    pub signed_token_ttl: Duration,
    pub trusted_proxies: Arc<[IpNet]>,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
    pub rate_limit_store: RateLimitStoreConfig,
}
