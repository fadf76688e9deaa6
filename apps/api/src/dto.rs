use chrono::{DateTime, Utc};
use handoff_domain::{AccessGrant, GrantAction, GrantOffer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health response payload.
///
/// `status` is `ok`, `degraded` (rate limiting unavailable, handoffs still
/// served) or `unavailable`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub handoff_store: HealthDependencyStatus,
    pub rate_limit_store: RateLimitStoreHealth,
}

/// State of one backing dependency.
#[derive(Debug, Clone, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// State of the configured rate-limit backend.
#[derive(Debug, Serialize)]
pub struct RateLimitStoreHealth {
    pub backend: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Query of the signed-token handoff.
#[derive(Debug, Deserialize)]
pub struct HandoffQuery {
    pub token: Option<String>,
}

/// Request to mint a signed handoff token.
#[derive(Debug, Deserialize)]
pub struct IssueSignedTokenRequest {
    pub subject_id: i64,
    pub email: String,
    pub app: String,
    pub ttl_seconds: Option<i64>,
}

/// Freshly minted signed token.
#[derive(Debug, Serialize)]
pub struct SignedTokenResponse {
    pub token: String,
    pub jti: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub handoff_url: String,
}

/// Request to issue a short code.
#[derive(Debug, Deserialize)]
pub struct IssueShortCodeRequest {
    pub subject_id: i64,
    pub email: String,
    pub app: String,
    pub redirect_url: Option<String>,
}

/// Freshly issued short code and its public link.
#[derive(Debug, Serialize)]
pub struct ShortCodeResponse {
    pub code: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Request to create an access-grant offer.
#[derive(Debug, Deserialize)]
pub struct CreateAccessTokenRequest {
    pub issuer_id: i64,
    pub app_scope: String,
    pub offer: GrantOffer,
}

/// Pending token handed back to its issuer.
#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub token: String,
    pub qr_payload: String,
    pub action: GrantAction,
    pub expires_at: DateTime<Utc>,
}

/// Request to redeem a pending token.
#[derive(Debug, Deserialize)]
pub struct RedeemAccessTokenRequest {
    pub token: String,
    pub grantee_id: i64,
}

/// Request to join a site from a scanned payload.
#[derive(Debug, Deserialize)]
pub struct JoinSiteRequest {
    pub payload: String,
    pub grantee_id: i64,
    pub app: String,
}

/// Outcome of joining a site.
#[derive(Debug, Serialize)]
pub struct JoinSiteResponse {
    pub site_id: String,
    pub grant: AccessGrantResponse,
}

/// Query of the grant listing.
#[derive(Debug, Deserialize)]
pub struct ListGrantsQuery {
    pub subject_id: i64,
}

/// Request to revoke a grant.
#[derive(Debug, Deserialize)]
pub struct RevokeGrantRequest {
    pub requester_id: i64,
}

/// API representation of an access grant.
#[derive(Debug, Serialize)]
pub struct AccessGrantResponse {
    pub id: Uuid,
    pub grantor_id: i64,
    pub grantee_id: i64,
    pub app_scope: String,
    pub label: Option<String>,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<AccessGrant> for AccessGrantResponse {
    fn from(grant: AccessGrant) -> Self {
        Self {
            id: grant.id,
            grantor_id: grant.grantor_id.as_i64(),
            grantee_id: grant.grantee_id.as_i64(),
            app_scope: grant.app_scope.as_str().to_owned(),
            label: grant.label,
            status: grant.status.as_str(),
            created_at: grant.created_at,
            revoked_at: grant.revoked_at,
        }
    }
}
