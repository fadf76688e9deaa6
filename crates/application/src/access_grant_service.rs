//! Access-grant offers and the durable grants they turn into.
//!
//! An issuer creates a pending token describing an offer; the grantee redeems
//! it once, which records a grant scoped to one app. Grants are revoked, never
//! deleted or reactivated.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use handoff_core::redact::redact_code;
use handoff_core::{AppError, AppResult, Clock, SubjectId};
use handoff_domain::{
    AccessGrant, AppTag, DEFAULT_PENDING_TOKEN_TTL_MINUTES, GrantOffer, PENDING_TOKEN_BYTES,
    PendingToken, QrPayload,
};

use crate::token_crypto::generate_credential;

mod join_site;
mod redeem;

pub use join_site::JoinSiteResult;

/// Repository port for pending tokens and access grants.
#[async_trait]
pub trait AccessGrantRepository: Send + Sync {
    /// Stores a freshly created pending token.
    async fn insert_pending_token(&self, token: &PendingToken) -> AppResult<()>;

    /// Finds a pending token by its hash regardless of state.
    async fn find_pending_token(&self, token_hash: &str) -> AppResult<Option<PendingToken>>;

    /// Sets `consumed_at` on a token that has none and is unexpired at
    /// `consumed_at`.
    ///
    /// Returns `true` only for the caller whose write changed the row.
    async fn consume_pending_token(
        &self,
        token_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Finds the active grant for a (grantor, grantee, app) triple.
    async fn find_active_grant(
        &self,
        grantor_id: SubjectId,
        grantee_id: SubjectId,
        app_scope: &AppTag,
    ) -> AppResult<Option<AccessGrant>>;

    /// Inserts an active grant.
    ///
    /// When another active grant for the same triple already exists, returns
    /// that row instead of inserting.
    async fn insert_active_grant(&self, grant: &AccessGrant) -> AppResult<AccessGrant>;

    /// Finds a grant by id regardless of status.
    async fn find_grant(&self, grant_id: Uuid) -> AppResult<Option<AccessGrant>>;

    /// Moves an active grant to revoked.
    ///
    /// Returns `true` only when this call performed the transition.
    async fn revoke_grant(&self, grant_id: Uuid, revoked_at: DateTime<Utc>) -> AppResult<bool>;

    /// Lists active grants where the subject is grantor or grantee.
    async fn list_active_grants(&self, subject_id: SubjectId) -> AppResult<Vec<AccessGrant>>;

    /// Deletes pending tokens that expired before the cutoff.
    async fn delete_expired_pending_tokens(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Pending token returned to its issuer.
#[derive(Debug, Clone)]
pub struct CreatedAccessToken {
    /// Raw token; only ever returned here.
    pub token: String,
    /// Persisted offer.
    pub pending: PendingToken,
    /// Encoded payload to render as a scannable code.
    pub qr_payload: String,
}

/// Application service managing access-grant offers and grants.
#[derive(Clone)]
pub struct AccessGrantService {
    repository: Arc<dyn AccessGrantRepository>,
    clock: Arc<dyn Clock>,
    pending_ttl: Duration,
}

impl AccessGrantService {
    /// Creates a new access grant service.
    #[must_use]
    pub fn new(repository: Arc<dyn AccessGrantRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            pending_ttl: Duration::minutes(DEFAULT_PENDING_TOKEN_TTL_MINUTES),
        }
    }

    /// Overrides the pending token lifetime.
    #[must_use]
    pub fn with_pending_ttl(mut self, pending_ttl: Duration) -> Self {
        self.pending_ttl = pending_ttl;
        self
    }

    /// Creates a pending token offering `offer` in `app_scope`.
    pub async fn create_access_token(
        &self,
        issuer_id: SubjectId,
        app_scope: AppTag,
        offer: GrantOffer,
    ) -> AppResult<CreatedAccessToken> {
        offer.validate()?;

        let (token, token_hash) = generate_credential(PENDING_TOKEN_BYTES)?;
        let qr_payload = QrPayload::for_offer(app_scope.clone(), token.clone(), &offer).encode()?;

        let now = self.clock.now();
        let pending = PendingToken {
            token_hash,
            issuer_id,
            app_scope,
            offer,
            created_at: now,
            expires_at: now + self.pending_ttl,
            consumed_at: None,
        };

        self.repository.insert_pending_token(&pending).await?;

        info!(
            app = %pending.app_scope,
            action = pending.action().as_str(),
            token = %redact_code(&token),
            "created access token"
        );

        Ok(CreatedAccessToken {
            token,
            pending,
            qr_payload,
        })
    }

    /// Revokes a grant on behalf of one of its parties.
    ///
    /// Revoking an already revoked grant succeeds without changes.
    pub async fn revoke_grant(&self, grant_id: Uuid, requester_id: SubjectId) -> AppResult<()> {
        let grant = self
            .repository
            .find_grant(grant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("access grant '{grant_id}' does not exist")))?;

        if !grant.involves(requester_id) {
            return Err(AppError::Forbidden(
                "only the grantor or grantee may revoke a grant".to_owned(),
            ));
        }

        if !grant.is_active() {
            return Ok(());
        }

        let revoked = self
            .repository
            .revoke_grant(grant_id, self.clock.now())
            .await?;

        if revoked {
            info!(grant_id = %grant_id, app = %grant.app_scope, "revoked access grant");
        }

        Ok(())
    }

    /// Lists active grants on either side of the relationship.
    pub async fn list_grants(&self, subject_id: SubjectId) -> AppResult<Vec<AccessGrant>> {
        self.repository.list_active_grants(subject_id).await
    }
}
