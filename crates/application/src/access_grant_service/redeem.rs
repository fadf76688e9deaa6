use handoff_domain::is_well_formed_pending_token;
use tracing::warn;

use crate::token_crypto::hash_credential;

use super::*;

impl AccessGrantService {
    /// Redeems a pending token for `grantee_id`, returning the resulting grant.
    ///
    /// When the pair already holds an active grant in the token's scope, that
    /// grant is returned and no second row is created.
    pub async fn redeem_token(&self, token: &str, grantee_id: SubjectId) -> AppResult<AccessGrant> {
        let pending = self.consume_pending(token).await?;
        self.grant_for(&pending, grantee_id).await
    }

    /// Validates and atomically consumes a pending token.
    pub(super) async fn consume_pending(&self, token: &str) -> AppResult<PendingToken> {
        if !is_well_formed_pending_token(token) {
            return Err(AppError::InvalidFormat(
                "access token must be 48 lowercase hex characters".to_owned(),
            ));
        }

        let token_hash = hash_credential(token);
        let pending = self
            .repository
            .find_pending_token(&token_hash)
            .await?
            .ok_or_else(|| AppError::NotFound("access token does not exist".to_owned()))?;

        if pending.is_expired_at(self.clock.now()) {
            return Err(AppError::Expired);
        }

        if pending.consumed_at.is_some() {
            return Err(AppError::AlreadyUsed);
        }

        let now = self.clock.now();
        if !self
            .repository
            .consume_pending_token(&token_hash, now)
            .await?
        {
            if pending.is_expired_at(now) {
                return Err(AppError::Expired);
            }

            warn!(
                app = %pending.app_scope,
                token = %redact_code(token),
                "access token redemption lost a concurrent race"
            );
            return Err(AppError::AlreadyUsed);
        }

        Ok(PendingToken {
            consumed_at: Some(now),
            ..pending
        })
    }

    /// Turns a consumed token into a grant for `grantee_id`.
    pub(super) async fn grant_for(
        &self,
        pending: &PendingToken,
        grantee_id: SubjectId,
    ) -> AppResult<AccessGrant> {
        if grantee_id == pending.issuer_id {
            return Err(AppError::Validation(
                "an access token cannot be redeemed by its issuer".to_owned(),
            ));
        }

        if let Some(existing) = self
            .repository
            .find_active_grant(pending.issuer_id, grantee_id, &pending.app_scope)
            .await?
        {
            info!(
                grant_id = %existing.id,
                app = %existing.app_scope,
                "access token matched an existing grant"
            );
            return Ok(existing);
        }

        let candidate = AccessGrant::new_active(
            pending.issuer_id,
            grantee_id,
            pending.app_scope.clone(),
            pending.offer.grant_label(),
            self.clock.now(),
        );
        let grant = self.repository.insert_active_grant(&candidate).await?;

        info!(
            grant_id = %grant.id,
            app = %grant.app_scope,
            action = pending.action().as_str(),
            "created access grant"
        );

        Ok(grant)
    }
}
