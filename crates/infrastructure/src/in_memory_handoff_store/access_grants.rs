use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_application::AccessGrantRepository;
use handoff_core::SubjectId;
use handoff_domain::{AppTag, GrantStatus};

use super::*;

fn same_triple(grant: &AccessGrant, other: &AccessGrant) -> bool {
    grant.grantor_id == other.grantor_id
        && grant.grantee_id == other.grantee_id
        && grant.app_scope == other.app_scope
}

#[async_trait]
impl AccessGrantRepository for InMemoryHandoffStore {
    async fn insert_pending_token(&self, token: &PendingToken) -> AppResult<()> {
        self.ensure_available()?;
        let mut pending_tokens = self.pending_tokens.write().await;

        if pending_tokens.contains_key(&token.token_hash) {
            return Err(AppError::Internal("pending token hash collision".to_owned()));
        }

        pending_tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_pending_token(&self, token_hash: &str) -> AppResult<Option<PendingToken>> {
        self.ensure_available()?;
        Ok(self.pending_tokens.read().await.get(token_hash).cloned())
    }

    async fn consume_pending_token(
        &self,
        token_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.ensure_available()?;
        let mut pending_tokens = self.pending_tokens.write().await;

        match pending_tokens.get_mut(token_hash) {
            Some(token) if token.consumed_at.is_none() && !token.is_expired_at(consumed_at) => {
                token.consumed_at = Some(consumed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_active_grant(
        &self,
        grantor_id: SubjectId,
        grantee_id: SubjectId,
        app_scope: &AppTag,
    ) -> AppResult<Option<AccessGrant>> {
        self.ensure_available()?;
        Ok(self
            .grants
            .read()
            .await
            .values()
            .find(|grant| {
                grant.is_active()
                    && grant.grantor_id == grantor_id
                    && grant.grantee_id == grantee_id
                    && &grant.app_scope == app_scope
            })
            .cloned())
    }

    async fn insert_active_grant(&self, grant: &AccessGrant) -> AppResult<AccessGrant> {
        self.ensure_available()?;
        let mut grants = self.grants.write().await;

        if let Some(existing) = grants
            .values()
            .find(|existing| existing.is_active() && same_triple(existing, grant))
        {
            return Ok(existing.clone());
        }

        let stored = AccessGrant {
            status: GrantStatus::Active,
            revoked_at: None,
            ..grant.clone()
        };
        grants.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_grant(&self, grant_id: Uuid) -> AppResult<Option<AccessGrant>> {
        self.ensure_available()?;
        Ok(self.grants.read().await.get(&grant_id).cloned())
    }

    async fn revoke_grant(&self, grant_id: Uuid, revoked_at: DateTime<Utc>) -> AppResult<bool> {
        self.ensure_available()?;
        let mut grants = self.grants.write().await;

        match grants.get_mut(&grant_id) {
            Some(grant) if grant.is_active() => {
                grant.status = GrantStatus::Revoked;
                grant.revoked_at = Some(revoked_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active_grants(&self, subject_id: SubjectId) -> AppResult<Vec<AccessGrant>> {
        self.ensure_available()?;
        let mut grants: Vec<AccessGrant> = self
            .grants
            .read()
            .await
            .values()
            .filter(|grant| grant.is_active() && grant.involves(subject_id))
            .cloned()
            .collect();
        grants.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Ok(grants)
    }

    async fn delete_expired_pending_tokens(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.ensure_available()?;
        let mut pending_tokens = self.pending_tokens.write().await;
        let initial = pending_tokens.len();
        pending_tokens.retain(|_, token| token.expires_at >= before);
        Ok((initial - pending_tokens.len()) as u64)
    }
}
