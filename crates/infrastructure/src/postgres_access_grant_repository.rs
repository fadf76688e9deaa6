//! PostgreSQL-backed pending token and access grant repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use handoff_application::AccessGrantRepository;
use handoff_core::{AppError, AppResult, SubjectId};
use handoff_domain::{AccessGrant, AppTag, PendingToken};

use crate::storage_error::sqlx_error;

mod grants;
mod pending_tokens;

/// PostgreSQL implementation of the access grant repository port.
#[derive(Clone)]
pub struct PostgresAccessGrantRepository {
    pool: PgPool,
}

impl PostgresAccessGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessGrantRepository for PostgresAccessGrantRepository {
    async fn insert_pending_token(&self, token: &PendingToken) -> AppResult<()> {
        self.insert_pending_token_impl(token).await
    }

    async fn find_pending_token(&self, token_hash: &str) -> AppResult<Option<PendingToken>> {
        self.find_pending_token_impl(token_hash).await
    }

    async fn consume_pending_token(
        &self,
        token_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.consume_pending_token_impl(token_hash, consumed_at)
            .await
    }

    async fn find_active_grant(
        &self,
        grantor_id: SubjectId,
        grantee_id: SubjectId,
        app_scope: &AppTag,
    ) -> AppResult<Option<AccessGrant>> {
        self.find_active_grant_impl(grantor_id, grantee_id, app_scope)
            .await
    }

    async fn insert_active_grant(&self, grant: &AccessGrant) -> AppResult<AccessGrant> {
        self.insert_active_grant_impl(grant).await
    }

    async fn find_grant(&self, grant_id: Uuid) -> AppResult<Option<AccessGrant>> {
        self.find_grant_impl(grant_id).await
    }

    async fn revoke_grant(&self, grant_id: Uuid, revoked_at: DateTime<Utc>) -> AppResult<bool> {
        self.revoke_grant_impl(grant_id, revoked_at).await
    }

    async fn list_active_grants(&self, subject_id: SubjectId) -> AppResult<Vec<AccessGrant>> {
        self.list_active_grants_impl(subject_id).await
    }

    async fn delete_expired_pending_tokens(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.delete_expired_pending_tokens_impl(before).await
    }
}

fn persisted_subject(value: i64) -> AppResult<SubjectId> {
    SubjectId::new(value)
        .map_err(|error| AppError::Internal(format!("invalid persisted subject id: {error}")))
}

fn persisted_app(value: String) -> AppResult<AppTag> {
    AppTag::new(value)
        .map_err(|error| AppError::Internal(format!("invalid persisted app scope: {error}")))
}
