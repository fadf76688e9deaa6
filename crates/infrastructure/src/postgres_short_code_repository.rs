//! PostgreSQL-backed short code repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use handoff_application::ShortCodeRepository;
use handoff_core::{AppError, AppResult, SubjectId};
use handoff_domain::{AppTag, ShortCodeRecord};

use crate::storage_error::sqlx_error;

/// PostgreSQL implementation of the short code repository port.
#[derive(Clone)]
pub struct PostgresShortCodeRepository {
    pool: PgPool,
}

impl PostgresShortCodeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShortCodeRepository for PostgresShortCodeRepository {
    async fn insert_short_code(&self, record: &ShortCodeRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO handoff_short_codes (
                code_hash, app, subject_id, email, redirect_url, created_at, expires_at, used
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.code_hash.as_str())
        .bind(record.app.as_str())
        .bind(record.subject_id.as_i64())
        .bind(record.email.as_str())
        .bind(record.redirect_url.as_deref())
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.used)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to insert short code", error))?;

        Ok(())
    }

    async fn find_short_code(&self, code_hash: &str) -> AppResult<Option<ShortCodeRecord>> {
        let row = sqlx::query_as::<_, ShortCodeRow>(
            r#"
            SELECT code_hash, app, subject_id, email, redirect_url, created_at, expires_at, used
            FROM handoff_short_codes
            WHERE code_hash = $1
            "#,
        )
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to find short code", error))?;

        row.map(ShortCodeRecord::try_from).transpose()
    }

    async fn mark_short_code_used(&self, code_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE handoff_short_codes
            SET used = TRUE
            WHERE code_hash = $1
              AND used = FALSE
              AND expires_at > $2
            "#,
        )
        .bind(code_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to mark short code used", error))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_short_codes(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM handoff_short_codes
            WHERE expires_at < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to delete expired short codes", error))?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShortCodeRow {
    code_hash: String,
    app: String,
    subject_id: i64,
    email: String,
    redirect_url: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used: bool,
}

impl TryFrom<ShortCodeRow> for ShortCodeRecord {
    type Error = AppError;

    fn try_from(row: ShortCodeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            code_hash: row.code_hash,
            app: AppTag::new(row.app).map_err(|error| {
                AppError::Internal(format!("invalid persisted short code app: {error}"))
            })?,
            subject_id: SubjectId::new(row.subject_id).map_err(|error| {
                AppError::Internal(format!("invalid persisted short code subject: {error}"))
            })?,
            email: row.email,
            redirect_url: row.redirect_url,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used: row.used,
        })
    }
}
