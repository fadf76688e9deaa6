use std::str::FromStr;

use handoff_domain::GrantStatus;
use tracing::debug;

use super::*;

const GRANT_COLUMNS: &str =
    "id, grantor_id, grantee_id, app_scope, label, status, created_at, revoked_at";

impl PostgresAccessGrantRepository {
    pub(super) async fn find_active_grant_impl(
        &self,
        grantor_id: SubjectId,
        grantee_id: SubjectId,
        app_scope: &AppTag,
    ) -> AppResult<Option<AccessGrant>> {
        let row = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM handoff_access_grants
            WHERE grantor_id = $1
              AND grantee_id = $2
              AND app_scope = $3
              AND status = 'active'
            "#
        ))
        .bind(grantor_id.as_i64())
        .bind(grantee_id.as_i64())
        .bind(app_scope.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to find active access grant", error))?;

        row.map(AccessGrant::try_from).transpose()
    }

    pub(super) async fn insert_active_grant_impl(
        &self,
        grant: &AccessGrant,
    ) -> AppResult<AccessGrant> {
        let inserted = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            INSERT INTO handoff_access_grants (
                id, grantor_id, grantee_id, app_scope, label, status, created_at, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, 'active', $6, NULL)
            ON CONFLICT (grantor_id, grantee_id, app_scope) WHERE status = 'active'
            DO NOTHING
            RETURNING {GRANT_COLUMNS}
            "#
        ))
        .bind(grant.id)
        .bind(grant.grantor_id.as_i64())
        .bind(grant.grantee_id.as_i64())
        .bind(grant.app_scope.as_str())
        .bind(grant.label.as_deref())
        .bind(grant.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to insert access grant", error))?;

        if let Some(row) = inserted {
            return AccessGrant::try_from(row);
        }

        debug!(
            app = %grant.app_scope,
            "concurrent grant insert resolved to the existing active row"
        );
        self.find_active_grant_impl(grant.grantor_id, grant.grantee_id, &grant.app_scope)
            .await?
            .ok_or_else(|| {
                AppError::Internal(
                    "access grant conflicted with a row that is no longer active".to_owned(),
                )
            })
    }

    pub(super) async fn find_grant_impl(&self, grant_id: Uuid) -> AppResult<Option<AccessGrant>> {
        let row = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM handoff_access_grants
            WHERE id = $1
            "#
        ))
        .bind(grant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to find access grant", error))?;

        row.map(AccessGrant::try_from).transpose()
    }

    pub(super) async fn revoke_grant_impl(
        &self,
        grant_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE handoff_access_grants
            SET status = 'revoked', revoked_at = $2
            WHERE id = $1
              AND status = 'active'
            "#,
        )
        .bind(grant_id)
        .bind(revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to revoke access grant", error))?;

        Ok(result.rows_affected() == 1)
    }

    pub(super) async fn list_active_grants_impl(
        &self,
        subject_id: SubjectId,
    ) -> AppResult<Vec<AccessGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM handoff_access_grants
            WHERE status = 'active'
              AND (grantor_id = $1 OR grantee_id = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(subject_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to list access grants", error))?;

        rows.into_iter().map(AccessGrant::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    id: Uuid,
    grantor_id: i64,
    grantee_id: i64,
    app_scope: String,
    label: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<GrantRow> for AccessGrant {
    type Error = AppError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            grantor_id: persisted_subject(row.grantor_id)?,
            grantee_id: persisted_subject(row.grantee_id)?,
            app_scope: persisted_app(row.app_scope)?,
            label: row.label,
            status: GrantStatus::from_str(&row.status)?,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        })
    }
}
