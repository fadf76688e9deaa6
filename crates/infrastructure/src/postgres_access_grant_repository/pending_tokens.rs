use std::str::FromStr;

use handoff_domain::{GrantAction, GrantOffer};

use super::*;

impl PostgresAccessGrantRepository {
    pub(super) async fn insert_pending_token_impl(&self, token: &PendingToken) -> AppResult<()> {
        let (action, action_param) = offer_columns(&token.offer);

        sqlx::query(
            r#"
            INSERT INTO handoff_pending_tokens (
                token_hash, issuer_id, app_scope, action, action_param,
                created_at, expires_at, consumed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.token_hash.as_str())
        .bind(token.issuer_id.as_i64())
        .bind(token.app_scope.as_str())
        .bind(action)
        .bind(action_param)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.consumed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to insert pending token", error))?;

        Ok(())
    }

    pub(super) async fn find_pending_token_impl(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<PendingToken>> {
        let row = sqlx::query_as::<_, PendingTokenRow>(
            r#"
            SELECT token_hash, issuer_id, app_scope, action, action_param,
                   created_at, expires_at, consumed_at
            FROM handoff_pending_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to find pending token", error))?;

        row.map(PendingToken::try_from).transpose()
    }

    pub(super) async fn consume_pending_token_impl(
        &self,
        token_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE handoff_pending_tokens
            SET consumed_at = $2
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(consumed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to consume pending token", error))?;

        Ok(result.rows_affected() == 1)
    }

    pub(super) async fn delete_expired_pending_tokens_impl(
        &self,
        before: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM handoff_pending_tokens
            WHERE expires_at < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| sqlx_error("failed to delete expired pending tokens", error))?;

        Ok(result.rows_affected())
    }
}

fn offer_columns(offer: &GrantOffer) -> (&'static str, Option<&str>) {
    let param = match offer {
        GrantOffer::Link { label } => label.as_deref(),
        GrantOffer::Assign { crew } => Some(crew.as_str()),
        GrantOffer::JoinSite { site_id } => Some(site_id.as_str()),
    };
    (offer.action().as_str(), param)
}

fn offer_from_columns(action: &str, param: Option<String>) -> AppResult<GrantOffer> {
    let action = GrantAction::from_str(action)
        .map_err(|error| AppError::Internal(format!("invalid persisted offer: {error}")))?;

    let required = |param: Option<String>| {
        param.ok_or_else(|| {
            AppError::Internal(format!(
                "persisted '{}' offer is missing its parameter",
                action.as_str()
            ))
        })
    };

    Ok(match action {
        GrantAction::Link => GrantOffer::Link { label: param },
        GrantAction::Assign => GrantOffer::Assign {
            crew: required(param)?,
        },
        GrantAction::JoinSite => GrantOffer::JoinSite {
            site_id: required(param)?,
        },
    })
}

#[derive(Debug, sqlx::FromRow)]
struct PendingTokenRow {
    token_hash: String,
    issuer_id: i64,
    app_scope: String,
    action: String,
    action_param: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PendingTokenRow> for PendingToken {
    type Error = AppError;

    fn try_from(row: PendingTokenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            offer: offer_from_columns(&row.action, row.action_param)?,
            token_hash: row.token_hash,
            issuer_id: persisted_subject(row.issuer_id)?,
            app_scope: persisted_app(row.app_scope)?,
            created_at: row.created_at,
            expires_at: row.expires_at,
            consumed_at: row.consumed_at,
        })
    }
}
