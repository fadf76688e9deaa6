use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use handoff_core::{AppError, SubjectId};
use handoff_domain::AppTag;
use uuid::Uuid;

use crate::dto::{
    AccessGrantResponse, AccessTokenResponse, CreateAccessTokenRequest, JoinSiteRequest,
    JoinSiteResponse, ListGrantsQuery, RedeemAccessTokenRequest, RevokeGrantRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

/// Creates a pending token and the payload to render as a scannable code.
pub async fn create_access_token_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccessTokenRequest>,
) -> ApiResult<(StatusCode, Json<AccessTokenResponse>)> {
    let issuer_id = SubjectId::new(payload.issuer_id)?;
    let app_scope = AppTag::new(payload.app_scope)?;

    if !state.token_codec.is_allowed(&app_scope) {
        return Err(AppError::UnauthorizedApp(app_scope.to_string()).into());
    }

    let created = state
        .access_grant_service
        .create_access_token(issuer_id, app_scope, payload.offer)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccessTokenResponse {
            action: created.pending.action(),
            expires_at: created.pending.expires_at,
            token: created.token,
            qr_payload: created.qr_payload,
        }),
    ))
}

pub async fn redeem_access_token_handler(
    State(state): State<AppState>,
    Json(payload): Json<RedeemAccessTokenRequest>,
) -> ApiResult<Json<AccessGrantResponse>> {
    let grantee_id = SubjectId::new(payload.grantee_id)?;

    let grant = state
        .access_grant_service
        .redeem_token(&payload.token, grantee_id)
        .await?;

    Ok(Json(grant.into()))
}

pub async fn join_site_handler(
    State(state): State<AppState>,
    Json(payload): Json<JoinSiteRequest>,
) -> ApiResult<Json<JoinSiteResponse>> {
    let grantee_id = SubjectId::new(payload.grantee_id)?;
    let running_app = AppTag::new(payload.app)?;

    let joined = state
        .access_grant_service
        .join_site(&payload.payload, grantee_id, &running_app)
        .await?;

    Ok(Json(JoinSiteResponse {
        site_id: joined.site_id,
        grant: joined.grant.into(),
    }))
}

pub async fn list_grants_handler(
    State(state): State<AppState>,
    Query(query): Query<ListGrantsQuery>,
) -> ApiResult<Json<Vec<AccessGrantResponse>>> {
    let subject_id = SubjectId::new(query.subject_id)?;

    let grants = state.access_grant_service.list_grants(subject_id).await?;

    Ok(Json(grants.into_iter().map(AccessGrantResponse::from).collect()))
}

/// Revokes a grant. Repeating the call on a revoked grant is a no-op.
pub async fn revoke_grant_handler(
    State(state): State<AppState>,
    Path(grant_id): Path<Uuid>,
    Json(payload): Json<RevokeGrantRequest>,
) -> ApiResult<StatusCode> {
    let requester_id = SubjectId::new(payload.requester_id)?;

    state
        .access_grant_service
        .revoke_grant(grant_id, requester_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests;
