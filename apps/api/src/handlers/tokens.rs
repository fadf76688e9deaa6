use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Duration;
use handoff_application::IssueShortCodeInput;
use handoff_core::{AppError, SubjectId};
use handoff_domain::AppTag;

use crate::dto::{
    IssueShortCodeRequest, IssueSignedTokenRequest, ShortCodeResponse, SignedTokenResponse,
};
use crate::error::ApiResult;
use crate::redirects::public_link;
use crate::state::AppState;

const MAX_SIGNED_TOKEN_TTL_SECONDS: i64 = 60 * 60;

/// Mints a signed token and the public link that redeems it.
pub async fn issue_signed_token_handler(
    State(state): State<AppState>,
    Json(payload): Json<IssueSignedTokenRequest>,
) -> ApiResult<(StatusCode, Json<SignedTokenResponse>)> {
    let subject_id = SubjectId::new(payload.subject_id)?;
    let app = AppTag::new(payload.app)?;

    let ttl = match payload.ttl_seconds {
        None => state.signed_token_ttl,
        Some(seconds) if !(1..=MAX_SIGNED_TOKEN_TTL_SECONDS).contains(&seconds) => {
            return Err(AppError::Validation(format!(
                "ttl_seconds must be between 1 and {MAX_SIGNED_TOKEN_TTL_SECONDS}"
            ))
            .into());
        }
        Some(seconds) => Duration::seconds(seconds),
    };

    let signed = state
        .token_codec
        .issue(subject_id, &payload.email, &app, ttl)?;

    let mut handoff_url = public_link(&state.public_base_url, &["handoff"])?;
    handoff_url
        .query_pairs_mut()
        .append_pair("token", &signed.value);

    Ok((
        StatusCode::CREATED,
        Json(SignedTokenResponse {
            jti: signed.claims.jti,
            expires_at: signed.claims.exp,
            handoff_url: handoff_url.into(),
            token: signed.value,
        }),
    ))
}

/// Issues a short code for an allow-listed app.
pub async fn issue_short_code_handler(
    State(state): State<AppState>,
    Json(payload): Json<IssueShortCodeRequest>,
) -> ApiResult<(StatusCode, Json<ShortCodeResponse>)> {
    let subject_id = SubjectId::new(payload.subject_id)?;
    let app = AppTag::new(payload.app)?;

    if !state.token_codec.is_allowed(&app) {
        return Err(AppError::UnauthorizedApp(app.to_string()).into());
    }

    let issued = state
        .short_code_service
        .issue(IssueShortCodeInput {
            subject_id,
            email: payload.email,
            app,
            redirect_url: payload.redirect_url,
        })
        .await?;

    let url = public_link(&state.public_base_url, &["r", issued.code.as_str()])?;

    Ok((
        StatusCode::CREATED,
        Json(ShortCodeResponse {
            code: issued.code,
            url: url.into(),
            expires_at: issued.record.expires_at,
        }),
    ))
}
