//! Public redirect endpoints opened by browsers and app webviews.
//!
//! Every outcome is a redirect: failures carry an `error` code instead of a
//! JSON body so the receiving app can render its own message. A spent or
//! expired short code goes back to the app that issued it; anything whose
//! app is unknown goes to the fallback destination.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use handoff_application::{RateLimitRule, ShortCodeRejection};
use handoff_core::redact::redact_code;
use handoff_core::{AppError, AppResult};
use handoff_domain::{RedirectTarget, ShortCodeRecord, TokenClaims};
use tracing::{info, warn};

use crate::dto::HandoffQuery;
use crate::middleware::client_ip;
use crate::redirects::{HandoffFlow, failure_redirect, success_redirect};
use crate::state::AppState;

/// `GET /r/{code}`: redeems a short code and hands the user to its app.
pub async fn short_code_redirect_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response {
    let client = client_ip(peer.ip(), &headers, &state.trusted_proxies);

    match redeem_short_code(&state, client, &code).await {
        Ok(record) => {
            info!(
                app = %record.app,
                code = %redact_code(&code),
                "short code handoff completed"
            );
            success_redirect(
                state.destinations.for_app(&record.app),
                record.subject_id,
                &record.email,
                record.redirect_url.as_deref(),
            )
        }
        Err(ShortCodeRejection { app, error }) => {
            let destination = match &app {
                Some(app) => state.destinations.for_app(app),
                None => state.destinations.fallback(),
            };
            rejected(destination, HandoffFlow::ShortCode, &error)
        }
    }
}

/// `GET /handoff?token=`: verifies a signed token and hands the user to its app.
pub async fn signed_token_redirect_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<HandoffQuery>,
) -> Response {
    let client = client_ip(peer.ip(), &headers, &state.trusted_proxies);

    match verify_signed_token(&state, client, query.token.as_deref()).await {
        Ok(claims) => {
            info!(app = %claims.app, "signed token handoff completed");
            success_redirect(
                state.destinations.for_app(&claims.app),
                claims.sub,
                &claims.email,
                None,
            )
        }
        Err(error) => rejected(
            state.destinations.fallback(),
            HandoffFlow::SignedToken,
            &error,
        ),
    }
}

async fn redeem_short_code(
    state: &AppState,
    client: IpAddr,
    code: &str,
) -> Result<ShortCodeRecord, ShortCodeRejection> {
    state
        .rate_limit_service
        .check_rate_limit(&RateLimitRule::short_code_redeem(), &client.to_string())
        .await?;

    state.short_code_service.redeem_for_redirect(code).await
}

async fn verify_signed_token(
    state: &AppState,
    client: IpAddr,
    token: Option<&str>,
) -> AppResult<TokenClaims> {
    state
        .rate_limit_service
        .check_rate_limit(&RateLimitRule::token_handoff(), &client.to_string())
        .await?;

    let token = token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::InvalidFormat("token parameter is required".to_owned()))?;

    state.token_codec.verify(token)
}

fn rejected(destination: &RedirectTarget, flow: HandoffFlow, error: &AppError) -> Response {
    let error_code = flow.error_code(error);

    match error {
        AppError::StorageUnavailable(_) | AppError::Internal(_) => warn!(
            flow = flow.as_str(),
            error_code,
            error = %error,
            "handoff redirect could not be served"
        ),
        _ => info!(flow = flow.as_str(), error_code, "handoff redirect rejected"),
    }

    failure_redirect(destination, error_code)
}

#[cfg(test)]
mod tests;
