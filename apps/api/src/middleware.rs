use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use ipnet::IpNet;
use subtle::ConstantTimeEq;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Admits calls carrying `Authorization: Bearer <SERVICE_SHARED_SECRET>`.
pub async fn require_service_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| ApiError::Unauthorized("service credential required".to_owned()))?;

    let matches: bool = presented
        .as_bytes()
        .ct_eq(state.service_shared_secret.as_bytes())
        .into();
    if !matches {
        return Err(ApiError::Unauthorized(
            "invalid service credential".to_owned(),
        ));
    }

    Ok(next.run(request).await)
}

/// Resolves the client address used for per-client rate limiting.
///
/// `X-Forwarded-For` is honored only when the direct peer is a trusted proxy;
/// the right-most hop outside the trusted networks is the client.
pub fn client_ip(peer: IpAddr, headers: &HeaderMap, trusted_proxies: &[IpNet]) -> IpAddr {
    let is_trusted = |address: &IpAddr| {
        trusted_proxies
            .iter()
            .any(|network| network.contains(address))
    };

    if !is_trusted(&peer) {
        return peer;
    }

    let forwarded: Vec<IpAddr> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect();

    forwarded
        .iter()
        .rev()
        .find(|address| !is_trusted(*address))
        .or_else(|| forwarded.first())
        .copied()
        .unwrap_or(peer)
}
