use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use handoff_domain::GrantOffer;

use super::{
    create_access_token_handler, join_site_handler, list_grants_handler,
    redeem_access_token_handler, revoke_grant_handler,
};
use crate::dto::{
    AccessTokenResponse, CreateAccessTokenRequest, JoinSiteRequest, ListGrantsQuery,
    RedeemAccessTokenRequest, RevokeGrantRequest,
};
use crate::handlers::test_support::{TestContext, test_context};

async fn offer(context: &TestContext, app_scope: &str, offer: GrantOffer) -> AccessTokenResponse {
    let result = create_access_token_handler(
        State(context.state.clone()),
        Json(CreateAccessTokenRequest {
            issuer_id: 1,
            app_scope: app_scope.to_owned(),
            offer,
        }),
    )
    .await;

    match result {
        Ok((status, Json(body))) if status == StatusCode::CREATED => body,
        Ok((status, _)) => panic!("unexpected status {status}"),
        Err(error) => panic!("creating an access token failed: {error:?}"),
    }
}

async fn active_grant_count(context: &TestContext, subject_id: i64) -> usize {
    let listed = list_grants_handler(
        State(context.state.clone()),
        Query(ListGrantsQuery { subject_id }),
    )
    .await;
    listed.map(|Json(grants)| grants.len()).unwrap_or_default()
}

fn join_site_offer() -> GrantOffer {
    GrantOffer::JoinSite {
        site_id: "north-yard".to_owned(),
    }
}

#[tokio::test]
async fn scanned_site_payload_joins_lists_and_revokes() {
    let context = test_context();
    let created = offer(&context, "timekeeper", join_site_offer()).await;
    assert_eq!(created.token.len(), 48);

    let joined = join_site_handler(
        State(context.state.clone()),
        Json(JoinSiteRequest {
            payload: created.qr_payload.clone(),
            grantee_id: 2,
            app: "timekeeper".to_owned(),
        }),
    )
    .await;
    let Ok(Json(joined)) = joined else {
        panic!("joining the site should succeed");
    };
    assert_eq!(joined.site_id, "north-yard");
    assert_eq!(joined.grant.grantor_id, 1);
    assert_eq!(joined.grant.grantee_id, 2);
    assert_eq!(joined.grant.status, "active");

    assert_eq!(active_grant_count(&context, 1).await, 1);
    assert_eq!(active_grant_count(&context, 2).await, 1);

    let revoked = revoke_grant_handler(
        State(context.state.clone()),
        Path(joined.grant.id),
        Json(RevokeGrantRequest { requester_id: 2 }),
    )
    .await;
    assert_eq!(revoked.ok(), Some(StatusCode::NO_CONTENT));
    assert_eq!(active_grant_count(&context, 1).await, 0);

    let replay = redeem_access_token_handler(
        State(context.state.clone()),
        Json(RedeemAccessTokenRequest {
            token: created.token,
            grantee_id: 3,
        }),
    )
    .await;
    assert_eq!(
        replay.err().map(|error| error.into_response().status()),
        Some(StatusCode::CONFLICT)
    );
}

#[tokio::test]
async fn payload_for_another_app_is_a_scope_mismatch() {
    let context = test_context();
    let created = offer(&context, "timekeeper", join_site_offer()).await;

    let joined = join_site_handler(
        State(context.state.clone()),
        Json(JoinSiteRequest {
            payload: created.qr_payload,
            grantee_id: 2,
            app: "calculator".to_owned(),
        }),
    )
    .await;
    assert_eq!(
        joined.err().map(|error| error.into_response().status()),
        Some(StatusCode::FORBIDDEN)
    );

    let redeemed = redeem_access_token_handler(
        State(context.state.clone()),
        Json(RedeemAccessTokenRequest {
            token: created.token,
            grantee_id: 2,
        }),
    )
    .await;
    assert!(redeemed.is_ok());
}

#[tokio::test]
async fn offers_are_limited_to_allowed_apps() {
    let context = test_context();

    let result = create_access_token_handler(
        State(context.state.clone()),
        Json(CreateAccessTokenRequest {
            issuer_id: 1,
            app_scope: "ledger".to_owned(),
            offer: GrantOffer::Link { label: None },
        }),
    )
    .await;
    assert_eq!(
        result.err().map(|error| error.into_response().status()),
        Some(StatusCode::FORBIDDEN)
    );
}

#[tokio::test]
async fn only_parties_may_revoke_a_grant() {
    let context = test_context();
    let created = offer(
        &context,
        "calculator",
        GrantOffer::Assign {
            crew: "framing".to_owned(),
        },
    )
    .await;

    let redeemed = redeem_access_token_handler(
        State(context.state.clone()),
        Json(RedeemAccessTokenRequest {
            token: created.token,
            grantee_id: 2,
        }),
    )
    .await;
    let Ok(Json(grant)) = redeemed else {
        panic!("redeeming the offer should succeed");
    };
    assert_eq!(grant.label.as_deref(), Some("framing"));

    let stranger = revoke_grant_handler(
        State(context.state.clone()),
        Path(grant.id),
        Json(RevokeGrantRequest { requester_id: 9 }),
    )
    .await;
    assert_eq!(
        stranger.err().map(|error| error.into_response().status()),
        Some(StatusCode::FORBIDDEN)
    );
    assert_eq!(active_grant_count(&context, 2).await, 1);
}

#[test]
fn offers_deserialize_from_action_tagged_json() {
    let raw = serde_json::json!({
        "issuer_id": 1,
        "app_scope": "timekeeper",
        "offer": { "action": "join_site", "site_id": "north-yard" }
    });

    let parsed: Result<CreateAccessTokenRequest, _> = serde_json::from_value(raw);
    assert!(parsed.is_ok_and(|request| request.offer == join_site_offer()));
}
