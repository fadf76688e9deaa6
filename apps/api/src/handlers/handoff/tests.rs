use axum::body::to_bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use chrono::Duration;
use handoff_application::IssueShortCodeInput;

use super::{short_code_redirect_handler, signed_token_redirect_handler};
use crate::dto::HandoffQuery;
use crate::handlers::test_support::{
    TestContext, app, location, peer, query_value, subject, test_context,
};

async fn issue_code(context: &TestContext, app_name: &str, redirect_url: Option<&str>) -> String {
    let issued = context
        .state
        .short_code_service
        .issue(IssueShortCodeInput {
            subject_id: subject(42),
            email: "jordan@crew.example".to_owned(),
            app: app(app_name),
            redirect_url: redirect_url.map(str::to_owned),
        })
        .await;

    match issued {
        Ok(issued) => issued.code,
        Err(error) => panic!("issuing a fixture code failed: {error}"),
    }
}

async fn open_code(context: &TestContext, code: &str) -> Response {
    short_code_redirect_handler(
        State(context.state.clone()),
        peer(),
        HeaderMap::new(),
        Path(code.to_owned()),
    )
    .await
}

async fn open_token(context: &TestContext, token: Option<&str>) -> Response {
    signed_token_redirect_handler(
        State(context.state.clone()),
        peer(),
        HeaderMap::new(),
        Query(HandoffQuery {
            token: token.map(str::to_owned),
        }),
    )
    .await
}

fn error_of(response: &Response) -> Option<String> {
    location(response).and_then(|url| query_value(&url, "error"))
}

fn signed_token(context: &TestContext, app_name: &str, ttl_seconds: i64) -> String {
    let issued = context.state.token_codec.issue(
        subject(7),
        "sam@crew.example",
        &app(app_name),
        Duration::seconds(ttl_seconds),
    );
    match issued {
        Ok(signed) => signed.value,
        Err(error) => panic!("issuing a fixture token failed: {error}"),
    }
}

#[tokio::test]
async fn short_code_hands_off_once_then_reports_used_code() {
    let context = test_context();
    let code = issue_code(&context, "calculator", Some("https://pay.example.com/return")).await;

    let first = open_code(&context, &code).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    let Some(url) = location(&first) else {
        panic!("successful handoff should redirect");
    };
    assert_eq!(url.host_str(), Some("calc.example.com"));
    assert_eq!(query_value(&url, "user_id").as_deref(), Some("42"));
    assert_eq!(
        query_value(&url, "prefilled_email").as_deref(),
        Some("jordan@crew.example")
    );
    assert_eq!(
        query_value(&url, "redirect").as_deref(),
        Some("https://pay.example.com/return")
    );

    let second = open_code(&context, &code).await;
    assert_eq!(error_of(&second).as_deref(), Some("used_code"));
    assert_eq!(
        location(&second).and_then(|url| url.host_str().map(str::to_owned)),
        Some("calc.example.com".to_owned())
    );
    assert_eq!(location(&second).and_then(|url| query_value(&url, "user_id")), None);
}

#[tokio::test]
async fn spent_native_code_bounces_back_into_the_app() {
    let context = test_context();
    let code = issue_code(&context, "timekeeper", None).await;

    let first = open_code(&context, &code).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = open_code(&context, &code).await;
    assert_eq!(second.status(), StatusCode::OK);
    let bytes = to_bytes(second.into_body(), 64 * 1024)
        .await
        .unwrap_or_default();
    let body = String::from_utf8(bytes.to_vec()).unwrap_or_default();
    assert!(body.contains("timekeeper://handoff?error=used_code"));
    assert!(!body.contains("portal.example.com"));
}

#[tokio::test]
async fn malformed_and_unknown_codes_are_invalid_codes() {
    let context = test_context();

    let malformed = open_code(&context, "nope").await;
    assert_eq!(error_of(&malformed).as_deref(), Some("invalid_code"));

    let unknown = open_code(&context, &"a".repeat(32)).await;
    assert_eq!(error_of(&unknown).as_deref(), Some("invalid_code"));
    assert_eq!(
        location(&unknown).and_then(|url| url.host_str().map(str::to_owned)),
        Some("portal.example.com".to_owned())
    );
}

#[tokio::test]
async fn stale_code_is_an_expired_code() {
    let context = test_context();
    let code = issue_code(&context, "calculator", None).await;

    context.clock.advance(Duration::seconds(61));

    let response = open_code(&context, &code).await;
    assert_eq!(error_of(&response).as_deref(), Some("expired_code"));
    assert_eq!(
        location(&response).and_then(|url| url.host_str().map(str::to_owned)),
        Some("calc.example.com".to_owned())
    );
}

#[tokio::test]
async fn store_outage_redirects_with_unavailable() {
    let context = test_context();
    let code = issue_code(&context, "calculator", None).await;

    context.store.set_unavailable(true);
    let during_outage = open_code(&context, &code).await;
    assert_eq!(error_of(&during_outage).as_deref(), Some("unavailable"));

    context.store.set_unavailable(false);
    let recovered = open_code(&context, &code).await;
    assert_eq!(recovered.status(), StatusCode::SEE_OTHER);
    assert_eq!(error_of(&recovered), None);
}

#[tokio::test]
async fn repeated_guessing_from_one_client_is_rate_limited() {
    let context = test_context();
    let guess = "b".repeat(32);

    for _ in 0..30 {
        let response = open_code(&context, &guess).await;
        assert_eq!(error_of(&response).as_deref(), Some("invalid_code"));
    }

    let limited = open_code(&context, &guess).await;
    assert_eq!(error_of(&limited).as_deref(), Some("rate_limited"));
}

#[tokio::test]
async fn signed_token_for_web_app_is_a_see_other() {
    let context = test_context();
    let token = signed_token(&context, "calculator", 300);

    let response = open_token(&context, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let Some(url) = location(&response) else {
        panic!("successful handoff should redirect");
    };
    assert_eq!(query_value(&url, "user_id").as_deref(), Some("7"));
    assert_eq!(query_value(&url, "redirect"), None);
}

#[tokio::test]
async fn signed_token_for_native_app_gets_a_bounce_page() {
    let context = test_context();
    let token = signed_token(&context, "timekeeper", 300);

    let response = open_token(&context, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap_or_default();
    let body = String::from_utf8(bytes.to_vec()).unwrap_or_default();
    assert!(body.contains("timekeeper://handoff?user_id=7"));
}

#[tokio::test]
async fn signed_token_failures_carry_token_error_codes() {
    let context = test_context();

    let missing = open_token(&context, None).await;
    assert_eq!(error_of(&missing).as_deref(), Some("invalid_token"));

    let token = signed_token(&context, "calculator", 60);
    let tampered = format!("{token}x");
    let response = open_token(&context, Some(&tampered)).await;
    assert_eq!(error_of(&response).as_deref(), Some("invalid_token"));

    context.clock.advance(Duration::seconds(61));
    let expired = open_token(&context, Some(&token)).await;
    assert_eq!(error_of(&expired).as_deref(), Some("expired_token"));
}
