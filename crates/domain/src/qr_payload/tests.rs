use handoff_core::AppError;
use proptest::prelude::*;

use super::{QR_PAYLOAD_MAX_BYTES, QrPayload};
use crate::{AppTag, GrantAction, GrantOffer};

fn app_tag(value: &str) -> AppTag {
    match AppTag::new(value) {
        Ok(tag) => tag,
        Err(error) => panic!("invalid app tag in test: {error}"),
    }
}

fn arb_app_tag() -> impl Strategy<Value = AppTag> {
    "[a-z][a-z0-9_-]{0,20}".prop_map(|value| app_tag(&value))
}

fn arb_field() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 _.-]{1,40}"
}

fn arb_payload() -> impl Strategy<Value = QrPayload> {
    let token = "[0-9a-f]{48}";
    prop_oneof![
        (arb_app_tag(), token, proptest::option::of(arb_field()))
            .prop_map(|(app, token, label)| QrPayload::Link { app, token, label }),
        (arb_app_tag(), token, arb_field())
            .prop_map(|(app, token, crew)| QrPayload::Assign { app, token, crew }),
        (arb_app_tag(), token, arb_field())
            .prop_map(|(app, token, site_id)| QrPayload::JoinSite {
                app,
                token,
                site_id
            }),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(payload in arb_payload()) {
        let encoded = payload.encode();
        prop_assert!(encoded.is_ok());
        let decoded = QrPayload::decode(&encoded.unwrap_or_default());
        prop_assert_eq!(decoded.ok(), Some(payload));
    }
}

#[test]
fn join_site_wire_form_is_compact_and_tagged() {
    let payload = QrPayload::JoinSite {
        app: app_tag("timekeeper"),
        token: "ab".repeat(24),
        site_id: "north-yard".to_owned(),
    };

    let encoded = payload.encode().unwrap_or_default();
    assert!(!encoded.contains(' '));
    assert!(encoded.contains("\"action\":\"join_site\""));
    assert!(encoded.contains("\"site_id\":\"north-yard\""));
}

#[test]
fn unknown_action_is_rejected_not_coerced() {
    let decoded = QrPayload::decode(r#"{"action":"promote","app":"timekeeper","token":"x"}"#);
    assert!(matches!(decoded, Err(AppError::UnknownAction(action)) if action == "promote"));
}

#[test]
fn missing_action_is_invalid_format() {
    let decoded = QrPayload::decode(r#"{"app":"timekeeper","token":"x"}"#);
    assert!(matches!(decoded, Err(AppError::InvalidFormat(_))));
}

#[test]
fn missing_action_field_is_invalid_format() {
    let decoded = QrPayload::decode(r#"{"action":"join_site","app":"timekeeper","token":"x"}"#);
    assert!(matches!(decoded, Err(AppError::InvalidFormat(_))));
}

#[test]
fn invalid_app_tag_is_invalid_format() {
    let decoded = QrPayload::decode(r#"{"action":"link","app":"Time Keeper","token":"x"}"#);
    assert!(matches!(decoded, Err(AppError::InvalidFormat(_))));
}

#[test]
fn non_json_input_is_invalid_format() {
    assert!(matches!(
        QrPayload::decode("https://example.com/not-a-payload"),
        Err(AppError::InvalidFormat(_))
    ));
}

#[test]
fn oversized_payloads_are_rejected_both_ways() {
    let payload = QrPayload::Link {
        app: app_tag("timekeeper"),
        token: "ab".repeat(24),
        label: Some("x".repeat(QR_PAYLOAD_MAX_BYTES)),
    };
    assert!(matches!(payload.encode(), Err(AppError::Validation(_))));

    let oversized = format!(
        r#"{{"action":"link","app":"timekeeper","token":"{}"}}"#,
        "a".repeat(QR_PAYLOAD_MAX_BYTES)
    );
    assert!(matches!(
        QrPayload::decode(&oversized),
        Err(AppError::InvalidFormat(_))
    ));
}

#[test]
fn payload_exposes_the_offer_it_advertises() {
    let offer = GrantOffer::Assign {
        crew: "framing".to_owned(),
    };
    let payload = QrPayload::for_offer(app_tag("timekeeper"), "ab".repeat(24), &offer);

    assert_eq!(payload.action(), GrantAction::Assign);
    assert_eq!(payload.offer(), offer);
    assert_eq!(payload.app().as_str(), "timekeeper");
}
