use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};

use tdx_feedback::config::TdxConfig;
use tdx_feedback::models::{Feedback, TicketId, TicketPayload};
use tdx_feedback::services::ticket_creator::{build_description, extract_ticket_id};
use tdx_feedback::services::{QueryParams, TdxApi, TicketCreator, TicketFailure};
use tdx_feedback::utils::error::{AppError, Result};
use tdx_feedback::utils::json::JsonMap;

mock! {
    pub Tdx {}

    #[async_trait]
    impl TdxApi for Tdx {
        async fn create_ticket(&self, app_id: &str, payload: TicketPayload, params: QueryParams) -> Result<JsonMap>;
        async fn post_feed(&self, app_id: &str, ticket_id: &str, payload: Value) -> Result<JsonMap>;
    }
}

fn enabled_config() -> TdxConfig {
    TdxConfig {
        enable_ticket_creation: true,
        app_id: Some(46),
        type_id: Some(644),
        status_id: Some(115),
        source_id: Some(8),
        service_id: Some(2314),
        responsible_group_id: Some(388),
        ..TdxConfig::default()
    }
}

fn object(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

fn creator_with(config: TdxConfig, mock: MockTdx) -> TicketCreator {
    TicketCreator::new(config, Arc::new(mock))
}

// Creator whose client must never be called
fn offline_creator(config: TdxConfig) -> TicketCreator {
    creator_with(config, MockTdx::new())
}

#[tokio::test]
async fn test_disabled_config_skips_client() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket().times(0);

    let config = TdxConfig {
        enable_ticket_creation: false,
        ..enabled_config()
    };
    let creator = creator_with(config, mock);

    let result = creator.call(&Feedback::new("Hello"), Some("user@example.com")).await;

    assert!(!result.is_success());
    assert!(result.ticket_id().is_none());
    assert!(matches!(result.error(), Some(TicketFailure::Disabled)));
    assert_eq!(result.error().unwrap().to_string(), "Ticket creation disabled");
}

#[tokio::test]
async fn test_successful_call_returns_top_level_id() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket()
        .withf(|app_id, payload, params| {
            app_id.to_string() == "46"
                && params.is_empty()
                && payload.get("Title") == Some(&json!("[Feedback] Something broke"))
                && payload.get("IsRichHtml") == Some(&json!(false))
        })
        .times(1)
        .returning(|_, _, _| Ok(object(json!({ "ID": 12345 }))));

    let creator = creator_with(enabled_config(), mock);
    let result = creator.call(&Feedback::new("Something broke"), None).await;

    assert!(result.is_success());
    assert_eq!(result.ticket_id(), Some(&TicketId::Number(12345)));
    assert_eq!(result.response().unwrap()["ID"], 12345);
    assert!(result.error().is_none());
}

#[tokio::test]
async fn test_successful_call_with_nested_data_id() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket()
        .returning(|_, _, _| Ok(object(json!({ "data": { "ID": 888 } }))));

    let creator = creator_with(enabled_config(), mock);
    let result = creator.call(&Feedback::new("Nested"), None).await;

    assert!(result.is_success());
    assert_eq!(result.ticket_id(), Some(&TicketId::Number(888)));
}

#[tokio::test]
async fn test_success_without_id() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket()
        .returning(|_, _, _| Ok(object(json!({ "raw": "accepted" }))));

    let creator = creator_with(enabled_config(), mock);
    let result = creator.call(&Feedback::new("No id"), None).await;

    assert!(result.is_success());
    assert!(result.ticket_id().is_none());
}

#[tokio::test]
async fn test_http_error_is_captured() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket()
        .returning(|_, _, _| Err(AppError::http(500, "Internal Server Error")));

    let creator = creator_with(enabled_config(), mock);
    let result = creator.call(&Feedback::new("Hello"), None).await;

    assert!(!result.is_success());
    assert!(result.response().is_none());
    match result.error() {
        Some(TicketFailure::Request(error)) => {
            assert_eq!(error.status(), Some(500));
            assert_eq!(error.to_string(), "HTTP 500");
        }
        other => panic!("expected request failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_app_id_is_captured() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket().times(0);

    let config = TdxConfig {
        app_id: None,
        ..enabled_config()
    };
    let creator = creator_with(config, mock);
    let result = creator.call(&Feedback::new("Hello"), None).await;

    assert!(!result.is_success());
    assert!(matches!(
        result.error(),
        Some(TicketFailure::Request(AppError::Configuration { .. }))
    ));
}

#[tokio::test]
async fn test_explicit_requestor_email_wins() {
    let mut mock = MockTdx::new();
    mock.expect_create_ticket()
        .withf(|_, payload, _| payload.get("RequestorEmail") == Some(&json!("user@example.com")))
        .returning(|_, _, _| Ok(object(json!({ "ID": 1 }))));

    let config = TdxConfig {
        default_requestor_email: Some("noreply@example.com".to_string()),
        ..enabled_config()
    };
    let creator = creator_with(config, mock);

    let result = creator.call(&Feedback::new("Hi"), Some("user@example.com")).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn test_extra_attributes_override_and_stringify_keys() {
    #[derive(Debug)]
    enum Field {
        Priority,
        Title,
    }

    impl fmt::Display for Field {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Field::Priority => f.write_str("priority"),
                Field::Title => f.write_str("Title"),
            }
        }
    }

    let mut mock = MockTdx::new();
    mock.expect_create_ticket()
        .withf(|_, payload, _| {
            payload.get("priority") == Some(&json!("High"))
                && payload.get("Title") == Some(&json!("Custom title"))
        })
        .returning(|_, _, _| Ok(object(json!({ "ID": 7 }))));

    let creator = creator_with(enabled_config(), mock);
    let result = creator
        .call_with_attributes(
            &Feedback::new("Hi"),
            None,
            vec![
                (Field::Priority, json!("High")),
                (Field::Title, json!("Custom title")),
            ],
        )
        .await;

    assert!(result.is_success());
}

#[tokio::test]
async fn test_post_comment_uses_feed() {
    let mut mock = MockTdx::new();
    mock.expect_post_feed()
        .withf(|app_id, ticket_id, payload| {
            app_id.to_string() == "46"
                && ticket_id.to_string() == "12345"
                && payload["Comments"] == json!("Follow-up")
        })
        .times(1)
        .returning(|_, _, _| Ok(object(json!({ "ID": 99 }))));

    let creator = creator_with(enabled_config(), mock);
    let response = creator
        .post_comment(&TicketId::Number(12345), "Follow-up")
        .await
        .unwrap();

    assert_eq!(response["ID"], 99);
}

#[tokio::test]
async fn test_post_comment_when_disabled() {
    let config = TdxConfig {
        enable_ticket_creation: false,
        ..enabled_config()
    };
    let creator = offline_creator(config);

    let error = creator
        .post_comment(&TicketId::Number(1), "ignored")
        .await
        .unwrap_err();
    assert!(matches!(error, AppError::Configuration { .. }));
}

#[test]
fn test_payload_always_sends_core_fields() {
    let creator = offline_creator(enabled_config());
    let payload = creator.build_payload(&Feedback::new("Hello"), None, BTreeMap::<String, Value>::new());

    assert_eq!(payload.get("TypeID"), Some(&json!(644)));
    assert_eq!(payload.get("StatusID"), Some(&json!(115)));
    assert_eq!(payload.get("SourceID"), Some(&json!(8)));
    assert_eq!(payload.get("ServiceID"), Some(&json!(2314)));
    assert_eq!(payload.get("ResponsibleGroupID"), Some(&json!(388)));
    assert_eq!(payload.get("Description"), Some(&json!("Hello")));
    assert_eq!(payload.get("IsRichHtml"), Some(&json!(false)));
    assert!(!payload.contains_key("RequestorEmail"));
}

#[test]
fn test_optional_ids_are_omitted_when_unset() {
    let creator = offline_creator(enabled_config());
    let payload = creator.build_payload(&Feedback::new("Hello"), None, BTreeMap::<String, Value>::new());

    assert!(!payload.contains_key("AccountID"));
    assert!(!payload.contains_key("FormID"));
    assert!(!payload.contains_key("ServiceOfferingID"));
}

#[test]
fn test_each_optional_id_appears_alone() {
    let cases: Vec<(&str, TdxConfig)> = vec![
        ("AccountID", TdxConfig { account_id: Some(11), ..enabled_config() }),
        ("FormID", TdxConfig { form_id: Some(11), ..enabled_config() }),
        ("ServiceOfferingID", TdxConfig { service_offering_id: Some(11), ..enabled_config() }),
    ];

    for (key, config) in cases {
        let creator = offline_creator(config);
        let payload = creator.build_payload(&Feedback::new("Hello"), None, BTreeMap::<String, Value>::new());

        for optional in ["AccountID", "FormID", "ServiceOfferingID"] {
            if optional == key {
                assert_eq!(payload.get(optional), Some(&json!(11)), "{} should be set", key);
            } else {
                assert!(!payload.contains_key(optional), "{} leaked while setting {}", optional, key);
            }
        }
    }
}

#[test]
fn test_default_requestor_email_is_used() {
    let config = TdxConfig {
        default_requestor_email: Some("noreply@example.com".to_string()),
        ..enabled_config()
    };
    let creator = offline_creator(config);
    let payload = creator.build_payload(&Feedback::new("Hello"), None, BTreeMap::<String, Value>::new());

    assert_eq!(payload.get("RequestorEmail"), Some(&json!("noreply@example.com")));
}

#[test]
fn test_title_replaces_newlines_and_truncates() {
    let creator = offline_creator(enabled_config());
    let message = format!("line one\nline two\r\n{}", "x".repeat(200));

    let title = creator.build_title(&message);
    let excerpt = title.strip_prefix("[Feedback] ").unwrap();

    assert!(!title.contains('\n'));
    assert!(!title.contains('\r'));
    assert_eq!(excerpt.chars().count(), 80);
    assert!(excerpt.starts_with("line one line two  x"));
}

#[test]
fn test_title_truncates_by_character_not_byte() {
    let creator = offline_creator(enabled_config());
    let message = "é".repeat(100);

    let title = creator.build_title(&message);
    let excerpt = title.strip_prefix("[Feedback] ").unwrap();

    assert_eq!(excerpt.chars().count(), 80);
}

#[test]
fn test_title_without_prefix_has_no_leading_space() {
    let config = TdxConfig {
        title_prefix: None,
        ..enabled_config()
    };
    let creator = offline_creator(config);

    assert_eq!(creator.build_title("Short message"), "Short message");
}

#[test]
fn test_title_with_custom_prefix() {
    let config = TdxConfig {
        title_prefix: Some("[App Feedback]".to_string()),
        ..enabled_config()
    };
    let creator = offline_creator(config);

    assert_eq!(creator.build_title("Short"), "[App Feedback] Short");
}

#[test]
fn test_description_without_context() {
    assert_eq!(build_description(&Feedback::new("Just the message")), "Just the message");
    assert_eq!(
        build_description(&Feedback::new("Blank context").with_context("   \n")),
        "Blank context"
    );
}

#[test]
fn test_description_with_context() {
    let feedback = Feedback::new("The button is broken").with_context("  Page: /settings  ");

    assert_eq!(
        build_description(&feedback),
        "The button is broken\n--- Context ---\n  Page: /settings  "
    );
}

#[test]
fn test_extract_ticket_id_variants() {
    assert_eq!(extract_ticket_id(&object(json!({ "ID": 5 }))), Some(TicketId::Number(5)));
    assert_eq!(
        extract_ticket_id(&object(json!({ "ID": "T-5" }))),
        Some(TicketId::Text("T-5".to_string()))
    );
    assert_eq!(
        extract_ticket_id(&object(json!({ "ID": null, "data": { "ID": 6 } }))),
        Some(TicketId::Number(6))
    );
    assert_eq!(extract_ticket_id(&object(json!({ "data": {} }))), None);
}

#[test]
fn test_extract_ticket_id_falls_back_past_unusable_top_level_id() {
    for top_level in [json!(1.5), json!(true), json!({ "nested": 1 }), json!("")] {
        assert_eq!(
            extract_ticket_id(&object(json!({ "ID": top_level.clone(), "data": { "ID": 888 } }))),
            Some(TicketId::Number(888)),
            "top-level ID {}",
            top_level
        );
    }
}
