use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use time_cop::errors::ExtractionError;
use time_cop::extraction::{ActivityExtractor, GeminiClient, GeminiConfig};
use time_cop::models::Category;
use time_cop::retry::RetryPolicy;

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        GeminiConfig::new("test-key")
            .with_api_url(server.uri())
            .with_retry(fast_retry()),
    )
    .unwrap()
}

/// Wrap model output the way the endpoint returns it
fn model_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

const TWO_ACTIVITIES: &str = r#"```json
{
  "actividades": [
    {"descripcion": "Reunión de planificación semanal", "proyecto": "General", "categoria": "otrosNoFacturable", "horas_estimadas": 2},
    {"descripcion": "Revisión de pull requests", "proyecto": "Alpha", "categoria": "proyectoFacturable", "horas_estimadas": 1.5}
  ]
}
```"#;

#[tokio::test]
async fn test_extracts_fenced_activities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(TWO_ACTIVITIES)))
        .expect(1)
        .mount(&server)
        .await;

    let activities = client_for(&server)
        .extract("Hoy tuve planning 2h y revisé PRs de Alpha 1.5h")
        .await
        .unwrap();

    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0].project, "General");
    assert_eq!(activities[0].category, Category::OtherNonBillable);
    assert_eq!(activities[1].hours, 1.5);
    assert_eq!(activities[1].category, Category::BillableProject);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "internal", "status": "INTERNAL" }
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(TWO_ACTIVITIES)))
        .mount(&server)
        .await;

    let activities = client_for(&server).extract("planning 2h, PRs 1.5h").await.unwrap();

    assert_eq!(activities.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_last_error_propagates_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The model is overloaded", "status": "UNAVAILABLE" }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let result = client_for(&server).extract("planning 2h").await;

    match result {
        Err(ExtractionError::Api { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "The model is overloaded");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_candidates_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .expect(3)
        .mount(&server)
        .await;

    let result = client_for(&server).extract("planning 2h").await;

    assert_eq!(result, Err(ExtractionError::EmptyResponse));
}

#[tokio::test]
async fn test_malformed_json_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply("{\"actividades\": [")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(TWO_ACTIVITIES)))
        .mount(&server)
        .await;

    let activities = client_for(&server).extract("planning 2h, PRs 1.5h").await.unwrap();

    assert_eq!(activities.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_persistent_malformed_json_exhausts_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply("no json here")))
        .expect(3)
        .mount(&server)
        .await;

    let result = client_for(&server).extract("planning 2h").await;

    assert!(matches!(result, Err(ExtractionError::InvalidJson(_))));
}

#[tokio::test]
async fn test_hours_rounding_to_zero_fail_validation() {
    let server = MockServer::start().await;
    let text = r#"{"actividades": [{"descripcion": "Ping", "proyecto": "Ops", "categoria": "otrosNoFacturable", "horas_estimadas": 0.004}]}"#;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(text)))
        .expect(3)
        .mount(&server)
        .await;

    let result = client_for(&server).extract("ping").await;

    assert!(matches!(result, Err(ExtractionError::Validation(_))));
}

#[tokio::test]
async fn test_out_of_range_hours_fail_validation() {
    let server = MockServer::start().await;
    let text = r#"{"actividades": [{"descripcion": "Maratón", "proyecto": "Alpha", "categoria": "proyectoFacturable", "horas_estimadas": 30}]}"#;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(text)))
        .expect(3)
        .mount(&server)
        .await;

    let result = client_for(&server).extract("maratón de código").await;

    assert!(matches!(result, Err(ExtractionError::Validation(_))));
}

#[tokio::test]
async fn test_unknown_category_fails_validation() {
    let server = MockServer::start().await;
    let text = r#"{"actividades": [{"descripcion": "Almuerzo", "proyecto": "General", "categoria": "personal", "horas_estimadas": 1}]}"#;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(text)))
        .mount(&server)
        .await;

    let result = client_for(&server).extract("almuerzo 1h").await;

    assert!(matches!(result, Err(ExtractionError::Validation(_))));
}

#[tokio::test]
async fn test_custom_model_changes_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_reply(TWO_ACTIVITIES)))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new(
        GeminiConfig::new("test-key")
            .with_model("gemini-2.0-pro")
            .with_api_url(server.uri())
            .with_retry(fast_retry()),
    )
    .unwrap();

    assert_eq!(client.extract("planning 2h").await.unwrap().len(), 2);
}
