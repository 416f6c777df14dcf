//! Completion and probe calls over real HTTP

use super::mock_server::MockServerFixture;
use kmapi_relay::logging::MemoryLogSink;
use kmapi_relay::relay::RelayCandidate;
use kmapi_relay::Error;
use mockito::Matcher;
use std::sync::Arc;

#[tokio::test]
async fn test_completion_request_on_the_wire() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("POST", "/knowledge-models/km1/chat/completions/direct_llm")
            .match_header("x-km-accesskey", "Bearer k")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJsonString(
                r#"{"model":"m","max_completion_tokens":10,"temperature":0.5,"top_p":1}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#)
            .expect(1)
            .create_async()
            .await
    };

    let rt = fixture.runtime(vec![RelayCandidate::direct()], Arc::new(MemoryLogSink::default()));
    let answer = rt
        .complete_with_explicit_config("km1", "k", "meaning of life?", None, Some("m"), None, Some(10), Some(0.5))
        .await
        .unwrap();
    assert_eq!(answer, "42");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_completion_keeps_raw_body() {
    let fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json_response(
            "/knowledge-models/km1/chat/completions/direct_llm",
            200,
            r#"{"unexpected":true}"#,
        )
        .await;

    let rt = fixture.runtime(vec![RelayCandidate::direct()], Arc::new(MemoryLogSink::default()));
    let err = rt
        .complete_with_explicit_config("km1", "k", "hi", None, None, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedProviderResponse { .. }));
    assert!(err.to_string().contains(r#"{"unexpected":true}"#));
}

#[tokio::test]
async fn test_probe_reports_alive_endpoint() {
    let fixture = MockServerFixture::new().await;
    let _alive = fixture.mock_text("GET", "/alive", 200, "ok").await;

    let rt = fixture.runtime(vec![RelayCandidate::direct()], Arc::new(MemoryLogSink::default()));
    let report = rt.probe_connectivity().await;
    assert!(report.reachable);
    assert_eq!(report.status, Some(200));
    assert_eq!(report.response.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_probe_unreachable_on_server_error() {
    let fixture = MockServerFixture::new().await;
    let _alive = fixture.mock_text("GET", "/alive", 503, "down").await;

    let rt = fixture.runtime(vec![RelayCandidate::direct()], Arc::new(MemoryLogSink::default()));
    let report = rt.probe_connectivity().await;
    assert!(!report.reachable);
    assert_eq!(report.status, Some(503));
}
