//! Relay fallback over real HTTP

use super::mock_server::MockServerFixture;
use kmapi_relay::logging::MemoryLogSink;
use kmapi_relay::relay::{MethodSupport, RelayCandidate};
use kmapi_relay::Error;
use mockito::Matcher;
use std::sync::Arc;

#[tokio::test]
async fn test_direct_success() {
    let target = MockServerFixture::new().await;
    let page = target.mock_text("GET", "/page", 200, "hello world").await;

    let log = Arc::new(MemoryLogSink::default());
    let rt = target.runtime(vec![RelayCandidate::direct()], log.clone());

    let text = rt.fetch_text(&format!("{}/page", target.base_url)).await.unwrap();
    assert_eq!(text, "hello world");
    page.assert_async().await;
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_falls_back_to_encoded_relay() {
    let target = MockServerFixture::new().await;
    let relay = MockServerFixture::new().await;
    let url = format!("{}/page", target.base_url);

    let direct = target.mock_text("GET", "/page", 502, "bad gateway").await;
    let relayed = relay.mock_query_relay(&url, 200, "relayed text").await;

    let log = Arc::new(MemoryLogSink::default());
    let rt = target.runtime(
        vec![
            RelayCandidate::direct(),
            RelayCandidate::encoded("query-relay", format!("{}/fetch?url=", relay.base_url)),
        ],
        log.clone(),
    );

    assert_eq!(rt.fetch_text(&url).await.unwrap(), "relayed text");
    direct.assert_async().await;
    relayed.assert_async().await;

    let lines = log.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("HTTP 502"));
    assert!(lines[1].starts_with("relay[1] query-relay"));
}

#[tokio::test]
async fn test_read_only_relay_never_sees_post() {
    let target = MockServerFixture::new().await;
    let relay = MockServerFixture::new().await;

    let api = target
        .mock_json_response(
            "/knowledge-models/km1/chat/completions/direct_llm",
            500,
            r#"{"error":"upstream"}"#,
        )
        .await;
    let never = {
        let mut server = relay.server.lock().await;
        server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await
    };

    let log = Arc::new(MemoryLogSink::default());
    let rt = target.runtime(
        vec![
            RelayCandidate::direct(),
            RelayCandidate::encoded("read-only", format!("{}/raw?url=", relay.base_url))
                .with_methods(MethodSupport::ReadOnly),
        ],
        log.clone(),
    );

    let err = rt
        .complete_with_explicit_config("km1", "k", "hi", None, None, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AllRelaysExhausted {
            attempts: 1,
            last_status: Some(500),
            ..
        }
    ));
    api.assert_async().await;
    never.assert_async().await;
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_unreachable_relay_is_a_transport_failure() {
    let target = MockServerFixture::new().await;
    let page = target.mock_text("GET", "/page", 200, "finally").await;

    let log = Arc::new(MemoryLogSink::default());
    let rt = target.runtime(
        vec![
            RelayCandidate::prefixed("dead", "http://127.0.0.1:9/"),
            RelayCandidate::direct(),
        ],
        log.clone(),
    );

    let text = rt.fetch_text(&format!("{}/page", target.base_url)).await.unwrap();
    assert_eq!(text, "finally");
    page.assert_async().await;
    assert!(log.lines()[0].contains("failed"));
}

#[tokio::test]
async fn test_client_timeout_is_logged_as_timeout() {
    use kmapi_relay::relay::RelayDispatcher;
    use kmapi_relay::transport::HttpTransport;
    use kmapi_relay::types::RequestSpec;
    use std::time::Duration;

    // Accepts connections and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let transport = HttpTransport::with_timeout(Duration::from_millis(200)).unwrap();
    assert_eq!(transport.timeout(), Duration::from_millis(200));
    let log = Arc::new(MemoryLogSink::default());
    let dispatcher =
        RelayDispatcher::new(vec![RelayCandidate::direct()], Arc::new(transport), log.clone()).unwrap();

    let err = dispatcher
        .dispatch(&RequestSpec::get(format!("http://{}/slow", addr)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AllRelaysExhausted { attempts: 1, last_status: None, .. }));
    assert!(log.lines()[0].contains("timed out after 200ms"));

    silent.abort();
}
