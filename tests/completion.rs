mod common;

use common::{Outcome, ScriptedSender, RELAY_A};
use kmapi_relay::config::{keys, InMemoryConfigStore};
use kmapi_relay::logging::MemoryLogSink;
use kmapi_relay::relay::RelayCandidate;
use kmapi_relay::{AccessKeyScheme, AddinRuntime, Error};
use std::sync::Arc;

const BASE: &str = "https://km.test/v1";
const OK_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"Paris"}}]}"#;

fn runtime(sender: Arc<ScriptedSender>, store: InMemoryConfigStore) -> (AddinRuntime, Arc<MemoryLogSink>) {
    let log = Arc::new(MemoryLogSink::default());
    let rt = AddinRuntime::builder()
        .candidates(vec![
            RelayCandidate::direct(),
            RelayCandidate::encoded("relay-a", RELAY_A),
        ])
        .sender(sender)
        .config_store(Arc::new(store))
        .log_sink(log.clone())
        .base_url(BASE)
        .access_key_scheme(AccessKeyScheme::bearer())
        .no_attempt_timeout()
        .build()
        .unwrap();
    (rt, log)
}

#[tokio::test]
async fn test_explicit_config_issues_exactly_one_post() {
    let sender = Arc::new(ScriptedSender::new().on(BASE, Outcome::Status(200, OK_BODY.into())));
    let (rt, log) = runtime(sender.clone(), InMemoryConfigStore::new());

    let answer = rt
        .complete_with_explicit_config("km1", "k", "Capital of France?", None, Some("m"), None, Some(10), Some(0.5))
        .await
        .unwrap();
    assert_eq!(answer, "Paris");

    let calls = sender.calls();
    assert_eq!(calls.len(), 1);
    let req = &calls[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.url, "https://km.test/v1/knowledge-models/km1/chat/completions/direct_llm");
    assert_eq!(req.headers["X-KM-AccessKey"], "Bearer k");
    assert_eq!(req.headers["Content-Type"], "application/json");
    assert_eq!(
        req.body.as_deref(),
        Some(
            r#"{"model":"m","messages":[{"role":"user","content":[{"type":"text","text":"Capital of France?"}]}],"response_format":{"type":"text","json_schema":{}},"temperature":0.5,"max_completion_tokens":10,"top_p":1,"frequency_penalty":0,"presence_penalty":0}"#
        )
    );
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_explicit_config_ignores_stored_values() {
    let sender = Arc::new(ScriptedSender::new().on(BASE, Outcome::Status(200, OK_BODY.into())));
    let store = InMemoryConfigStore::with_values([(keys::MODEL_ALIAS, "stored-model"), (keys::MAX_TOKENS, "5")]);
    let (rt, _) = runtime(sender.clone(), store);

    rt.complete_with_explicit_config("km1", "k", "hi", None, None, None, None, None)
        .await
        .unwrap();

    let body: serde_json::Value = serde_json::from_str(sender.calls()[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["model"], "gpt-4.1-mini");
    assert_eq!(body["max_completion_tokens"], 1000);
    assert_eq!(body["temperature"], 0.7);
}

#[tokio::test]
async fn test_stored_config_with_per_call_overrides() {
    let sender = Arc::new(ScriptedSender::new().on(BASE, Outcome::Status(200, OK_BODY.into())));
    let store = InMemoryConfigStore::with_values([
        (keys::KNOWLEDGE_MODEL_ID, "km-stored"),
        (keys::API_KEY, "secret"),
        (keys::MODEL_ALIAS, "stored-model"),
        (keys::TEMPERATURE, "0.2"),
    ]);
    let (rt, _) = runtime(sender.clone(), store);

    let answer = rt
        .complete_with_stored_config("hi", Some("be brief"), None, Some("rag"))
        .await
        .unwrap();
    assert_eq!(answer, "Paris");

    let req = &sender.calls()[0];
    assert_eq!(req.url, "https://km.test/v1/knowledge-models/km-stored/chat/completions/rag");
    assert_eq!(req.headers["X-KM-AccessKey"], "Bearer secret");
    let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["model"], "stored-model");
    assert_eq!(body["temperature"], 0.2);
    assert_eq!(body["messages"][0]["role"], "system");
}

#[tokio::test]
async fn test_missing_credentials_send_nothing() {
    let sender = Arc::new(ScriptedSender::new().on(BASE, Outcome::Status(200, OK_BODY.into())));
    let (rt, log) = runtime(sender.clone(), InMemoryConfigStore::new());

    let err = rt.complete_with_stored_config("hi", None, None, None).await.unwrap_err();
    match err {
        Error::MissingConfiguration { ref missing, .. } => {
            assert_eq!(missing, &vec![keys::KNOWLEDGE_MODEL_ID.to_string(), keys::API_KEY.to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Knowledge Model ID"));

    let err = rt
        .complete_with_explicit_config("", "k", "hi", None, None, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingConfiguration { .. }));

    assert_eq!(sender.call_count(), 0);
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_empty_user_message_is_rejected_before_config() {
    let sender = Arc::new(ScriptedSender::new());
    let (rt, _) = runtime(sender.clone(), InMemoryConfigStore::new());

    let err = rt.complete_with_stored_config("   ", None, None, None).await.unwrap_err();
    assert!(matches!(err, Error::MissingRequiredField { ref field } if field == "userMsg"));
    assert_eq!(sender.call_count(), 0);
}

#[tokio::test]
async fn test_empty_choices_is_malformed() {
    let sender = Arc::new(ScriptedSender::new().on(BASE, Outcome::Status(200, r#"{"choices":[]}"#.into())));
    let (rt, _) = runtime(sender, InMemoryConfigStore::new());

    let err = rt
        .complete_with_explicit_config("km1", "k", "hi", None, None, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedProviderResponse { .. }));
    assert!(err.to_string().contains(r#"{"choices":[]}"#));
}

#[tokio::test]
async fn test_completion_falls_back_through_relays() {
    let sender = Arc::new(
        ScriptedSender::new()
            .on(BASE, Outcome::Fail("blocked".into()))
            .on(RELAY_A, Outcome::Status(200, OK_BODY.into())),
    );
    let (rt, log) = runtime(sender.clone(), InMemoryConfigStore::new());

    let answer = rt
        .complete_with_explicit_config("km1", "k", "hi", None, None, None, None, None)
        .await
        .unwrap();
    assert_eq!(answer, "Paris");
    assert_eq!(sender.call_count(), 2);
    assert_eq!(sender.calls()[1].method, "POST");
    assert_eq!(log.len(), 2);
}

#[tokio::test]
async fn test_provider_errors_exhaust_the_chain() {
    let sender = Arc::new(
        ScriptedSender::new()
            .on(BASE, Outcome::Status(401, r#"{"error":"bad key"}"#.into()))
            .on(RELAY_A, Outcome::Status(401, r#"{"error":"bad key"}"#.into())),
    );
    let (rt, _) = runtime(sender, InMemoryConfigStore::new());

    let err = rt
        .complete_with_explicit_config("km1", "k", "hi", None, None, None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AllRelaysExhausted {
            attempts: 2,
            last_status: Some(401),
            ..
        }
    ));
}

#[tokio::test]
async fn test_function_table_dispatch() {
    let sender = Arc::new(
        ScriptedSender::new()
            .on("https://example.test/", Outcome::Status(200, "hello".into()))
            .on(BASE, Outcome::Status(200, OK_BODY.into())),
    );
    let (rt, _) = runtime(sender.clone(), InMemoryConfigStore::new());

    let text = rt
        .call("TESTGET", &[Some("https://example.test/page".into())])
        .await
        .unwrap();
    assert_eq!(text, "hello");

    let answer = rt
        .call(
            "completeWithConfig",
            &[
                Some("km1".into()),
                Some("k".into()),
                Some("hi".into()),
                None,
                Some("".into()),
                None,
                Some("25".into()),
            ],
        )
        .await
        .unwrap();
    assert_eq!(answer, "Paris");
    let body: serde_json::Value = serde_json::from_str(sender.calls()[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["max_completion_tokens"], 25);
    assert_eq!(body["model"], "gpt-4.1-mini");
}

#[tokio::test]
async fn test_function_table_argument_errors() {
    let sender = Arc::new(ScriptedSender::new());
    let (rt, _) = runtime(sender.clone(), InMemoryConfigStore::new());

    assert!(matches!(
        rt.call("NOSUCH", &[]).await,
        Err(Error::UnknownFunction { .. })
    ));
    assert!(matches!(
        rt.call("FETCHTEXT", &[Some(" ".into())]).await,
        Err(Error::MissingRequiredField { ref field }) if field == "url"
    ));
    assert!(matches!(
        rt.call("FETCHTEXT", &[Some("a".into()), Some("b".into())]).await,
        Err(Error::InvalidParameter { .. })
    ));
    assert!(matches!(
        rt.call("FETCHTEXT", &[Some("ftp://example.test/file".into())]).await,
        Err(Error::InvalidParameter { .. })
    ));
    assert!(matches!(
        rt.call(
            "COMPLETEWITHCONFIG",
            &[Some("km1".into()), Some("k".into()), Some("hi".into()), None, None, None, Some("lots".into())]
        )
        .await,
        Err(Error::InvalidParameter { .. })
    ));
    assert_eq!(sender.call_count(), 0);
}

#[tokio::test]
async fn test_probe_counts_unauthorized_as_reachable() {
    let sender = Arc::new(ScriptedSender::new().on("https://km.test/alive", Outcome::Status(401, "no key".into())));
    let log = Arc::new(MemoryLogSink::default());
    let rt = AddinRuntime::builder()
        .candidates(vec![RelayCandidate::direct()])
        .sender(sender)
        .log_sink(log)
        .alive_url("https://km.test/alive")
        .build()
        .unwrap();

    let report = rt.probe_connectivity().await;
    assert!(report.reachable);
    assert_eq!(report.status, Some(401));
}

#[tokio::test]
async fn test_function_table_keeps_message_text_verbatim() {
    let sender = Arc::new(ScriptedSender::new().on(BASE, Outcome::Status(200, OK_BODY.into())));
    let store = InMemoryConfigStore::with_values([(keys::KNOWLEDGE_MODEL_ID, "km1"), (keys::API_KEY, "k")]);
    let (rt, _) = runtime(sender.clone(), store);

    let user = "  - item one\n  - item two\n";
    let system = "\tList only.\n";

    rt.call(
        "COMPLETEWITHCONFIG",
        &[Some(" km1 ".into()), Some("k".into()), Some(user.into()), Some(system.into())],
    )
    .await
    .unwrap();
    rt.call("COMPLETE", &[Some(user.into()), Some(system.into()), Some(" m ".into())])
        .await
        .unwrap();

    let calls = sender.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        assert_eq!(call.url, "https://km.test/v1/knowledge-models/km1/chat/completions/direct_llm");
        let body: serde_json::Value = serde_json::from_str(call.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["messages"][0]["content"][0]["text"], system);
        assert_eq!(body["messages"][1]["content"][0]["text"], user);
    }
    let second: serde_json::Value = serde_json::from_str(calls[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(second["model"], "m");
}

#[tokio::test]
async fn test_cancelled_completion_stops_the_chain() {
    use kmapi_relay::CompletionConfig;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    let sender = Arc::new(
        ScriptedSender::new()
            .on(BASE, Outcome::Hang)
            .on(RELAY_A, Outcome::Status(200, OK_BODY.into())),
    );
    let (rt, _) = runtime(sender.clone(), InMemoryConfigStore::new());
    let config = CompletionConfig::new("km1", "k", "direct_llm", "m", 10, 0.5).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = rt
        .completion()
        .complete_with_cancel(&config, "hi", None, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(sender.call_count(), 1);

    let err = rt
        .completion()
        .complete_with_cancel(&config, " ", None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingRequiredField { .. }));
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn test_fetch_text_with_cancel() {
    use tokio_util::sync::CancellationToken;

    let sender = Arc::new(ScriptedSender::new().on("https://example.test/", Outcome::Status(200, "hello".into())));
    let (rt, log) = runtime(sender.clone(), InMemoryConfigStore::new());

    let live = CancellationToken::new();
    let text = rt
        .fetch_text_with_cancel("https://example.test/page", &live)
        .await
        .unwrap();
    assert_eq!(text, "hello");

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = rt
        .fetch_text_with_cancel("https://example.test/page", &cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(sender.call_count(), 1);
    assert_eq!(log.len(), 1);
}
