//! Mock HTTP server setup for integration tests

use kmapi_relay::logging::MemoryLogSink;
use kmapi_relay::relay::RelayCandidate;
use kmapi_relay::transport::HttpTransport;
use kmapi_relay::AddinRuntime;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Runtime whose chain is `candidates`, talking over real HTTP.
    pub fn runtime(&self, candidates: Vec<RelayCandidate>, log: Arc<MemoryLogSink>) -> AddinRuntime {
        let transport = HttpTransport::with_timeout(Duration::from_secs(5)).unwrap();
        AddinRuntime::builder()
            .candidates(candidates)
            .sender(Arc::new(transport))
            .log_sink(log)
            .base_url(&self.base_url)
            .alive_url(format!("{}/alive", self.base_url))
            .attempt_timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    /// Create a mock returning `body` with `status` for `method` on `path`
    pub async fn mock_text(&self, method: &str, path: &str, status: usize, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "text/plain")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for a JSON response to a POST
    pub async fn mock_json_response(&self, path: &str, status: usize, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Relay endpoint taking the target as a url-encoded `url` query parameter
    pub async fn mock_query_relay(&self, target: &str, status: usize, body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("GET", Matcher::Regex(r"^/fetch".to_string()))
            .match_query(Matcher::UrlEncoded("url".into(), target.into()))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }
}
