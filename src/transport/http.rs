use super::{HttpSender, TransportError};
use crate::types::{RawResponse, RequestSpec};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Method, Proxy};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// `reqwest`-backed sender used for every relay attempt.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout_secs = env::var("KMAPI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("KMAPI_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("KMAPI_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Client-side timeouts surface as [`TransportError::Timeout`] like attempt timeouts do.
    fn classify(&self, e: reqwest::Error) -> TransportError {
        let err = TransportError::Http(e);
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            err
        }
    }
}

#[async_trait]
impl HttpSender for HttpTransport {
    async fn send(&self, request: &RequestSpec) -> std::result::Result<RawResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(request.method.clone()))?;

        let mut req = self.client.request(method, &request.url);
        for (k, v) in &request.headers {
            req = req.header(k, v);
        }
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let resp = req.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status().as_u16();
        let headers: HashMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.text().await.map_err(|e| self.classify(e))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
