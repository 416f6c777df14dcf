use crate::completion::{AccessKeyScheme, CompletionClient, DEFAULT_BASE_URL};
use crate::config::{CompletionDefaults, ConfigStore, EnvConfigStore};
use crate::functions::FunctionTable;
use crate::logging::{LogSink, TracingLogSink};
use crate::probe::DEFAULT_ALIVE_URL;
use crate::relay::{RelayCandidate, RelayDispatcher};
use crate::runtime::core::AddinRuntime;
use crate::transport::{HttpSender, HttpTransport};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Builder for [`AddinRuntime`].
///
/// Unset pieces fall back to env-driven defaults:
/// - `KMAPI_BASE_URL`: provider base URL
/// - `KMAPI_ACCESS_KEY_SCHEME`: `bearer` (default) or `raw`
/// - `KMAPI_ATTEMPT_TIMEOUT_MS`: per-candidate timeout, `0` disables it (default 20000)
/// - `KMAPI_LOCAL_PROXY_URL`: append a self-hosted envelope relay to the chain
pub struct AddinRuntimeBuilder {
    candidates: Option<Vec<RelayCandidate>>,
    local_proxy: Option<String>,
    sender: Option<Arc<dyn HttpSender>>,
    store: Option<Arc<dyn ConfigStore>>,
    log: Arc<dyn LogSink>,
    base_url: Option<String>,
    scheme: Option<AccessKeyScheme>,
    defaults: CompletionDefaults,
    attempt_timeout: Option<Duration>,
    alive_url: String,
}

impl AddinRuntimeBuilder {
    pub fn new() -> Self {
        let attempt_timeout = match std::env::var("KMAPI_ATTEMPT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => Some(DEFAULT_ATTEMPT_TIMEOUT),
        };

        Self {
            candidates: None,
            local_proxy: std::env::var("KMAPI_LOCAL_PROXY_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            sender: None,
            store: None,
            log: Arc::new(TracingLogSink),
            base_url: None,
            scheme: None,
            defaults: CompletionDefaults::default(),
            attempt_timeout,
            alive_url: DEFAULT_ALIVE_URL.to_string(),
        }
    }

    /// Replace the built-in relay chain. Order is trial order.
    pub fn candidates(mut self, candidates: Vec<RelayCandidate>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Append a self-hosted envelope relay (e.g. `http://localhost:8000/proxy`) after the chain.
    pub fn local_proxy(mut self, endpoint: impl Into<String>) -> Self {
        self.local_proxy = Some(endpoint.into());
        self
    }

    /// Inject the HTTP sender. Default is [`HttpTransport::new`].
    pub fn sender(mut self, sender: Arc<dyn HttpSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Settings store consulted by stored-config completions. Default is [`EnvConfigStore`].
    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Inject a log sink. Default forwards to `tracing`.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log = sink;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn access_key_scheme(mut self, scheme: AccessKeyScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn defaults(mut self, defaults: CompletionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn no_attempt_timeout(mut self) -> Self {
        self.attempt_timeout = None;
        self
    }

    pub fn alive_url(mut self, url: impl Into<String>) -> Self {
        self.alive_url = url.into();
        self
    }

    pub fn build(self) -> Result<AddinRuntime> {
        let functions = FunctionTable::builtin();
        functions.validate()?;

        let mut candidates = self.candidates.unwrap_or_else(RelayCandidate::default_chain);
        if let Some(endpoint) = self.local_proxy {
            candidates.push(RelayCandidate::envelope("local-proxy", endpoint));
        }

        let sender: Arc<dyn HttpSender> = match self.sender {
            Some(s) => s,
            None => Arc::new(HttpTransport::new()?),
        };

        let scheme = match self.scheme {
            Some(s) => s,
            None => match std::env::var("KMAPI_ACCESS_KEY_SCHEME") {
                Ok(name) => AccessKeyScheme::from_name(&name).ok_or_else(|| {
                    Error::configuration_with_context(
                        "unknown access key scheme",
                        ErrorContext::new()
                            .with_field_path("KMAPI_ACCESS_KEY_SCHEME")
                            .with_details(format!("got '{}', expected 'bearer' or 'raw'", name))
                            .with_source("runtime_builder"),
                    )
                })?,
                Err(_) => AccessKeyScheme::default(),
            },
        };

        let base_url = self
            .base_url
            .or_else(|| std::env::var("KMAPI_BASE_URL").ok())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let dispatcher = Arc::new(
            RelayDispatcher::new(candidates, sender, self.log)?
                .with_attempt_timeout(self.attempt_timeout),
        );

        let store: Arc<dyn ConfigStore> = self
            .store
            .unwrap_or_else(|| Arc::new(EnvConfigStore::new()));

        let completion = CompletionClient::new(
            dispatcher.clone(),
            store,
            base_url,
            scheme,
            self.defaults,
        );

        Ok(AddinRuntime {
            dispatcher,
            completion,
            functions,
            alive_url: self.alive_url,
        })
    }
}

impl Default for AddinRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
