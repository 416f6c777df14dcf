use super::request::{build_completion_request, AccessKeyScheme};
use super::response::extract_completion;
use crate::config::{keys, CompletionConfig, CompletionDefaults, CompletionOverrides, ConfigStore};
use crate::relay::RelayDispatcher;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds and sends chat-completion calls.
///
/// Linear per call: validate, resolve configuration, build, dispatch, parse. Nothing is
/// retried here; fallback is entirely the dispatcher's job.
pub struct CompletionClient {
    dispatcher: Arc<RelayDispatcher>,
    store: Arc<dyn ConfigStore>,
    base_url: String,
    scheme: AccessKeyScheme,
    defaults: CompletionDefaults,
}

impl CompletionClient {
    pub fn new(
        dispatcher: Arc<RelayDispatcher>,
        store: Arc<dyn ConfigStore>,
        base_url: impl Into<String>,
        scheme: AccessKeyScheme,
        defaults: CompletionDefaults,
    ) -> Self {
        Self {
            dispatcher,
            store,
            base_url: base_url.into(),
            scheme,
            defaults,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scheme(&self) -> &AccessKeyScheme {
        &self.scheme
    }

    pub fn defaults(&self) -> &CompletionDefaults {
        &self.defaults
    }

    /// Resolve settings from the store, letting `overrides` win, then complete.
    pub async fn complete_with_stored_config(
        &self,
        user_msg: &str,
        system_msg: Option<&str>,
        overrides: &CompletionOverrides,
    ) -> Result<String> {
        let config = self.resolve_stored(user_msg, overrides).await?;
        self.send(&config, user_msg, system_msg, None).await
    }

    /// Complete with a configuration the caller assembled; the store is not consulted.
    pub async fn complete_with_explicit_config(
        &self,
        config: &CompletionConfig,
        user_msg: &str,
        system_msg: Option<&str>,
    ) -> Result<String> {
        require_user_msg(user_msg)?;
        self.send(config, user_msg, system_msg, None).await
    }

    /// [`complete_with_explicit_config`](Self::complete_with_explicit_config) that stops
    /// the relay chain when `cancel` fires.
    pub async fn complete_with_cancel(
        &self,
        config: &CompletionConfig,
        user_msg: &str,
        system_msg: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        require_user_msg(user_msg)?;
        self.send(config, user_msg, system_msg, Some(cancel)).await
    }

    /// Merge overrides over stored settings and built-in defaults.
    pub async fn resolve_stored(
        &self,
        user_msg: &str,
        overrides: &CompletionOverrides,
    ) -> Result<CompletionConfig> {
        require_user_msg(user_msg)?;
        let stored = self.store.get(keys::COMPLETION).await?;
        CompletionConfig::resolve(overrides, &stored, &self.defaults)
    }

    async fn send(
        &self,
        config: &CompletionConfig,
        user_msg: &str,
        system_msg: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let request =
            build_completion_request(&self.base_url, &self.scheme, config, user_msg, system_msg)?;

        let start = Instant::now();
        let resp = match cancel {
            Some(token) => self.dispatcher.dispatch_with_cancel(&request, token).await?,
            None => self.dispatcher.dispatch(&request).await?,
        };
        info!(
            knowledge_model_id = config.knowledge_model_id(),
            extension = config.extension(),
            model = config.model_alias(),
            http_status = resp.status,
            duration_ms = start.elapsed().as_millis(),
            "completion response received"
        );

        extract_completion(&resp.body)
    }
}

fn require_user_msg(user_msg: &str) -> Result<()> {
    if user_msg.trim().is_empty() {
        return Err(Error::missing_field("userMsg"));
    }
    Ok(())
}
