use crate::completion::CompletionClient;
use crate::config::{CompletionConfig, CompletionOverrides};
use crate::functions::FunctionTable;
use crate::probe::{probe_connectivity, ProbeReport};
use crate::relay::RelayDispatcher;
use crate::types::RequestSpec;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the host-callable functions need, wired once at startup.
pub struct AddinRuntime {
    pub(crate) dispatcher: Arc<RelayDispatcher>,
    pub(crate) completion: CompletionClient,
    pub(crate) functions: FunctionTable,
    pub(crate) alive_url: String,
}

impl AddinRuntime {
    pub fn builder() -> crate::runtime::builder::AddinRuntimeBuilder {
        crate::runtime::builder::AddinRuntimeBuilder::new()
    }

    pub fn dispatcher(&self) -> &RelayDispatcher {
        &self.dispatcher
    }

    pub fn completion(&self) -> &CompletionClient {
        &self.completion
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// GET `url` through the relay chain and return the body text.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let spec = Self::fetch_spec(url)?;
        Ok(self.dispatcher.dispatch(&spec).await?.body)
    }

    pub async fn fetch_text_with_cancel(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let spec = Self::fetch_spec(url)?;
        Ok(self.dispatcher.dispatch_with_cancel(&spec, cancel).await?.body)
    }

    fn fetch_spec(url: &str) -> Result<RequestSpec> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::missing_field("url"));
        }
        let parsed = url::Url::parse(url).map_err(|e| {
            Error::invalid_parameter_with_context(
                "url is not a valid absolute URL",
                ErrorContext::new()
                    .with_field_path("url")
                    .with_details(e.to_string())
                    .with_source("fetch_text"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::invalid_parameter_with_context(
                "only http and https URLs can be fetched",
                ErrorContext::new()
                    .with_field_path("url")
                    .with_details(format!("scheme '{}'", parsed.scheme()))
                    .with_source("fetch_text"),
            ));
        }
        Ok(RequestSpec::get(url))
    }

    /// Complete using stored settings; `model` and `extension` override them for this call.
    pub async fn complete_with_stored_config(
        &self,
        user_msg: &str,
        system_msg: Option<&str>,
        model: Option<&str>,
        extension: Option<&str>,
    ) -> Result<String> {
        let overrides = CompletionOverrides {
            model_alias: model.map(str::to_string),
            extension: extension.map(str::to_string),
            ..Default::default()
        };
        self.completion
            .complete_with_stored_config(user_msg, system_msg, &overrides)
            .await
    }

    /// Complete with caller-supplied credentials. Unset optional values take the built-in
    /// defaults; the settings store is not read.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_with_explicit_config(
        &self,
        knowledge_model_id: &str,
        api_key: &str,
        user_msg: &str,
        system_msg: Option<&str>,
        model: Option<&str>,
        extension: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f64>,
    ) -> Result<String> {
        if user_msg.trim().is_empty() {
            return Err(Error::missing_field("userMsg"));
        }
        let overrides = CompletionOverrides {
            knowledge_model_id: Some(knowledge_model_id.to_string()),
            api_key: Some(api_key.to_string()),
            extension: extension.map(str::to_string),
            model_alias: model.map(str::to_string),
            max_tokens,
            temperature,
        };
        let config =
            CompletionConfig::resolve(&overrides, &HashMap::new(), self.completion.defaults())?;
        self.completion
            .complete_with_explicit_config(&config, user_msg, system_msg)
            .await
    }

    pub async fn probe_connectivity(&self) -> ProbeReport {
        probe_connectivity(&self.dispatcher, &self.alive_url).await
    }

    /// Invoke a host-visible function by name with positional arguments.
    pub async fn call(&self, name: &str, args: &[Option<String>]) -> Result<String> {
        self.functions.invoke(self, name, args).await
    }
}
