//! Completion parameter resolution: overrides, stored settings, built-in defaults.

use super::keys;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_EXTENSION: &str = "direct_llm";
pub const DEFAULT_MODEL_ALIAS: &str = "gpt-4.1-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Fallbacks for the optional completion settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionDefaults {
    pub extension: String,
    pub model_alias: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for CompletionDefaults {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            model_alias: DEFAULT_MODEL_ALIAS.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Caller-supplied values; each one beats whatever the store holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOverrides {
    pub knowledge_model_id: Option<String>,
    pub api_key: Option<String>,
    pub extension: Option<String>,
    pub model_alias: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl CompletionOverrides {
    pub fn knowledge_model_id(mut self, id: impl Into<String>) -> Self {
        self.knowledge_model_id = Some(id.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn model_alias(mut self, model: impl Into<String>) -> Self {
        self.model_alias = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Fully resolved, validated parameters for one completion call.
///
/// Only obtainable through [`CompletionConfig::new`] or [`CompletionConfig::resolve`],
/// both of which reject missing credentials and out-of-range values.
#[derive(Clone, PartialEq)]
pub struct CompletionConfig {
    knowledge_model_id: String,
    api_key: String,
    extension: String,
    model_alias: String,
    max_tokens: u32,
    temperature: f64,
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_stored<T: std::str::FromStr>(stored: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match non_empty(stored.get(key).map(String::as_str)) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            Error::invalid_parameter_with_context(
                format!("stored value for {} is not a valid number", key),
                ErrorContext::new()
                    .with_field_path(key)
                    .with_details(format!("got '{}'", raw))
                    .with_source("config_store"),
            )
        }),
    }
}

impl CompletionConfig {
    pub fn new(
        knowledge_model_id: impl Into<String>,
        api_key: impl Into<String>,
        extension: impl Into<String>,
        model_alias: impl Into<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<Self> {
        let overrides = CompletionOverrides {
            knowledge_model_id: Some(knowledge_model_id.into()),
            api_key: Some(api_key.into()),
            extension: Some(extension.into()),
            model_alias: Some(model_alias.into()),
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        };
        Self::resolve(&overrides, &HashMap::new(), &CompletionDefaults::default())
    }

    /// Merge field by field: non-empty override, then non-empty stored value, then default.
    ///
    /// Missing credentials are reported together so the user can fix them in one pass.
    pub fn resolve(
        overrides: &CompletionOverrides,
        stored: &HashMap<String, String>,
        defaults: &CompletionDefaults,
    ) -> Result<Self> {
        let pick = |o: &Option<String>, key: &str| {
            non_empty(o.as_deref()).or_else(|| non_empty(stored.get(key).map(String::as_str)))
        };

        let knowledge_model_id = pick(&overrides.knowledge_model_id, keys::KNOWLEDGE_MODEL_ID);
        let api_key = pick(&overrides.api_key, keys::API_KEY);

        let mut missing = Vec::new();
        if knowledge_model_id.is_none() {
            missing.push(keys::KNOWLEDGE_MODEL_ID.to_string());
        }
        if api_key.is_none() {
            missing.push(keys::API_KEY.to_string());
        }
        let (Some(knowledge_model_id), Some(api_key)) = (knowledge_model_id, api_key) else {
            return Err(Error::missing_configuration(missing));
        };

        let max_tokens = match overrides.max_tokens {
            Some(v) => v,
            None => parse_stored::<u32>(stored, keys::MAX_TOKENS)?.unwrap_or(defaults.max_tokens),
        };
        let temperature = match overrides.temperature {
            Some(v) => v,
            None => parse_stored::<f64>(stored, keys::TEMPERATURE)?.unwrap_or(defaults.temperature),
        };

        let config = Self {
            knowledge_model_id,
            api_key,
            extension: pick(&overrides.extension, keys::EXTENSION)
                .unwrap_or_else(|| defaults.extension.clone()),
            model_alias: pick(&overrides.model_alias, keys::MODEL_ALIAS)
                .unwrap_or_else(|| defaults.model_alias.clone()),
            max_tokens,
            temperature,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::invalid_parameter_with_context(
                "maxTokens must be greater than zero",
                ErrorContext::new()
                    .with_field_path(keys::MAX_TOKENS)
                    .with_source("completion_config"),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(Error::invalid_parameter_with_context(
                "temperature must be between 0 and 2",
                ErrorContext::new()
                    .with_field_path(keys::TEMPERATURE)
                    .with_details(format!("got {}", self.temperature))
                    .with_source("completion_config"),
            ));
        }
        // Both end up as URL path segments.
        for (key, value) in [
            (keys::KNOWLEDGE_MODEL_ID, &self.knowledge_model_id),
            (keys::EXTENSION, &self.extension),
        ] {
            if value.contains('/') || value.contains('?') || value.contains('#') {
                return Err(Error::invalid_parameter_with_context(
                    format!("{} must be a single path segment", key),
                    ErrorContext::new()
                        .with_field_path(key)
                        .with_details(format!("got '{}'", value))
                        .with_source("completion_config"),
                ));
            }
        }
        Ok(())
    }

    pub fn knowledge_model_id(&self) -> &str {
        &self.knowledge_model_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn model_alias(&self) -> &str {
        &self.model_alias
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

// Keeps the API key out of logs and panic messages.
impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("knowledge_model_id", &self.knowledge_model_id)
            .field("api_key", &"<redacted>")
            .field("extension", &self.extension)
            .field("model_alias", &self.model_alias)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}
