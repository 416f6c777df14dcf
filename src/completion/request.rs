//! Provider request construction for the knowledge-model chat endpoint.

use crate::config::CompletionConfig;
use crate::types::{Message, RequestSpec};
use crate::{Error, Result};
use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "https://constructor.app/api/platform-kmapi/v1";
pub const ACCESS_KEY_HEADER: &str = "X-KM-AccessKey";

/// How the API key is presented to the provider.
///
/// Deployments disagree on whether the access-key header carries a `Bearer ` scheme or the
/// bare key, so both the header name and the prefix are data rather than code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyScheme {
    pub header: String,
    pub prefix: Option<String>,
}

impl AccessKeyScheme {
    /// `X-KM-AccessKey: Bearer <key>`
    pub fn bearer() -> Self {
        Self {
            header: ACCESS_KEY_HEADER.to_string(),
            prefix: Some("Bearer ".to_string()),
        }
    }

    /// `X-KM-AccessKey: <key>`
    pub fn raw() -> Self {
        Self {
            header: ACCESS_KEY_HEADER.to_string(),
            prefix: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn header_value(&self, api_key: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}{}", p, api_key),
            None => api_key.to_string(),
        }
    }

    /// Parses `bearer` / `raw` as used by `KMAPI_ACCESS_KEY_SCHEME`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bearer" => Some(Self::bearer()),
            "raw" | "plain" => Some(Self::raw()),
            _ => None,
        }
    }
}

impl Default for AccessKeyScheme {
    fn default() -> Self {
        Self::bearer()
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: serde_json::Map<String, serde_json::Value>,
}

/// Wire body. Field order is the serialization order.
#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<Message>,
    response_format: ResponseFormat,
    #[serde(serialize_with = "json_number")]
    temperature: f64,
    max_completion_tokens: u32,
    top_p: u8,
    frequency_penalty: u8,
    presence_penalty: u8,
}

/// Whole values go out as integers (`1`, not `1.0`), matching JSON number output elsewhere.
fn json_number<S: serde::Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

pub fn completion_url(base_url: &str, config: &CompletionConfig) -> String {
    format!(
        "{}/knowledge-models/{}/chat/completions/{}",
        base_url.trim_end_matches('/'),
        config.knowledge_model_id(),
        config.extension()
    )
}

/// Serialized provider body for `user_msg` (and optional system prompt).
pub fn completion_body(config: &CompletionConfig, user_msg: &str, system_msg: Option<&str>) -> Result<String> {
    if user_msg.trim().is_empty() {
        return Err(Error::missing_field("userMsg"));
    }
    let body = CompletionBody {
        model: config.model_alias(),
        messages: Message::conversation(user_msg, system_msg),
        response_format: ResponseFormat {
            kind: "text",
            json_schema: serde_json::Map::new(),
        },
        temperature: config.temperature(),
        max_completion_tokens: config.max_tokens(),
        top_p: 1,
        frequency_penalty: 0,
        presence_penalty: 0,
    };
    Ok(serde_json::to_string(&body)?)
}

/// Full POST request for one completion call.
pub fn build_completion_request(
    base_url: &str,
    scheme: &AccessKeyScheme,
    config: &CompletionConfig,
    user_msg: &str,
    system_msg: Option<&str>,
) -> Result<RequestSpec> {
    let body = completion_body(config, user_msg, system_msg)?;
    Ok(RequestSpec::post(completion_url(base_url, config))
        .header(scheme.header.clone(), scheme.header_value(config.api_key()))
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .body(body))
}
