use crate::{Error, Result};
use serde_json::Value;

/// Pull `choices[0].message.content` out of a provider response body.
///
/// Anything else (invalid JSON, empty `choices`, non-string content) is a
/// [`Error::MalformedProviderResponse`] carrying the raw body.
pub fn extract_completion(body: &str) -> Result<String> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed_response(format!("response is not JSON ({})", e), body))?;

    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::malformed_response("missing choices[0].message.content", body))
}
