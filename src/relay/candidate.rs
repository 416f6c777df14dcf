//! Relay candidate descriptors.

use crate::types::RequestSpec;
use crate::Result;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::collections::HashMap;

pub const CORSPROXY_IO: &str = "https://corsproxy.io/?url=";
pub const ALLORIGINS_RAW: &str = "https://api.allorigins.win/raw?url=";
pub const CORS_ANYWHERE: &str = "https://cors-anywhere.herokuapp.com/";

/// Characters left alone by `encodeURIComponent`; everything else is `%XX`, spaces included.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// How a candidate reaches the target origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStyle {
    /// Call the target URL as-is.
    Direct,
    /// `prefix + url`, or `prefix + urlencode(url)` when `encode` is set.
    Prefix { prefix: String, encode: bool },
    /// Self-hosted relay: `POST endpoint` with a JSON `{url, method, headers, body}` envelope.
    /// The relay answers with the upstream status and body.
    Envelope { endpoint: String },
}

/// Which HTTP methods a candidate can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSupport {
    Any,
    /// GET and HEAD only; typical of text relays that drop request bodies.
    ReadOnly,
    Only(Vec<String>),
}

impl MethodSupport {
    pub fn allows(&self, method: &str) -> bool {
        match self {
            MethodSupport::Any => true,
            MethodSupport::ReadOnly => {
                method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
            }
            MethodSupport::Only(methods) => methods.iter().any(|m| m.eq_ignore_ascii_case(method)),
        }
    }
}

/// One entry of the ordered fallback list. Position in the list is its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCandidate {
    pub name: String,
    pub target: TargetStyle,
    pub methods: MethodSupport,
}

#[derive(Serialize)]
struct Envelope<'a> {
    url: &'a str,
    method: &'a str,
    headers: &'a HashMap<String, String>,
    body: &'a str,
}

impl RelayCandidate {
    pub fn direct() -> Self {
        Self {
            name: "direct".to_string(),
            target: TargetStyle::Direct,
            methods: MethodSupport::Any,
        }
    }

    /// Relay that expects the raw target URL appended to its prefix.
    pub fn prefixed(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: TargetStyle::Prefix {
                prefix: prefix.into(),
                encode: false,
            },
            methods: MethodSupport::Any,
        }
    }

    /// Relay that expects the target URL percent-encoded (usually as a query value).
    pub fn encoded(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: TargetStyle::Prefix {
                prefix: prefix.into(),
                encode: true,
            },
            methods: MethodSupport::Any,
        }
    }

    pub fn envelope(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: TargetStyle::Envelope {
                endpoint: endpoint.into(),
            },
            methods: MethodSupport::Any,
        }
    }

    pub fn with_methods(mut self, methods: MethodSupport) -> Self {
        self.methods = methods;
        self
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.target, TargetStyle::Direct)
    }

    pub fn supports_method(&self, method: &str) -> bool {
        self.methods.allows(method)
    }

    /// URL actually contacted for `url`.
    pub fn effective_url(&self, url: &str) -> String {
        match &self.target {
            TargetStyle::Direct => url.to_string(),
            TargetStyle::Prefix {
                prefix,
                encode: false,
            } => format!("{}{}", prefix, url),
            TargetStyle::Prefix {
                prefix,
                encode: true,
            } => {
                format!("{}{}", prefix, utf8_percent_encode(url, URI_COMPONENT))
            }
            TargetStyle::Envelope { endpoint } => endpoint.clone(),
        }
    }

    /// Per-attempt request for this candidate. Method, headers and body pass through
    /// unchanged, except for envelope relays which wrap them into a JSON POST.
    pub fn prepare(&self, spec: &RequestSpec) -> Result<RequestSpec> {
        match &self.target {
            TargetStyle::Envelope { endpoint } => {
                let payload = serde_json::to_string(&Envelope {
                    url: &spec.url,
                    method: &spec.method,
                    headers: &spec.headers,
                    body: spec.body.as_deref().unwrap_or(""),
                })?;
                Ok(RequestSpec::post(endpoint.clone())
                    .header("Content-Type", "application/json")
                    .body(payload))
            }
            _ => Ok(spec.retarget(self.effective_url(&spec.url))),
        }
    }

    /// Built-in chain: direct first, then public relays in decreasing capability.
    pub fn default_chain() -> Vec<RelayCandidate> {
        vec![
            RelayCandidate::direct(),
            RelayCandidate::encoded("corsproxy.io", CORSPROXY_IO),
            RelayCandidate::encoded("allorigins", ALLORIGINS_RAW).with_methods(MethodSupport::ReadOnly),
            RelayCandidate::prefixed("cors-anywhere", CORS_ANYWHERE),
        ]
    }
}
