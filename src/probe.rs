//! Connectivity probe against the knowledge-model API liveness endpoint.

use crate::relay::RelayDispatcher;
use crate::types::RequestSpec;
use crate::Error;
use serde::Serialize;

pub const DEFAULT_ALIVE_URL: &str = "https://constructor.app/api/platform-kmapi/alive";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub reachable: bool,
    pub status: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// GET the liveness URL through the relay chain.
///
/// A 401 still proves the API is reachable; the probe just does not present a key.
pub async fn probe_connectivity(dispatcher: &RelayDispatcher, alive_url: &str) -> ProbeReport {
    let request = RequestSpec::get(alive_url).header("Accept", "application/json");
    match dispatcher.dispatch(&request).await {
        Ok(resp) => ProbeReport {
            reachable: true,
            status: Some(resp.status),
            message: "API connectivity test successful".to_string(),
            response: Some(resp.body),
        },
        Err(Error::AllRelaysExhausted {
            last_status: Some(401),
            ..
        }) => ProbeReport {
            reachable: true,
            status: Some(401),
            message: "API connectivity test successful (401 expected without API key)".to_string(),
            response: None,
        },
        Err(e) => ProbeReport {
            reachable: false,
            status: match &e {
                Error::AllRelaysExhausted { last_status, .. } => *last_status,
                _ => None,
            },
            message: format!("API connectivity test failed: {}", e),
            response: None,
        },
    }
}
