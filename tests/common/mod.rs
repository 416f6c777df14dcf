//! Scripted HTTP sender for dispatcher and completion tests.

#![allow(dead_code)]

use async_trait::async_trait;
use kmapi_relay::transport::{HttpSender, TransportError};
use kmapi_relay::types::{RawResponse, RequestSpec};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Outcome {
    Status(u16, String),
    Fail(String),
    Hang,
}

/// Answers by URL prefix and records every request it sees.
pub struct ScriptedSender {
    rules: Vec<(String, Outcome)>,
    calls: Mutex<Vec<RequestSpec>>,
}

impl ScriptedSender {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, url_prefix: &str, outcome: Outcome) -> Self {
        self.rules.push((url_prefix.to_string(), outcome));
        self
    }

    pub fn calls(&self) -> Vec<RequestSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

#[async_trait]
impl HttpSender for ScriptedSender {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        let outcome = self
            .rules
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, o)| o.clone())
            .unwrap_or_else(|| Outcome::Fail(format!("no rule for {}", request.url)));
        match outcome {
            Outcome::Status(status, body) => Ok(RawResponse::new(status, body)),
            Outcome::Fail(msg) => Err(TransportError::Other(msg)),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(TransportError::Other("hung".to_string()))
            }
        }
    }
}

pub const TARGET: &str = "https://api.test/resource";
pub const RELAY_A: &str = "https://relay-a.test/?url=";
pub const RELAY_B: &str = "https://relay-b.test/";
