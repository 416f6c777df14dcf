//! Network transport seam.
//!
//! The dispatcher only talks to [`HttpSender`]; production code plugs in
//! [`HttpTransport`], tests plug in scripted doubles.

pub mod http;

pub use http::HttpTransport;

use crate::types::{RawResponse, RequestSpec};
use async_trait::async_trait;
use std::time::Duration;

/// Sends exactly one HTTP request. Non-2xx statuses are *not* errors at this level.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
