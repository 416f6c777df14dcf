//! Ordered first-success dispatch across relay candidates.

use super::candidate::RelayCandidate;
use crate::logging::LogSink;
use crate::transport::{HttpSender, TransportError};
use crate::types::{RawResponse, RequestSpec};
use crate::{Error, ErrorContext, Result};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const BODY_EXCERPT_CHARS: usize = 200;

/// Why a single candidate did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Status { status: u16, body_excerpt: String },
    Transport(String),
    Timeout(Duration),
    Prepare(String),
}

/// Recoverable failure of one candidate. Logged, remembered, never surfaced on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub index: usize,
    pub candidate: String,
    pub reason: FailureReason,
}

impl RelayFailure {
    pub fn status(&self) -> Option<u16> {
        match self.reason {
            FailureReason::Status { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Status {
                status,
                body_excerpt,
            } if body_excerpt.is_empty() => write!(f, "HTTP {}", status),
            FailureReason::Status {
                status,
                body_excerpt,
            } => write!(f, "HTTP {} ({})", status, body_excerpt),
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
            FailureReason::Timeout(d) => write!(f, "timed out after {}ms", d.as_millis()),
            FailureReason::Prepare(msg) => write!(f, "could not build request: {}", msg),
        }
    }
}

impl fmt::Display for RelayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay[{}] {}: {}", self.index, self.candidate, self.reason)
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let mut s: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        s.push_str("...");
        s
    }
}

/// Delivers one logical request through an immutable, ordered candidate list.
///
/// - Candidates are tried strictly in order, one at a time.
/// - Candidates that cannot carry the request method are skipped without a call.
/// - The first 2xx response wins; nothing after it is attempted.
/// - Non-2xx and transport failures are logged and fall through to the next candidate.
/// - No candidate is attempted twice, and there is no delay between attempts.
pub struct RelayDispatcher {
    candidates: Arc<[RelayCandidate]>,
    sender: Arc<dyn HttpSender>,
    log: Arc<dyn LogSink>,
    attempt_timeout: Option<Duration>,
}

impl RelayDispatcher {
    pub fn new(
        candidates: Vec<RelayCandidate>,
        sender: Arc<dyn HttpSender>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self> {
        if candidates.is_empty() {
            return Err(Error::configuration_with_context(
                "relay candidate list is empty",
                ErrorContext::new().with_source("relay_dispatcher"),
            ));
        }
        Ok(Self {
            candidates: candidates.into(),
            sender,
            log,
            attempt_timeout: None,
        })
    }

    /// Bound each candidate attempt. A timeout counts as that candidate's failure.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn candidates(&self) -> &[RelayCandidate] {
        &self.candidates
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub async fn dispatch(&self, spec: &RequestSpec) -> Result<RawResponse> {
        self.run(spec, None).await
    }

    /// Like [`dispatch`](Self::dispatch), but abandons the in-flight attempt and stops
    /// the chain as soon as `cancel` fires.
    pub async fn dispatch_with_cancel(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        self.run(spec, Some(cancel)).await
    }

    async fn run(&self, spec: &RequestSpec, cancel: Option<&CancellationToken>) -> Result<RawResponse> {
        let mut attempts = 0usize;
        let mut last_failure: Option<RelayFailure> = None;

        for (index, candidate) in self.candidates.iter().enumerate() {
            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                return Err(Error::Cancelled);
            }

            if !candidate.supports_method(&spec.method) {
                debug!(
                    index,
                    candidate = candidate.name.as_str(),
                    method = spec.method.as_str(),
                    "relay candidate skipped: method not supported"
                );
                continue;
            }

            let prepared = match candidate.prepare(spec) {
                Ok(p) => p,
                Err(e) => {
                    let failure = RelayFailure {
                        index,
                        candidate: candidate.name.clone(),
                        reason: FailureReason::Prepare(e.to_string()),
                    };
                    self.log.log(&failure.to_string());
                    last_failure = Some(failure);
                    continue;
                }
            };

            attempts += 1;
            let start = Instant::now();
            let outcome = match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => {
                        self.log.log(&format!(
                            "relay[{}] {}: {} {} cancelled",
                            index, candidate.name, spec.method, prepared.url
                        ));
                        return Err(Error::Cancelled);
                    }
                    r = self.attempt(&prepared) => r,
                },
                None => self.attempt(&prepared).await,
            };
            let duration_ms = start.elapsed().as_millis();

            let reason = match outcome {
                Ok(resp) if resp.is_success() => {
                    info!(
                        index,
                        candidate = candidate.name.as_str(),
                        http_status = resp.status,
                        duration_ms,
                        "relay attempt succeeded"
                    );
                    self.log.log(&format!(
                        "relay[{}] {}: {} {} -> {}",
                        index, candidate.name, spec.method, prepared.url, resp.status
                    ));
                    return Ok(resp);
                }
                Ok(resp) => FailureReason::Status {
                    status: resp.status,
                    body_excerpt: excerpt(&resp.body),
                },
                Err(TransportError::Timeout(d)) => FailureReason::Timeout(d),
                Err(e) => FailureReason::Transport(e.to_string()),
            };

            let failure = RelayFailure {
                index,
                candidate: candidate.name.clone(),
                reason,
            };
            info!(
                index,
                candidate = candidate.name.as_str(),
                http_status = failure.status(),
                duration_ms,
                "relay attempt failed"
            );
            self.log.log(&format!(
                "relay[{}] {}: {} {} failed: {}",
                index, candidate.name, spec.method, prepared.url, failure.reason
            ));
            last_failure = Some(failure);
        }

        Err(match last_failure {
            Some(f) => Error::AllRelaysExhausted {
                attempts,
                last_status: f.status(),
                last_failure: f.to_string(),
            },
            None => Error::AllRelaysExhausted {
                attempts,
                last_status: None,
                last_failure: format!("no relay candidate supports method {}", spec.method),
            },
        })
    }

    async fn attempt(&self, request: &RequestSpec) -> std::result::Result<RawResponse, TransportError> {
        match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.sender.send(request)).await {
                Ok(r) => r,
                Err(_) => Err(TransportError::Timeout(limit)),
            },
            None => self.sender.send(request).await,
        }
    }
}
