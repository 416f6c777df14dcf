//! 中继调度模块：按顺序经由多个中继端点投递单个 HTTP 请求。
//!
//! # Relay Dispatch
//!
//! The add-in runs in a sandbox that blocks most cross-origin calls, and no public
//! relay is reliable on its own: some reject POST, some need the target URL encoded,
//! some are simply down. Delivery therefore walks an ordered list of
//! [`RelayCandidate`]s and stops at the first 2xx response.
//!
//! ```rust,no_run
//! use kmapi_relay::logging::MemoryLogSink;
//! use kmapi_relay::relay::{RelayCandidate, RelayDispatcher};
//! use kmapi_relay::transport::HttpTransport;
//! use kmapi_relay::types::RequestSpec;
//! use std::sync::Arc;
//!
//! # async fn run() -> kmapi_relay::Result<()> {
//! let log = Arc::new(MemoryLogSink::default());
//! let dispatcher = RelayDispatcher::new(
//!     RelayCandidate::default_chain(),
//!     Arc::new(HttpTransport::new()?),
//!     log.clone(),
//! )?;
//! let resp = dispatcher.dispatch(&RequestSpec::get("https://example.com")).await?;
//! println!("{} after {} log line(s)", resp.status, log.len());
//! # Ok(())
//! # }
//! ```

pub mod candidate;
pub mod dispatcher;

pub use candidate::{MethodSupport, RelayCandidate, TargetStyle};
pub use dispatcher::{FailureReason, RelayDispatcher, RelayFailure};
