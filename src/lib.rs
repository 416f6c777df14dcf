//! # kmapi-relay
//!
//! 电子表格加载项核心：经由中继链投递 HTTP 请求，并调用知识模型对话补全 API。
//!
//! Core of a spreadsheet add-in that fetches remote text and drives the hosted
//! knowledge-model chat-completion API (KMAPI) from a sandbox that blocks most
//! cross-origin requests.
//!
//! ## Overview
//!
//! Every outbound call is a single logical request delivered through an ordered chain
//! of relay candidates: the direct URL first, then public relays with their own quirks
//! (read-only relays, relays that need the target URL encoded, a self-hosted envelope
//! relay). The first 2xx response wins; every attempt leaves one line in the log sink.
//!
//! ## Key Features
//!
//! - **Relay dispatch**: [`relay::RelayDispatcher`] with first-success, strictly sequential fallback
//! - **Completions**: [`completion::CompletionClient`] builds the exact provider request
//! - **Settings**: [`config::ConfigStore`] with memory, env, file, keyring and layered stores
//! - **Host functions**: [`functions::FunctionTable`] maps host-visible names to operations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kmapi_relay::AddinRuntime;
//!
//! #[tokio::main]
//! async fn main() -> kmapi_relay::Result<()> {
//!     let runtime = AddinRuntime::builder().build()?;
//!
//!     let page = runtime.fetch_text("https://example.com").await?;
//!     println!("{} bytes", page.len());
//!
//!     let answer = runtime
//!         .complete_with_explicit_config("km-123", "api-key", "Summarize: ...", None, None, None, None, None)
//!         .await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`relay`] | Relay candidates and the ordered dispatcher |
//! | [`completion`] | Request building and response parsing for chat completions |
//! | [`config`] | Settings stores and completion parameter resolution |
//! | [`transport`] | HTTP sender seam and the `reqwest` implementation |
//! | [`logging`] | Diagnostic log sinks |
//! | [`functions`] | Host-callable function table |
//! | [`runtime`] | Runtime wiring and public entry points |
//! | [`probe`] | API connectivity probe |

pub mod completion;
pub mod config;
pub mod functions;
pub mod logging;
pub mod probe;
pub mod relay;
pub mod runtime;
pub mod transport;
pub mod types;

pub use completion::{AccessKeyScheme, CompletionClient};
pub use config::{CompletionConfig, CompletionOverrides, ConfigStore};
pub use logging::LogSink;
pub use relay::{RelayCandidate, RelayDispatcher};
pub use runtime::{AddinRuntime, AddinRuntimeBuilder};
pub use types::{RawResponse, RequestSpec};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
