//! Host-facing runtime.
//!
//! One [`AddinRuntime`] per host session. It owns the relay dispatcher, the completion
//! client and the function table, and is safe to share across concurrently evaluated cells.

pub mod builder;
pub mod core;

pub use builder::AddinRuntimeBuilder;
pub use core::AddinRuntime;
