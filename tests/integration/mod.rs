//! Integration tests with mock HTTP servers and the real reqwest transport

pub mod mock_server;
pub mod relay_http;
pub mod completion_http;
