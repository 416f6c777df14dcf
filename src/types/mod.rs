//! 类型模块：请求/响应与对话消息的核心数据类型。
//!
//! # Types Module
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestSpec`] | One logical HTTP call (url, method, headers, body) |
//! | [`RawResponse`] | Status, headers and body as returned by the transport |
//! | [`Message`] | Chat message sent to the completion endpoint |

pub mod message;
pub mod request;

pub use message::{ContentBlock, Message, MessageRole};
pub use request::{RawResponse, RequestSpec};
