//! Chat completion against the knowledge-model API.
//!
//! `POST <base>/knowledge-models/{id}/chat/completions/{extension}` with a fixed
//! sampling profile (`top_p = 1`, no frequency or presence penalty) and a plain-text
//! response format. See [`request`] for the exact wire body.

pub mod client;
pub mod request;
pub mod response;

pub use client::CompletionClient;
pub use request::{
    build_completion_request, completion_body, completion_url, AccessKeyScheme, ACCESS_KEY_HEADER,
    DEFAULT_BASE_URL,
};
pub use response::extract_completion;
