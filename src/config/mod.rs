//! 配置模块：设置存储抽象与补全参数解析。
//!
//! # Configuration
//!
//! Settings live in an external key/value [`ConfigStore`]. The core only reads from it;
//! [`WritableConfigStore`] exists for the settings panel and the CLI.
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`InMemoryConfigStore`] | Process memory (tests, embedded hosts) |
//! | [`EnvConfigStore`] | `KMAPI_<KEY>` environment variables |
//! | [`FileConfigStore`] | YAML (or JSON) mapping on disk |
//! | [`KeyringConfigStore`] | OS keychain, secret keys only |
//! | [`LayeredConfigStore`] | First non-empty value across several stores |

pub mod completion;
pub mod store;

pub use completion::{CompletionConfig, CompletionDefaults, CompletionOverrides};
pub use store::{
    EnvConfigStore, FileConfigStore, InMemoryConfigStore, KeyringConfigStore, LayeredConfigStore,
};

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Setting names as written by the settings panel.
pub mod keys {
    pub const KNOWLEDGE_MODEL_ID: &str = "knowledgeModelId";
    pub const API_KEY: &str = "apiKey";
    pub const EXTENSION: &str = "extension";
    pub const MODEL_ALIAS: &str = "modelAlias";
    pub const MAX_TOKENS: &str = "maxTokens";
    pub const TEMPERATURE: &str = "temperature";

    /// Everything the completion builder reads.
    pub const COMPLETION: &[&str] = &[
        KNOWLEDGE_MODEL_ID,
        API_KEY,
        EXTENSION,
        MODEL_ALIAS,
        MAX_TOKENS,
        TEMPERATURE,
    ];

    /// Values that belong in a secret store rather than plain files.
    pub const SECRETS: &[&str] = &[API_KEY];

    pub fn is_secret(name: &str) -> bool {
        SECRETS.contains(&name)
    }
}

/// Read access to named settings.
///
/// Keys that are not set are simply absent from the returned map.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, names: &[&str]) -> Result<HashMap<String, String>>;
}

/// Stores the settings panel can save into. Saving merges into existing values.
#[async_trait]
pub trait WritableConfigStore: ConfigStore {
    async fn set(&self, values: HashMap<String, String>) -> Result<()>;
}
