use super::{keys, ConfigStore, WritableConfigStore};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use keyring::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

fn select(values: &HashMap<String, String>, names: &[&str]) -> HashMap<String, String> {
    names
        .iter()
        .filter_map(|n| values.get(*n).map(|v| (n.to_string(), v.clone())))
        .collect()
}

/// Process-local store; saving merges like the settings endpoint of the local relay.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().map(|v| v.clone()).unwrap_or_default()
    }
}

fn poisoned(source: &str) -> Error {
    Error::configuration_with_context(
        "settings lock poisoned",
        ErrorContext::new().with_source(source.to_string()),
    )
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        let values = self.values.read().map_err(|_| poisoned("in_memory_store"))?;
        Ok(select(&values, names))
    }
}

#[async_trait]
impl WritableConfigStore for InMemoryConfigStore {
    async fn set(&self, values: HashMap<String, String>) -> Result<()> {
        let mut current = self.values.write().map_err(|_| poisoned("in_memory_store"))?;
        current.extend(values);
        Ok(())
    }
}

/// Reads `<PREFIX>_<SCREAMING_SNAKE_KEY>` variables, e.g. `apiKey` -> `KMAPI_API_KEY`.
#[derive(Debug, Clone)]
pub struct EnvConfigStore {
    prefix: String,
}

impl EnvConfigStore {
    pub fn new() -> Self {
        Self::with_prefix("KMAPI")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, key: &str) -> String {
        let mut name = String::with_capacity(self.prefix.len() + key.len() + 4);
        name.push_str(&self.prefix);
        name.push('_');
        for (i, ch) in key.chars().enumerate() {
            if ch.is_ascii_uppercase() && i > 0 {
                name.push('_');
            }
            name.push(ch.to_ascii_uppercase());
        }
        name
    }
}

impl Default for EnvConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for EnvConfigStore {
    async fn get(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        Ok(names
            .iter()
            .filter_map(|n| {
                std::env::var(self.var_name(n))
                    .ok()
                    .map(|v| (n.to_string(), v))
            })
            .collect())
    }
}

/// Flat YAML mapping on disk. JSON files work too, since JSON is valid YAML.
///
/// The file is re-read on every `get` so edits made by another process are picked up.
/// A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(self.error("failed to read settings file", e.to_string())),
        };
        if text.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let raw: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&text)
            .map_err(|e| self.error("settings file is not a flat mapping", e.to_string()))?;

        let mut out = HashMap::with_capacity(raw.len());
        for (k, v) in raw {
            let s = match v {
                serde_yaml::Value::Null => continue,
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                _ => {
                    return Err(self.error(
                        "settings values must be scalars",
                        format!("key '{}' holds a nested value", k),
                    ))
                }
            };
            out.insert(k, s);
        }
        Ok(out)
    }

    fn error(&self, msg: &str, details: String) -> Error {
        Error::configuration_with_context(
            msg,
            ErrorContext::new()
                .with_field_path(self.path.display().to_string())
                .with_details(details)
                .with_source("file_store"),
        )
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn get(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        Ok(select(&self.load().await?, names))
    }
}

#[async_trait]
impl WritableConfigStore for FileConfigStore {
    async fn set(&self, values: HashMap<String, String>) -> Result<()> {
        let mut current = self.load().await?;
        current.extend(values);
        // Stable key order keeps the file diff-friendly.
        let ordered: std::collections::BTreeMap<_, _> = current.into_iter().collect();
        let text = serde_yaml::to_string(&ordered)
            .map_err(|e| self.error("failed to serialize settings", e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error("failed to create settings directory", e.to_string()))?;
        }
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| self.error("failed to write settings file", e.to_string()))
    }
}

/// OS keychain store for secret settings (see [`keys::SECRETS`]).
///
/// Non-secret names are never looked up here and cannot be saved here.
#[derive(Debug, Clone)]
pub struct KeyringConfigStore {
    service: String,
}

impl KeyringConfigStore {
    pub fn new() -> Self {
        Self::with_service("kmapi-relay")
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        Entry::new(&self.service, name).map_err(|e| {
            Error::configuration_with_context(
                "keyring unavailable",
                ErrorContext::new()
                    .with_field_path(name.to_string())
                    .with_details(e.to_string())
                    .with_source("keyring_store"),
            )
        })
    }
}

impl Default for KeyringConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for KeyringConfigStore {
    async fn get(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        let mut out = HashMap::new();
        for name in names.iter().filter(|n| keys::is_secret(n)) {
            // No entry, locked or headless keychain: treat as absent.
            let Ok(entry) = self.entry(name) else {
                continue;
            };
            if let Ok(value) = entry.get_password() {
                out.insert(name.to_string(), value);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl WritableConfigStore for KeyringConfigStore {
    async fn set(&self, values: HashMap<String, String>) -> Result<()> {
        for (name, value) in values {
            if !keys::is_secret(&name) {
                return Err(Error::configuration_with_context(
                    "only secret settings can be stored in the keyring",
                    ErrorContext::new()
                        .with_field_path(name)
                        .with_source("keyring_store"),
                ));
            }
            self.entry(&name)?.set_password(&value).map_err(|e| {
                Error::configuration_with_context(
                    "failed to save secret",
                    ErrorContext::new()
                        .with_field_path(name.clone())
                        .with_details(e.to_string())
                        .with_source("keyring_store"),
                )
            })?;
        }
        Ok(())
    }
}

/// Consults stores in order; the first non-empty value for each name wins.
#[derive(Default)]
pub struct LayeredConfigStore {
    layers: Vec<Arc<dyn ConfigStore>>,
}

impl LayeredConfigStore {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn layer(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.layers.push(store);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[async_trait]
impl ConfigStore for LayeredConfigStore {
    async fn get(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        let mut out: HashMap<String, String> = HashMap::new();
        for layer in &self.layers {
            let pending: Vec<&str> = names
                .iter()
                .copied()
                .filter(|n| !out.contains_key(*n))
                .collect();
            if pending.is_empty() {
                break;
            }
            for (k, v) in layer.get(&pending).await? {
                if !v.trim().is_empty() {
                    out.insert(k, v);
                }
            }
        }
        Ok(out)
    }
}
