use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Store section of the server configuration.
///
/// ```json
/// {
///     "uid_key": "la6YsO+bNX/+XIkOqc5Svw==",
///     "use_adapter": "sqlite",
///     "adapters": { "sqlite": { "path": "parley.db" } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base64 of the 16-byte key used to obfuscate ids.
    pub uid_key: String,
    /// Backend expected to serve this config. Checked against the adapter
    /// handed to [`Store::open`](crate::Store::open) when set.
    #[serde(default)]
    pub use_adapter: Option<String>,
    /// Backend name → backend-specific configuration.
    #[serde(default)]
    pub adapters: HashMap<String, Value>,
}

impl StoreConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::config(format!("failed to parse config: {}", e)))
    }

    /// Configuration blob of the named backend, serialized back to JSON, or an
    /// empty string when there is none.
    pub fn adapter_config(&self, name: &str) -> String {
        self.adapters
            .get(name)
            .map(Value::to_string)
            .unwrap_or_default()
    }
}
