use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use parley_store::StoreConfig;

/// Process settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub worker_id: u32,
    pub gc: GcSettings,
}

/// How often and how aggressively unused uploads are collected.
#[derive(Debug, Clone, Copy)]
pub struct GcSettings {
    pub interval: Duration,
    pub max_age: chrono::Duration,
    pub batch: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let config_path: PathBuf = std::env::var("PARLEY_CONFIG")
            .unwrap_or_else(|_| "parley.json".into())
            .into();
        let worker_id = env_or("PARLEY_WORKER_ID", 1)?;
        let interval_secs: u64 = env_or("PARLEY_GC_INTERVAL_SECS", 3600)?;
        let max_age_secs: i64 = env_or("PARLEY_GC_MAX_AGE_SECS", 86400)?;
        let batch = env_or("PARLEY_GC_BATCH", 100)?;

        Ok(Self {
            config_path,
            worker_id,
            gc: GcSettings::new(interval_secs, max_age_secs, batch)?,
        })
    }
}

impl GcSettings {
    pub fn new(interval_secs: u64, max_age_secs: i64, batch: usize) -> Result<Self> {
        if interval_secs == 0 {
            return Err(anyhow!("GC interval must be positive"));
        }
        let max_age = chrono::Duration::try_seconds(max_age_secs)
            .ok_or_else(|| anyhow!("GC max age out of range: {}", max_age_secs))?;
        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            max_age,
            batch,
        })
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(name, std::env::var(name).ok(), default)
}

/// Parse an optional setting. Unset or blank means `default`; anything else
/// must parse.
fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", name, raw, e)),
    }
}

/// Contents of the JSON config file.
///
/// ```json
/// {
///     "store_config": { "uid_key": "...", "use_adapter": "sqlite", "adapters": { ... } },
///     "media": { "use_handler": "fs", "handlers": { "fs": { "upload_dir": "uploads" } } }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub store_config: StoreConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaConfig {
    /// Handler made active at startup. None leaves attachments unresolved.
    #[serde(default)]
    pub use_handler: Option<String>,
    #[serde(default)]
    pub handlers: HashMap<String, Value>,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("bad config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl MediaConfig {
    /// Blob of the named handler as a JSON string, empty when absent.
    pub fn handler_config(&self, name: &str) -> String {
        self.handlers.get(name).map(Value::to_string).unwrap_or_default()
    }
}
