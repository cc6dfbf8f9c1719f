use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::anyhow;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use parley_store::{MediaHandler, Result, StoreError};
use parley_types::Uid;

/// Registry name of the filesystem handler.
pub const NAME: &str = "fs";

const DEFAULT_SERVE_URL: &str = "/v0/file/s/";

#[derive(Debug, Clone, Deserialize)]
struct FsConfig {
    upload_dir: PathBuf,
    #[serde(default = "default_serve_url")]
    serve_url: String,
}

fn default_serve_url() -> String {
    DEFAULT_SERVE_URL.to_string()
}

/// Stores each upload as a flat file at `{upload_dir}/{fid}` and serves it
/// under `{serve_url}{fid}`, optionally followed by an extension.
#[derive(Default)]
pub struct FsMedia {
    config: RwLock<Option<FsConfig>>,
}

impl FsMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the blob of `fid` lives, once initialized.
    #[cfg(test)]
    pub fn file_path(&self, fid: Uid) -> Option<PathBuf> {
        self.config
            .read()
            .as_ref()
            .map(|c| c.upload_dir.join(fid.to_string()))
    }

    /// Download URL of `fid`, with `ext` appended when given.
    #[cfg(test)]
    pub fn url_for(&self, fid: Uid, ext: Option<&str>) -> Option<String> {
        let config = self.config.read();
        let config = config.as_ref()?;
        Some(match ext {
            Some(ext) => format!("{}{}.{}", config.serve_url, fid, ext.trim_start_matches('.')),
            None => format!("{}{}", config.serve_url, fid),
        })
    }
}

impl MediaHandler for FsMedia {
    fn init(&self, config: &str) -> Result<()> {
        let config: FsConfig = serde_json::from_str(config)
            .map_err(|e| StoreError::config(format!("fs media: bad config: {}", e)))?;
        if config.serve_url.is_empty() {
            return Err(StoreError::config("fs media: serve_url must not be empty"));
        }

        std::fs::create_dir_all(&config.upload_dir).map_err(|e| {
            StoreError::external(anyhow!(
                "fs media: cannot create {}: {}",
                config.upload_dir.display(),
                e
            ))
        })?;

        info!("File storage directory: {}", config.upload_dir.display());
        *self.config.write() = Some(config);
        Ok(())
    }

    fn get_id_from_url(&self, url: &str) -> Uid {
        let config = self.config.read();
        let Some(config) = config.as_ref() else {
            return Uid::ZERO;
        };

        // Absolute URLs carry a scheme and host in front of the path.
        let path = match url.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("", |at| &rest[at..]),
            None => url,
        };
        let Some(name) = path.strip_prefix(config.serve_url.as_str()) else {
            return Uid::ZERO;
        };
        let name = name.split(['?', '#']).next().unwrap_or_default();
        let id = name.split('.').next().unwrap_or_default();
        if id.contains('/') {
            return Uid::ZERO;
        }
        id.parse().unwrap_or(Uid::ZERO)
    }

    fn delete(&self, fids: &[Uid]) -> Result<()> {
        let dir = self
            .config
            .read()
            .as_ref()
            .map(|c| c.upload_dir.clone())
            .ok_or_else(|| StoreError::external(anyhow!("fs media: not initialized")))?;

        for fid in fids {
            let path = dir.join(fid.to_string());
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::external(anyhow!(
                        "fs media: failed to remove {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Ok(())
    }
}
