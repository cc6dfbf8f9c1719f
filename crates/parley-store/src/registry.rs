//! Named handler registries, filled once at startup.
//!
//! Registration errors are configuration errors: the process is expected to
//! stop rather than carry on with a half-populated registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::auth::AuthHandler;
use crate::error::{Result, StoreError};
use crate::media::MediaHandler;
use crate::validate::Validator;

/// Case-insensitive name → handler map.
pub struct Registry<H: ?Sized> {
    kind: &'static str,
    handlers: RwLock<HashMap<String, Arc<H>>>,
}

impl<H: ?Sized> Registry<H> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Add a handler. An empty or already used name is a configuration error.
    pub fn register(&self, name: &str, handler: Arc<H>) -> Result<()> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(StoreError::config(format!("{}: handler name is empty", self.kind)));
        }

        let mut handlers = self.handlers.write();
        if handlers.contains_key(&name) {
            return Err(StoreError::config(format!(
                "{}: called twice for '{}'",
                self.kind, name
            )));
        }
        debug!("Registered {} '{}'", self.kind, name);
        handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        self.handlers.read().get(&name.trim().to_lowercase()).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// All extension points of the store.
pub struct Registries {
    auth: Registry<dyn AuthHandler>,
    validators: Registry<dyn Validator>,
    media: Registry<dyn MediaHandler>,
    active_media: RwLock<Option<Arc<dyn MediaHandler>>>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            auth: Registry::new("auth scheme"),
            validators: Registry::new("validator"),
            media: Registry::new("media handler"),
            active_media: RwLock::new(None),
        }
    }

    // -- Auth schemes --

    pub fn register_auth_scheme(&self, name: &str, handler: Arc<dyn AuthHandler>) -> Result<()> {
        self.auth.register(name, handler)
    }

    pub fn auth_handler(&self, name: &str) -> Option<Arc<dyn AuthHandler>> {
        self.auth.get(name)
    }

    pub fn auth_schemes(&self) -> Vec<String> {
        self.auth.names()
    }

    // -- Validators --

    pub fn register_validator(&self, name: &str, validator: Arc<dyn Validator>) -> Result<()> {
        self.validators.register(name, validator)
    }

    pub fn validator(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(name)
    }

    // -- Media --

    pub fn register_media_handler(&self, name: &str, handler: Arc<dyn MediaHandler>) -> Result<()> {
        self.media.register(name, handler)
    }

    /// Initialize the named media handler and make it the active one.
    ///
    /// An unknown name is a configuration error. When `init` fails the
    /// previously active handler stays in place.
    pub fn use_media_handler(&self, name: &str, config: &str) -> Result<()> {
        let handler = self
            .media
            .get(name)
            .ok_or_else(|| StoreError::config(format!("unknown media handler '{}'", name)))?;
        handler.init(config)?;
        *self.active_media.write() = Some(handler);
        info!("Using media handler '{}'", name.trim().to_lowercase());
        Ok(())
    }

    /// Handler every attachment operation goes through.
    pub fn media_handler(&self) -> Option<Arc<dyn MediaHandler>> {
        self.active_media.read().clone()
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
