use std::fmt;
use std::sync::Arc;

use tracing::info;

use parley_types::Uid;
use parley_uid::UidGenerator;
use parley_uid::keys::key_from_base64;

use crate::adapter::Adapter;
use crate::config::StoreConfig;
use crate::devices::Devices;
use crate::error::{Result, StoreError};
use crate::files::Files;
use crate::messages::Messages;
use crate::registry::Registries;
use crate::subs::Subs;
use crate::topics::Topics;
use crate::users::Users;

/// Handle to an open backend plus everything the mappers need.
///
/// Built once at startup and shared by reference; it holds no locks of its
/// own apart from the id generator's.
pub struct Store {
    adapter: Arc<dyn Adapter>,
    uids: UidGenerator,
    registries: Arc<Registries>,
}

impl Store {
    /// Configure the id generator for `worker_id`, connect the backend and
    /// verify its schema version.
    pub fn open(
        adapter: Arc<dyn Adapter>,
        worker_id: u32,
        config: &StoreConfig,
        registries: Arc<Registries>,
    ) -> Result<Self> {
        let uids = uid_generator(worker_id, config)?;

        if let Some(wanted) = &config.use_adapter {
            if wanted != adapter.name() {
                return Err(StoreError::config(format!(
                    "configured for adapter '{}', got '{}'",
                    wanted,
                    adapter.name()
                )));
            }
        }
        if adapter.is_open() {
            return Err(StoreError::config("connection is already opened"));
        }

        adapter.open(&config.adapter_config(adapter.name()))?;
        adapter.check_db_version()?;

        info!("Store opened with adapter '{}', worker {}", adapter.name(), worker_id);
        Ok(Self {
            adapter,
            uids,
            registries,
        })
    }

    /// Create the backend's schema, dropping existing data when `reset` is
    /// set. Connects first unless the adapter is already open.
    pub fn init_db(adapter: &dyn Adapter, config: &StoreConfig, reset: bool) -> Result<()> {
        if !adapter.is_open() {
            adapter.open(&config.adapter_config(adapter.name()))?;
        }
        adapter.create_db(reset)
    }

    pub fn close(&self) -> Result<()> {
        if self.adapter.is_open() {
            return self.adapter.close();
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.adapter.is_open()
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub(crate) fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    // -- Ids --

    /// New unique id, suitable as a primary key.
    pub fn get_uid(&self) -> Result<Uid> {
        Ok(self.uids.get()?)
    }

    pub fn get_uid_string(&self) -> Result<String> {
        Ok(self.uids.get_str()?)
    }

    /// Raw snowflake value behind `uid`, for backends that want integer keys.
    pub fn decode_uid(&self, uid: Uid) -> i64 {
        self.uids.decode(uid)
    }

    pub fn encode_uid(&self, id: i64) -> Uid {
        self.uids.encode(id)
    }

    // -- Mappers --

    pub fn users(&self) -> Users<'_> {
        Users { store: self }
    }

    pub fn topics(&self) -> Topics<'_> {
        Topics { store: self }
    }

    pub fn subs(&self) -> Subs<'_> {
        Subs { store: self }
    }

    pub fn messages(&self) -> Messages<'_> {
        Messages { store: self }
    }

    pub fn devices(&self) -> Devices<'_> {
        Devices { store: self }
    }

    pub fn files(&self) -> Files<'_> {
        Files { store: self }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("adapter", &self.adapter.name())
            .field("worker_id", &self.uids.worker_id())
            .finish_non_exhaustive()
    }
}

fn uid_generator(worker_id: u32, config: &StoreConfig) -> Result<UidGenerator> {
    let key = key_from_base64(&config.uid_key)
        .map_err(|e| StoreError::config(format!("invalid uid key: {}", e)))?;
    UidGenerator::new(worker_id, &key)
        .map_err(|e| StoreError::config(format!("failed to init snowflake: {}", e)))
}
