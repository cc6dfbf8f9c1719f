use std::collections::HashMap;

use parley_types::{DeviceDef, Uid};

use crate::error::Result;
use crate::store::Store;

pub struct Devices<'a> {
    pub(crate) store: &'a Store,
}

impl Devices<'_> {
    /// Replace `old_device_id` with `dev`.
    ///
    /// The old id is deleted when given and it differs from the new one (or
    /// there is no new one). The new device is stored when it has an id.
    pub fn update(&self, uid: Uid, old_device_id: Option<&str>, dev: Option<&DeviceDef>) -> Result<()> {
        let adapter = self.store.adapter();

        if let Some(old) = old_device_id.filter(|id| !id.is_empty()) {
            if dev.is_none_or(|d| d.device_id != old) {
                adapter.device_delete(uid, old)?;
            }
        }

        match dev {
            Some(dev) if !dev.device_id.is_empty() => adapter.device_upsert(uid, dev),
            _ => Ok(()),
        }
    }

    /// Devices of each user and the total count.
    pub fn get_all(&self, uids: &[Uid]) -> Result<(HashMap<Uid, Vec<DeviceDef>>, usize)> {
        self.store.adapter().device_get_all(uids)
    }

    pub fn delete(&self, uid: Uid, device_id: &str) -> Result<()> {
        self.store.adapter().device_delete(uid, device_id)
    }
}
