use chrono::{DateTime, Utc};
use tracing::debug;

use parley_types::{FileDef, Uid, UploadStatus};

use crate::error::{Result, StoreError};
use crate::store::Store;

pub struct Files<'a> {
    pub(crate) store: &'a Store,
}

impl Files<'_> {
    /// Record a new upload in the `Started` state. Assigns an id when `fd`
    /// has none.
    pub fn start_upload(&self, fd: &mut FileDef) -> Result<()> {
        if fd.id.is_zero() {
            fd.id = self.store.get_uid()?;
        }
        fd.init_times();
        fd.status = UploadStatus::Started;
        self.store.adapter().file_start_upload(fd)
    }

    /// Mark an upload completed or failed and record its final size.
    pub fn finish_upload(&self, fid: Uid, success: bool, size: i64) -> Result<FileDef> {
        let status = if success {
            UploadStatus::Completed
        } else {
            UploadStatus::Failed
        };
        self.store.adapter().file_finish_upload(fid, status, size)
    }

    pub fn get(&self, fid: Uid) -> Result<Option<FileDef>> {
        self.store.adapter().file_get(fid)
    }

    /// Remove up to `limit` files older than `older_than` that no message
    /// links to. Returns how many were removed.
    ///
    /// Blobs go first through the active media handler. If that fails its
    /// error is returned as-is and the rows are kept, so the next run retries
    /// the same files.
    pub fn delete_unused(&self, older_than: DateTime<Utc>, limit: usize) -> Result<usize> {
        let adapter = self.store.adapter();

        let unused = adapter.file_find_unused(older_than, limit)?;
        if unused.is_empty() {
            return Ok(0);
        }

        let media = self
            .store
            .registries()
            .media_handler()
            .ok_or_else(|| StoreError::config("no active media handler"))?;

        let fids: Vec<Uid> = unused.iter().map(|fd| fd.id).collect();
        media.delete(&fids)?;
        adapter.file_delete(&fids)?;

        debug!("Removed {} unused file(s)", fids.len());
        Ok(fids.len())
    }
}
