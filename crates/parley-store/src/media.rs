use parley_types::Uid;

use crate::error::Result;

/// Upload/download backend for attachments.
pub trait MediaHandler: Send + Sync {
    /// Configure the handler from its JSON blob.
    fn init(&self, config: &str) -> Result<()>;

    /// File id referenced by a download URL, or [`Uid::ZERO`] when the URL is
    /// not one of ours.
    fn get_id_from_url(&self, url: &str) -> Uid;

    /// Remove stored blobs. Failures are reported as
    /// [`StoreError::External`](crate::StoreError::External).
    fn delete(&self, fids: &[Uid]) -> Result<()>;
}
