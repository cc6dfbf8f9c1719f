//! Entity shapes shared by the store, its backends and its callers.
//!
//! Nothing in here talks to storage. Backends map these types onto their own
//! rows; the store passes them through unchanged.

pub mod access;
pub mod models;
pub mod ranges;
pub mod uid;
pub mod update;

pub use access::{AccessMode, AuthLevel, DefaultAccess};
pub use models::{
    ATTACHMENTS_HEADER, AuthRecord, Credential, DelMessage, DeviceDef, FileDef, Message, ObjState, QueryOpt,
    Subscription, Topic, UploadStatus, User, time_now,
};
pub use ranges::Range;
pub use uid::{ParseUidError, Uid};
pub use update::{SubUpdate, TopicUpdate, UserUpdate};
