use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::access::{AccessMode, AuthLevel, DefaultAccess};
use crate::ranges::Range;
use crate::uid::Uid;

/// Current time truncated to milliseconds, the precision every backend keeps.
pub fn time_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Soft-delete state of a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjState {
    #[default]
    Ok,
    Deleted,
}

impl ObjState {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjState::Ok => "ok",
            ObjState::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(ObjState::Ok),
            "deleted" => Some(ObjState::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub state: ObjState,
    pub access: DefaultAccess,
    pub public: Option<Value>,
    pub tags: Vec<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub user_agent: String,
}

impl User {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }
}

/// A named conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Last activity. Distinct from `updated_at`, which tracks metadata edits.
    pub touched_at: Option<DateTime<Utc>>,
    pub owner: Uid,
    pub access: DefaultAccess,
    /// Sequence id of the most recent message.
    pub seq_id: i64,
    /// Id of the most recent delete transaction.
    pub del_id: i64,
    pub public: Option<Value>,
    pub tags: Vec<String>,
}

impl Topic {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }

    /// Access the topic grants `uid` by policy: the owner gets everything,
    /// everyone else the authenticated default.
    pub fn access_for(&self, uid: Uid) -> AccessMode {
        if !uid.is_zero() && uid == self.owner {
            AccessMode::FULL
        } else {
            self.access.auth
        }
    }
}

/// Join between a user and a topic. Keyed by `(topic, user)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub topic: String,
    pub user: Uid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub touched_at: Option<DateTime<Utc>>,
    pub mode_want: AccessMode,
    pub mode_given: AccessMode,
    /// Per-user topic metadata, visible only to the subscriber.
    pub private: Option<Value>,
    pub del_id: i64,
    pub recv_seq_id: i64,
    pub read_seq_id: i64,
    /// The other party of a P2P conversation.
    pub with: Option<Uid>,
}

impl Subscription {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }

    pub fn set_touched_at(&mut self, at: DateTime<Utc>) {
        self.touched_at = Some(at);
    }
}

/// Pending or confirmed verification of a contact method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub user: Uid,
    pub method: String,
    pub value: String,
    /// Expected response, e.g. the code sent by email.
    pub resp: String,
    pub done: bool,
    pub retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }
}

/// Authentication record. Backends store `unique` prefixed with the scheme
/// name; the store strips and adds the prefix so callers never see it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub user: Uid,
    pub scheme: String,
    pub unique: String,
    pub auth_level: AuthLevel,
    pub secret: Vec<u8>,
    pub expires: Option<DateTime<Utc>>,
}

/// Header field holding attachment references.
pub const ATTACHMENTS_HEADER: &str = "attachments";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub topic: String,
    pub from: Uid,
    /// Assigned by the backend when the topic counter is bumped.
    pub seq_id: i64,
    pub head: Map<String, Value>,
    pub content: Value,
}

impl Message {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }
}

/// Log entry of one delete transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelMessage {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub topic: String,
    /// Set for a soft delete visible only to this user; `None` deletes for all.
    pub deleted_for: Option<Uid>,
    pub del_id: i64,
    pub seq_id_ranges: Vec<Range>,
}

impl DelMessage {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }
}

/// Push notification token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDef {
    pub device_id: String,
    pub platform: String,
    pub last_seen: DateTime<Utc>,
    pub lang: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Started,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Started => "started",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(UploadStatus::Started),
            "completed" => Some(UploadStatus::Completed),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

/// Metadata of an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDef {
    pub id: Uid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: Uid,
    pub status: UploadStatus,
    pub mime_type: String,
    pub size: i64,
    pub location: String,
}

impl FileDef {
    pub fn init_times(&mut self) {
        let now = time_now();
        self.created_at = now;
        self.updated_at = now;
    }
}

/// Paging and filtering of list queries. Sequence bounds are inclusive
/// (`since`) and exclusive (`before`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOpt {
    pub since: Option<i64>,
    pub before: Option<i64>,
    pub limit: Option<u32>,
    pub if_modified_since: Option<DateTime<Utc>>,
}
