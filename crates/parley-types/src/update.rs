//! Typed partial updates. `None` leaves a field untouched.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::access::{AccessMode, DefaultAccess};
use crate::models::ObjState;
use crate::uid::Uid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub updated_at: Option<DateTime<Utc>>,
    pub state: Option<ObjState>,
    pub access: Option<DefaultAccess>,
    pub public: Option<Value>,
    pub tags: Option<Vec<String>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicUpdate {
    pub updated_at: Option<DateTime<Utc>>,
    pub touched_at: Option<DateTime<Utc>>,
    pub owner: Option<Uid>,
    pub access: Option<DefaultAccess>,
    pub public: Option<Value>,
    pub tags: Option<Vec<String>>,
    pub del_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubUpdate {
    pub updated_at: Option<DateTime<Utc>>,
    pub mode_want: Option<AccessMode>,
    pub mode_given: Option<AccessMode>,
    pub private: Option<Value>,
    pub del_id: Option<i64>,
    pub recv_seq_id: Option<i64>,
    pub read_seq_id: Option<i64>,
}

impl TopicUpdate {
    pub fn del_id(del_id: i64) -> Self {
        Self { del_id: Some(del_id), ..Default::default() }
    }
}

impl SubUpdate {
    pub fn del_id(del_id: i64) -> Self {
        Self { del_id: Some(del_id), ..Default::default() }
    }
}
