//! Row mapping between SQLite columns and the shared entity types.
//!
//! Uids are stored in their text form, access modes as integer bits, enums as
//! lowercase text and structured fields as JSON text.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::Serialize;
use serde_json::{Map, Value};

use parley_types::{
    AccessMode, AuthRecord, Credential, DefaultAccess, DelMessage, DeviceDef, FileDef, Message,
    ObjState, Range, Subscription, Topic, Uid, UploadStatus, User,
};

#[derive(Debug, thiserror::Error)]
#[error("unexpected column value '{0}'")]
struct BadValue(String);

fn conversion<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

// -- Column readers --

fn uid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uid> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion(idx, e))
}

fn opt_uid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) if !text.is_empty() => text.parse().map(Some).map_err(|e| conversion(idx, e)),
        _ => Ok(None),
    }
}

fn mode_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<AccessMode> {
    Ok(AccessMode::from_bits(row.get(idx)?))
}

fn access_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DefaultAccess> {
    Ok(DefaultAccess {
        auth: mode_at(row, idx)?,
        anon: mode_at(row, idx + 1)?,
    })
}

fn tags_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let value: Value = row.get(idx)?;
    serde_json::from_value(value).map_err(|e| conversion(idx, e))
}

fn parsed_at<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| conversion(idx, BadValue(text)))
}

// -- Column writers --

pub(crate) fn json_text<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn opt_uid_text(uid: Option<Uid>) -> Option<String> {
    uid.filter(|u| !u.is_zero()).map(|u| u.to_string())
}

// -- Rows --

pub(crate) const USER_COLS: &str = "id, created_at, updated_at, deleted_at, state, access_auth, \
     access_anon, public, tags, last_seen, user_agent";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uid_at(row, 0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        deleted_at: row.get(3)?,
        state: parsed_at(row, 4, ObjState::parse)?,
        access: access_at(row, 5)?,
        public: row.get(7)?,
        tags: tags_at(row, 8)?,
        last_seen: row.get(9)?,
        user_agent: row.get(10)?,
    })
}

pub(crate) const AUTH_COLS: &str = "uniq, user_id, scheme, auth_level, secret, expires";

pub(crate) fn auth_from_row(row: &Row<'_>) -> rusqlite::Result<AuthRecord> {
    let level: String = row.get(3)?;
    Ok(AuthRecord {
        unique: row.get(0)?,
        user: uid_at(row, 1)?,
        scheme: row.get(2)?,
        auth_level: level.parse().map_err(|e| conversion(3, e))?,
        secret: row.get(4)?,
        expires: row.get(5)?,
    })
}

pub(crate) const CRED_COLS: &str = "user_id, method, value, resp, done, retries, created_at, updated_at";

pub(crate) fn cred_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    Ok(Credential {
        user: uid_at(row, 0)?,
        method: row.get(1)?,
        value: row.get(2)?,
        resp: row.get(3)?,
        done: row.get(4)?,
        retries: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) const TOPIC_COLS: &str = "name, created_at, updated_at, deleted_at, touched_at, owner, \
     access_auth, access_anon, seq_id, del_id, public, tags";

pub(crate) fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        name: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        deleted_at: row.get(3)?,
        touched_at: row.get(4)?,
        owner: uid_at(row, 5)?,
        access: access_at(row, 6)?,
        seq_id: row.get(8)?,
        del_id: row.get(9)?,
        public: row.get(10)?,
        tags: tags_at(row, 11)?,
    })
}

/// Subscription columns, qualified with the `s` alias so they can be
/// selected from joins.
pub(crate) const SUB_COLS: &str = "s.topic, s.user_id, s.created_at, s.updated_at, s.deleted_at, \
     s.touched_at, s.mode_want, s.mode_given, s.private, s.del_id, s.recv_seq_id, s.read_seq_id, \
     s.with_user";

pub(crate) fn sub_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        topic: row.get(0)?,
        user: uid_at(row, 1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        deleted_at: row.get(4)?,
        touched_at: row.get(5)?,
        mode_want: mode_at(row, 6)?,
        mode_given: mode_at(row, 7)?,
        private: row.get(8)?,
        del_id: row.get(9)?,
        recv_seq_id: row.get(10)?,
        read_seq_id: row.get(11)?,
        with: opt_uid_at(row, 12)?,
    })
}

pub(crate) const MESSAGE_COLS: &str = "id, created_at, updated_at, topic, from_user, seq_id, head, content";

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let head = match row.get::<_, Value>(6)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(Message {
        id: uid_at(row, 0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        topic: row.get(3)?,
        from: uid_at(row, 4)?,
        seq_id: row.get(5)?,
        head,
        content: row.get::<_, Option<Value>>(7)?.unwrap_or(Value::Null),
    })
}

pub(crate) const DEL_COLS: &str = "topic, deleted_for, del_id, ranges, created_at, updated_at";

pub(crate) fn del_from_row(row: &Row<'_>) -> rusqlite::Result<DelMessage> {
    let ranges: Value = row.get(3)?;
    Ok(DelMessage {
        topic: row.get(0)?,
        deleted_for: opt_uid_at(row, 1)?,
        del_id: row.get(2)?,
        seq_id_ranges: serde_json::from_value::<Vec<Range>>(ranges).map_err(|e| conversion(3, e))?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) const DEVICE_COLS: &str = "user_id, device_id, platform, last_seen, lang";

pub(crate) fn device_from_row(row: &Row<'_>) -> rusqlite::Result<(Uid, DeviceDef)> {
    let last_seen: DateTime<Utc> = row.get(3)?;
    Ok((
        uid_at(row, 0)?,
        DeviceDef {
            device_id: row.get(1)?,
            platform: row.get(2)?,
            last_seen,
            lang: row.get(4)?,
        },
    ))
}

pub(crate) const FILE_COLS: &str = "id, created_at, updated_at, user_id, status, mime_type, size, location";

pub(crate) fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileDef> {
    Ok(FileDef {
        id: uid_at(row, 0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        user: uid_at(row, 3)?,
        status: parsed_at(row, 4, UploadStatus::parse)?,
        mime_type: row.get(5)?,
        size: row.get(6)?,
        location: row.get(7)?,
    })
}
