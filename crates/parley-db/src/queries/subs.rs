use rusqlite::types::ToSql;
use rusqlite::{Connection, params};

use parley_types::{QueryOpt, SubUpdate, Subscription, Uid, time_now};

use super::{OptionalExt, execute_update};
use crate::models::{SUB_COLS, opt_uid_text, sub_from_row};

/// Insert a subscription, replacing any earlier one for the same
/// `(topic, user)`, including a deleted one.
pub(crate) fn upsert(conn: &Connection, sub: &Subscription) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO subscriptions (topic, user_id, created_at, updated_at, deleted_at,
            touched_at, mode_want, mode_given, private, del_id, recv_seq_id, read_seq_id, with_user)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            sub.topic,
            sub.user.to_string(),
            sub.created_at,
            sub.updated_at,
            sub.deleted_at,
            sub.touched_at,
            sub.mode_want.bits(),
            sub.mode_given.bits(),
            sub.private,
            sub.del_id,
            sub.recv_seq_id,
            sub.read_seq_id,
            opt_uid_text(sub.with),
        ],
    )?;
    Ok(())
}

/// Store a batch of subscriptions. Run inside a transaction.
pub(crate) fn share(conn: &Connection, subs: &[Subscription]) -> rusqlite::Result<usize> {
    for sub in subs {
        upsert(conn, sub)?;
    }
    Ok(subs.len())
}

pub(crate) fn get(conn: &Connection, topic: &str, user: Uid) -> rusqlite::Result<Option<Subscription>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM subscriptions s WHERE s.topic = ?1 AND s.user_id = ?2",
            SUB_COLS
        ),
        params![topic, user.to_string()],
        sub_from_row,
    )
    .optional()
}

/// Which side of the subscription a listing is keyed on.
pub(crate) enum Key<'a> {
    User(Uid),
    Topic(&'a str),
}

/// Subscriptions of a user or of a topic.
///
/// `join` adds a join clause, e.g. to require a live user row. Deleted
/// subscriptions are skipped unless `keep_deleted`. `if_modified_since` and
/// `limit` of `opts` apply.
pub(crate) fn list(
    conn: &Connection,
    key: Key<'_>,
    join: &str,
    keep_deleted: bool,
    opts: Option<&QueryOpt>,
) -> rusqlite::Result<Vec<Subscription>> {
    let (filter, key_value) = match key {
        Key::User(uid) => ("s.user_id = ?1", uid.to_string()),
        Key::Topic(topic) => ("s.topic = ?1", topic.to_string()),
    };

    let mut sql = format!("SELECT {} FROM subscriptions s {} WHERE {}", SUB_COLS, join, filter);
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(key_value)];

    if !keep_deleted {
        sql.push_str(" AND s.deleted_at IS NULL");
    }
    if let Some(since) = opts.and_then(|o| o.if_modified_since) {
        values.push(Box::new(since));
        sql.push_str(&format!(" AND s.updated_at > ?{}", values.len()));
    }
    sql.push_str(" ORDER BY s.topic, s.user_id");
    if let Some(limit) = opts.and_then(|o| o.limit) {
        values.push(Box::new(limit));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }

    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(refs.as_slice(), sub_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Apply `update` to one subscription, or to every subscription of the
/// topic when `user` is `None`.
pub(crate) fn update(
    conn: &Connection,
    topic: &str,
    user: Option<Uid>,
    update: &SubUpdate,
) -> rusqlite::Result<()> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(at) = update.updated_at {
        sets.push("updated_at");
        values.push(Box::new(at));
    }
    if let Some(mode) = update.mode_want {
        sets.push("mode_want");
        values.push(Box::new(mode.bits()));
    }
    if let Some(mode) = update.mode_given {
        sets.push("mode_given");
        values.push(Box::new(mode.bits()));
    }
    if let Some(private) = &update.private {
        sets.push("private");
        values.push(Box::new(private.clone()));
    }
    if let Some(del_id) = update.del_id {
        sets.push("del_id");
        values.push(Box::new(del_id));
    }
    if let Some(seq) = update.recv_seq_id {
        sets.push("recv_seq_id");
        values.push(Box::new(seq));
    }
    if let Some(seq) = update.read_seq_id {
        sets.push("read_seq_id");
        values.push(Box::new(seq));
    }

    let user_id = user.map(|u| u.to_string());
    let mut keys = vec![("topic", topic)];
    if let Some(user_id) = &user_id {
        keys.push(("user_id", user_id.as_str()));
    }
    execute_update(conn, "subscriptions", &keys, &sets, values)
}

/// Soft delete: the row stays, flagged with `deleted_at`.
pub(crate) fn delete(conn: &Connection, topic: &str, user: Uid) -> rusqlite::Result<()> {
    let now = time_now();
    conn.execute(
        "UPDATE subscriptions SET deleted_at = ?1, updated_at = ?1 WHERE topic = ?2 AND user_id = ?3",
        params![now, topic, user.to_string()],
    )?;
    Ok(())
}

pub(crate) fn delete_for_topic(conn: &Connection, topic: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM subscriptions WHERE topic = ?1", [topic])?;
    Ok(())
}

pub(crate) fn delete_for_user(conn: &Connection, user: Uid) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM subscriptions WHERE user_id = ?1", [user.to_string()])?;
    Ok(())
}
