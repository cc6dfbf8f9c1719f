use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, params};
use serde_json::Value;

use parley_types::{DelMessage, Message, QueryOpt, Range, Uid};

use crate::models::{DEL_COLS, MESSAGE_COLS, del_from_row, json_text, message_from_row, opt_uid_text};

pub(crate) fn save(conn: &Connection, msg: &Message) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, created_at, updated_at, topic, from_user, seq_id, head, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            msg.id.to_string(),
            msg.created_at,
            msg.updated_at,
            msg.topic,
            msg.from.to_string(),
            msg.seq_id,
            json_text(&msg.head)?,
            msg.content,
        ],
    )?;
    Ok(())
}

/// Appends `AND col >= ?` / `AND col < ?` for the sequence window of `opts`.
fn seq_window(col: &str, opts: Option<&QueryOpt>, sql: &mut String, values: &mut Vec<Box<dyn ToSql>>) {
    let Some(opts) = opts else { return };
    if let Some(since) = opts.since {
        values.push(Box::new(since));
        sql.push_str(&format!(" AND {} >= ?{}", col, values.len()));
    }
    if let Some(before) = opts.before {
        values.push(Box::new(before));
        sql.push_str(&format!(" AND {} < ?{}", col, values.len()));
    }
}

/// Messages of the topic, newest first, minus the ones `for_user` deleted
/// for themselves.
pub(crate) fn get_all(
    conn: &Connection,
    topic: &str,
    for_user: Uid,
    opts: Option<&QueryOpt>,
) -> rusqlite::Result<Vec<Message>> {
    let mut hidden: Vec<Range> = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT ranges FROM dellog WHERE topic = ?1 AND deleted_for = ?2")?;
        let rows = stmt.query_map(params![topic, for_user.to_string()], |row| row.get::<_, Value>(0))?;
        for ranges in rows {
            let ranges: Vec<Range> = serde_json::from_value(ranges?)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
            hidden.extend(ranges);
        }
    }

    let mut sql = format!("SELECT {} FROM messages WHERE topic = ?1", MESSAGE_COLS);
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(topic.to_string())];
    seq_window("seq_id", opts, &mut sql, &mut values);
    sql.push_str(" ORDER BY seq_id DESC");

    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let limit = opts.and_then(|o| o.limit).map_or(usize::MAX, |l| l as usize);
    let mut msgs = Vec::new();
    for msg in stmt.query_map(refs.as_slice(), message_from_row)? {
        let msg = msg?;
        if hidden.iter().any(|r| r.contains(msg.seq_id)) {
            continue;
        }
        msgs.push(msg);
        if msgs.len() >= limit {
            break;
        }
    }
    Ok(msgs)
}

/// See [`Adapter::message_delete_list`](parley_store::Adapter::message_delete_list).
/// Run inside a transaction.
pub(crate) fn delete_list(conn: &Connection, topic: &str, del: Option<&DelMessage>) -> rusqlite::Result<()> {
    let Some(del) = del else {
        conn.execute("DELETE FROM messages WHERE topic = ?1", [topic])?;
        conn.execute("DELETE FROM dellog WHERE topic = ?1", [topic])?;
        return Ok(());
    };

    if del.deleted_for.is_none() {
        let mut stmt =
            conn.prepare("DELETE FROM messages WHERE topic = ?1 AND seq_id >= ?2 AND seq_id <= ?3")?;
        for r in &del.seq_id_ranges {
            stmt.execute(params![topic, r.low, r.upper()])?;
        }
    }

    conn.execute(
        "INSERT INTO dellog (topic, deleted_for, del_id, ranges, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            topic,
            opt_uid_text(del.deleted_for),
            del.del_id,
            json_text(&del.seq_id_ranges)?,
            del.created_at,
            del.updated_at,
        ],
    )?;
    Ok(())
}

/// Delete records applying to `for_user`: their own soft deletes plus every
/// hard delete. `since`/`before` of `opts` bound the delete id.
pub(crate) fn get_deleted(
    conn: &Connection,
    topic: &str,
    for_user: Uid,
    opts: Option<&QueryOpt>,
) -> rusqlite::Result<Vec<DelMessage>> {
    let mut sql = format!(
        "SELECT {} FROM dellog WHERE topic = ?1 AND (deleted_for IS NULL OR deleted_for = ?2)",
        DEL_COLS
    );
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(topic.to_string()), Box::new(for_user.to_string())];
    seq_window("del_id", opts, &mut sql, &mut values);
    sql.push_str(" ORDER BY del_id");
    if let Some(limit) = opts.and_then(|o| o.limit) {
        values.push(Box::new(limit));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }

    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(refs.as_slice(), del_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Link files to a message. Linking twice is a no-op.
pub(crate) fn attachments(conn: &Connection, msg: Uid, fids: &[Uid]) -> rusqlite::Result<()> {
    let msg = msg.to_string();
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO filemsglinks (file_id, msg_id) VALUES (?1, ?2)")?;
    for fid in fids {
        stmt.execute(params![fid.to_string(), msg])?;
    }
    Ok(())
}
