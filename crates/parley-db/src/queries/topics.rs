use rusqlite::types::ToSql;
use rusqlite::{Connection, params};

use parley_types::{AccessMode, DefaultAccess, Message, Subscription, Topic, TopicUpdate};

use super::{OptionalExt, as_params, execute_update, placeholders, prefixed, tags_match};
use crate::models::{TOPIC_COLS, json_text, topic_from_row};
use crate::queries::subs;

pub(crate) fn create(conn: &Connection, topic: &Topic) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO topics (name, created_at, updated_at, deleted_at, touched_at, owner,
            access_auth, access_anon, seq_id, del_id, public, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            topic.name,
            topic.created_at,
            topic.updated_at,
            topic.deleted_at,
            topic.touched_at,
            topic.owner.to_string(),
            topic.access.auth.bits(),
            topic.access.anon.bits(),
            topic.seq_id,
            topic.del_id,
            topic.public,
            json_text(&topic.tags)?,
        ],
    )?;
    Ok(())
}

/// P2P topic row plus both subscriptions. Run inside a transaction.
pub(crate) fn create_p2p(
    conn: &Connection,
    initiator: &Subscription,
    invited: &Subscription,
) -> rusqlite::Result<()> {
    let topic = Topic {
        name: initiator.topic.clone(),
        created_at: initiator.created_at,
        updated_at: initiator.updated_at,
        touched_at: initiator.touched_at,
        access: DefaultAccess {
            auth: AccessMode::P2P,
            anon: AccessMode::NONE,
        },
        ..Default::default()
    };
    create(conn, &topic)?;
    subs::upsert(conn, initiator)?;
    subs::upsert(conn, invited)?;
    Ok(())
}

pub(crate) fn get(conn: &Connection, name: &str) -> rusqlite::Result<Option<Topic>> {
    conn.query_row(
        &format!("SELECT {} FROM topics WHERE name = ?1", TOPIC_COLS),
        [name],
        topic_from_row,
    )
    .optional()
}

pub(crate) fn delete(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM topics WHERE name = ?1", [name])?;
    Ok(())
}

/// Bump the topic's message counter and stamp `touched_at`. Returns the new
/// sequence id; `QueryReturnedNoRows` when the topic does not exist.
pub(crate) fn update_on_message(conn: &Connection, msg: &Message) -> rusqlite::Result<i64> {
    conn.query_row(
        "UPDATE topics SET seq_id = seq_id + 1, touched_at = ?1 WHERE name = ?2 RETURNING seq_id",
        params![msg.created_at, msg.topic],
        |row| row.get(0),
    )
}

pub(crate) fn update(conn: &Connection, name: &str, update: &TopicUpdate) -> rusqlite::Result<()> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(at) = update.updated_at {
        sets.push("updated_at");
        values.push(Box::new(at));
    }
    if let Some(at) = update.touched_at {
        sets.push("touched_at");
        values.push(Box::new(at));
    }
    if let Some(owner) = update.owner {
        sets.push("owner");
        values.push(Box::new(owner.to_string()));
    }
    if let Some(access) = update.access {
        sets.push("access_auth");
        values.push(Box::new(access.auth.bits()));
        sets.push("access_anon");
        values.push(Box::new(access.anon.bits()));
    }
    if let Some(public) = &update.public {
        sets.push("public");
        values.push(Box::new(public.clone()));
    }
    if let Some(tags) = &update.tags {
        sets.push("tags");
        values.push(Box::new(json_text(tags)?));
    }
    if let Some(del_id) = update.del_id {
        sets.push("del_id");
        values.push(Box::new(del_id));
    }

    execute_update(conn, "topics", &[("name", name)], &sets, values)
}

/// Live topics carrying the tags, formatted as subscriptions.
pub(crate) fn find(
    conn: &Connection,
    required: &[String],
    optional: &[String],
) -> rusqlite::Result<Vec<Subscription>> {
    let all_tags: Vec<String> = required.iter().chain(optional).cloned().collect();
    if all_tags.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT DISTINCT {} FROM topics tp, json_each(tp.tags) t
         WHERE tp.deleted_at IS NULL AND t.value IN ({})
         ORDER BY tp.name",
        prefixed(TOPIC_COLS, "tp"),
        placeholders(1, all_tags.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let topics = stmt
        .query_map(as_params(&all_tags).as_slice(), topic_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(topics
        .into_iter()
        .filter(|t| tags_match(&t.tags, required, optional))
        .map(|t| Subscription {
            topic: t.name,
            created_at: t.created_at,
            updated_at: t.updated_at,
            touched_at: t.touched_at,
            ..Default::default()
        })
        .collect())
}
