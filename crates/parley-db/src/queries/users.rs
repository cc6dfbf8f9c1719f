use rusqlite::{Connection, params};
use rusqlite::types::ToSql;

use parley_types::{ObjState, Subscription, Uid, User, UserUpdate, time_now};

use super::{OptionalExt, as_params, execute_update, placeholders, prefixed, tags_match};
use crate::models::{USER_COLS, json_text, user_from_row};

pub(crate) fn create(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, created_at, updated_at, deleted_at, state, access_auth, access_anon,
            public, tags, last_seen, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.id.to_string(),
            user.created_at,
            user.updated_at,
            user.deleted_at,
            user.state.as_str(),
            user.access.auth.bits(),
            user.access.anon.bits(),
            user.public,
            json_text(&user.tags)?,
            user.last_seen,
            user.user_agent,
        ],
    )?;
    Ok(())
}

pub(crate) fn get(conn: &Connection, uid: Uid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        [uid.to_string()],
        user_from_row,
    )
    .optional()
}

pub(crate) fn get_all(conn: &Connection, uids: &[Uid]) -> rusqlite::Result<Vec<User>> {
    if uids.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<String> = uids.iter().map(Uid::to_string).collect();
    let sql = format!(
        "SELECT {} FROM users WHERE id IN ({}) ORDER BY id",
        USER_COLS,
        placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(as_params(&ids).as_slice(), user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn delete(conn: &Connection, uid: Uid, soft: bool) -> rusqlite::Result<()> {
    if soft {
        let now = time_now();
        conn.execute(
            "UPDATE users SET state = ?1, deleted_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![ObjState::Deleted.as_str(), now, uid.to_string()],
        )?;
    } else {
        conn.execute("DELETE FROM users WHERE id = ?1", [uid.to_string()])?;
    }
    Ok(())
}

pub(crate) fn update(conn: &Connection, uid: Uid, update: &UserUpdate) -> rusqlite::Result<()> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(at) = update.updated_at {
        sets.push("updated_at");
        values.push(Box::new(at));
    }
    if let Some(state) = update.state {
        sets.push("state");
        values.push(Box::new(state.as_str()));
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
    if let Some(at) = update.last_seen {
        sets.push("last_seen");
        values.push(Box::new(at));
    }
    if let Some(ua) = &update.user_agent {
        sets.push("user_agent");
        values.push(Box::new(ua.clone()));
    }

    execute_update(conn, "users", &[("id", &uid.to_string())], &sets, values)
}

/// Active users carrying any of the tags, minus `uid` itself. Results are
/// filtered to those holding every `required` tag and, when `optional` is
/// not empty, at least one of those.
pub(crate) fn find(
    conn: &Connection,
    uid: Uid,
    required: &[String],
    optional: &[String],
) -> rusqlite::Result<Vec<Subscription>> {
    let all_tags: Vec<String> = required.iter().chain(optional).cloned().collect();
    if all_tags.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT DISTINCT {} FROM users u, json_each(u.tags) t
         WHERE u.state = 'ok' AND u.id != ?1 AND t.value IN ({})
         ORDER BY u.id",
        prefixed(USER_COLS, "u"),
        placeholders(2, all_tags.len())
    );
    let mut params: Vec<&dyn ToSql> = vec![];
    let me = uid.to_string();
    params.push(&me);
    params.extend(as_params(&all_tags));

    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params.as_slice(), user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(users
        .into_iter()
        .filter(|u| tags_match(&u.tags, required, optional))
        .map(|u| Subscription {
            topic: u.id.user_id(),
            user: uid,
            created_at: u.created_at,
            updated_at: u.updated_at,
            with: Some(u.id),
            ..Default::default()
        })
        .collect())
}
