use rusqlite::{Connection, params};

use parley_types::{AuthRecord, Credential, Uid, time_now};

use super::OptionalExt;
use crate::models::{AUTH_COLS, CRED_COLS, auth_from_row, cred_from_row};

// -- Auth records --

pub(crate) fn get_unique(conn: &Connection, unique: &str) -> rusqlite::Result<Option<AuthRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM auth WHERE uniq = ?1", AUTH_COLS),
        [unique],
        auth_from_row,
    )
    .optional()
}

pub(crate) fn get(conn: &Connection, uid: Uid, scheme: &str) -> rusqlite::Result<Option<AuthRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM auth WHERE user_id = ?1 AND scheme = ?2", AUTH_COLS),
        params![uid.to_string(), scheme],
        auth_from_row,
    )
    .optional()
}

pub(crate) fn add(conn: &Connection, rec: &AuthRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO auth (uniq, user_id, scheme, auth_level, secret, expires)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rec.unique,
            rec.user.to_string(),
            rec.scheme,
            rec.auth_level.as_str(),
            rec.secret,
            rec.expires,
        ],
    )?;
    Ok(())
}

/// Replace the record the user holds for `rec.scheme`.
pub(crate) fn update(conn: &Connection, rec: &AuthRecord) -> rusqlite::Result<()> {
    let changed = conn.execute(
        "UPDATE auth SET uniq = ?1, auth_level = ?2, secret = ?3, expires = ?4
         WHERE user_id = ?5 AND scheme = ?6",
        params![
            rec.unique,
            rec.auth_level.as_str(),
            rec.secret,
            rec.expires,
            rec.user.to_string(),
            rec.scheme,
        ],
    )?;
    if changed == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    Ok(())
}

pub(crate) fn del_scheme(conn: &Connection, uid: Uid, scheme: &str) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM auth WHERE user_id = ?1 AND scheme = ?2",
        params![uid.to_string(), scheme],
    )?;
    Ok(())
}

pub(crate) fn del_all(conn: &Connection, uid: Uid) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM auth WHERE user_id = ?1", [uid.to_string()])
}

// -- Credentials --

/// Store a validation request, replacing an unconfirmed one for the same
/// method.
pub(crate) fn cred_add(conn: &Connection, cred: &Credential) -> rusqlite::Result<()> {
    let user = cred.user.to_string();
    conn.execute(
        "DELETE FROM credentials WHERE user_id = ?1 AND method = ?2 AND done = 0",
        params![user, cred.method],
    )?;
    conn.execute(
        "INSERT INTO credentials (user_id, method, value, resp, done, retries, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user,
            cred.method,
            cred.value,
            cred.resp,
            cred.done,
            cred.retries,
            cred.created_at,
            cred.updated_at,
        ],
    )?;
    Ok(())
}

/// Mark the pending request for `method` as done. It replaces the value
/// confirmed earlier for the same method, if any. Run inside a transaction.
pub(crate) fn cred_confirm(conn: &Connection, uid: Uid, method: &str) -> rusqlite::Result<()> {
    let user = uid.to_string();
    let pending: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM credentials WHERE user_id = ?1 AND method = ?2 AND done = 0)",
        params![user, method],
        |row| row.get(0),
    )?;
    if !pending {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }

    conn.execute(
        "DELETE FROM credentials WHERE user_id = ?1 AND method = ?2 AND done = 1",
        params![user, method],
    )?;
    conn.execute(
        "UPDATE credentials SET done = 1, updated_at = ?1
         WHERE user_id = ?2 AND method = ?3 AND done = 0",
        params![time_now(), user, method],
    )?;
    Ok(())
}

pub(crate) fn cred_fail(conn: &Connection, uid: Uid, method: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE credentials SET retries = retries + 1, updated_at = ?1
         WHERE user_id = ?2 AND method = ?3 AND done = 0",
        params![time_now(), uid.to_string(), method],
    )?;
    Ok(())
}

pub(crate) fn cred_get(conn: &Connection, uid: Uid, method: Option<&str>) -> rusqlite::Result<Vec<Credential>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM credentials
         WHERE user_id = ?1 AND done = 1 AND (?2 IS NULL OR method = ?2)
         ORDER BY id",
        CRED_COLS
    ))?;
    let rows = stmt
        .query_map(params![uid.to_string(), method], cred_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn cred_del(conn: &Connection, uid: Uid, method: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM credentials WHERE user_id = ?1 AND (?2 IS NULL OR method = ?2)",
        params![uid.to_string(), method],
    )?;
    Ok(())
}
