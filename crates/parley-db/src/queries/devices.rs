use std::collections::HashMap;

use rusqlite::{Connection, params};

use parley_types::{DeviceDef, Uid};

use super::{as_params, placeholders};
use crate::models::{DEVICE_COLS, device_from_row};

pub(crate) fn upsert(conn: &Connection, uid: Uid, dev: &DeviceDef) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO devices (user_id, device_id, platform, last_seen, lang)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, device_id) DO UPDATE SET
            platform = excluded.platform,
            last_seen = excluded.last_seen,
            lang = excluded.lang",
        params![uid.to_string(), dev.device_id, dev.platform, dev.last_seen, dev.lang],
    )?;
    Ok(())
}

pub(crate) fn get_all(conn: &Connection, uids: &[Uid]) -> rusqlite::Result<(HashMap<Uid, Vec<DeviceDef>>, usize)> {
    if uids.is_empty() {
        return Ok((HashMap::new(), 0));
    }
    let ids: Vec<String> = uids.iter().map(Uid::to_string).collect();
    let sql = format!(
        "SELECT {} FROM devices WHERE user_id IN ({}) ORDER BY user_id, last_seen DESC",
        DEVICE_COLS,
        placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;

    let mut found: HashMap<Uid, Vec<DeviceDef>> = HashMap::new();
    let mut count = 0;
    for row in stmt.query_map(as_params(&ids).as_slice(), device_from_row)? {
        let (uid, dev) = row?;
        found.entry(uid).or_default().push(dev);
        count += 1;
    }
    Ok((found, count))
}

pub(crate) fn delete(conn: &Connection, uid: Uid, device_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM devices WHERE user_id = ?1 AND device_id = ?2",
        params![uid.to_string(), device_id],
    )?;
    Ok(())
}
