use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use parley_types::{FileDef, Uid, UploadStatus, time_now};

use super::{OptionalExt, as_params, placeholders};
use crate::models::{FILE_COLS, file_from_row};

pub(crate) fn start_upload(conn: &Connection, fd: &FileDef) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO files (id, created_at, updated_at, user_id, status, mime_type, size, location)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            fd.id.to_string(),
            fd.created_at,
            fd.updated_at,
            fd.user.to_string(),
            fd.status.as_str(),
            fd.mime_type,
            fd.size,
            fd.location,
        ],
    )?;
    Ok(())
}

/// `QueryReturnedNoRows` when the upload does not exist.
pub(crate) fn finish_upload(conn: &Connection, fid: Uid, status: UploadStatus, size: i64) -> rusqlite::Result<FileDef> {
    conn.query_row(
        &format!(
            "UPDATE files SET status = ?1, size = ?2, updated_at = ?3 WHERE id = ?4 RETURNING {}",
            FILE_COLS
        ),
        params![status.as_str(), size, time_now(), fid.to_string()],
        file_from_row,
    )
}

pub(crate) fn get(conn: &Connection, fid: Uid) -> rusqlite::Result<Option<FileDef>> {
    conn.query_row(
        &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLS),
        [fid.to_string()],
        file_from_row,
    )
    .optional()
}

/// Oldest files created before `older_than` that no message links to.
pub(crate) fn find_unused(conn: &Connection, older_than: DateTime<Utc>, limit: usize) -> rusqlite::Result<Vec<FileDef>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM files f
         WHERE f.created_at < ?1
           AND NOT EXISTS (SELECT 1 FROM filemsglinks l WHERE l.file_id = f.id)
         ORDER BY f.created_at
         LIMIT ?2",
        FILE_COLS
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt
        .query_map(params![older_than, limit], file_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn delete(conn: &Connection, fids: &[Uid]) -> rusqlite::Result<()> {
    if fids.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = fids.iter().map(Uid::to_string).collect();
    let sql = format!("DELETE FROM files WHERE id IN ({})", placeholders(1, ids.len()));
    conn.execute(&sql, as_params(&ids).as_slice())?;
    Ok(())
}
