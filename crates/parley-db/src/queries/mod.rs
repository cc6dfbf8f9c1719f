//! SQL for each entity area. Every function takes a connection (or an open
//! transaction) and returns raw `rusqlite` results; [`crate::Database`] maps
//! the errors.

pub(crate) mod auth;
pub(crate) mod devices;
pub(crate) mod files;
pub(crate) mod messages;
pub(crate) mod subs;
pub(crate) mod topics;
pub(crate) mod users;

use rusqlite::Connection;
use rusqlite::types::ToSql;

/// `?1, ?2, ...` for an `IN (...)` list of `n` values starting at `first`.
pub(crate) fn placeholders(first: usize, n: usize) -> String {
    (first..first + n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn as_params(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// `UPDATE table SET col = ?, ... WHERE key = ? AND ...`. No-op when nothing
/// is set.
pub(crate) fn execute_update(
    conn: &Connection,
    table: &str,
    keys: &[(&str, &str)],
    sets: &[&str],
    mut values: Vec<Box<dyn ToSql>>,
) -> rusqlite::Result<()> {
    if sets.is_empty() {
        return Ok(());
    }
    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    let conditions: Vec<String> = keys
        .iter()
        .enumerate()
        .map(|(i, (col, _))| format!("{} = ?{}", col, sets.len() + i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        conditions.join(" AND ")
    );
    values.extend(keys.iter().map(|(_, key)| Box::new(key.to_string()) as Box<dyn ToSql>));
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, refs.as_slice())?;
    Ok(())
}

pub(crate) fn tags_match(tags: &[String], required: &[String], optional: &[String]) -> bool {
    required.iter().all(|t| tags.contains(t))
        && (optional.is_empty() || optional.iter().any(|t| tags.contains(t)))
}

/// Qualify every column of a comma separated list with `alias.`.
pub(crate) fn prefixed(cols: &str, alias: &str) -> String {
    cols.split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
