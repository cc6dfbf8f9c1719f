use rusqlite::Connection;
use tracing::info;

/// Schema version this crate reads and writes.
pub const DB_VERSION: i64 = 1;

const TABLES: &[&str] = &[
    "filemsglinks",
    "files",
    "devices",
    "dellog",
    "messages",
    "subscriptions",
    "topics",
    "credentials",
    "auth",
    "users",
    "schema_version",
];

pub fn run(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = version(conn)?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                deleted_at  TEXT,
                state       TEXT NOT NULL DEFAULT 'ok',
                access_auth INTEGER NOT NULL DEFAULT 0,
                access_anon INTEGER NOT NULL DEFAULT 0,
                public      TEXT,
                tags        TEXT NOT NULL DEFAULT '[]',
                last_seen   TEXT,
                user_agent  TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE auth (
                uniq        TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                scheme      TEXT NOT NULL,
                auth_level  TEXT NOT NULL,
                secret      BLOB NOT NULL,
                expires     TEXT,
                UNIQUE(user_id, scheme)
            );

            CREATE TABLE credentials (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                method      TEXT NOT NULL,
                value       TEXT NOT NULL,
                resp        TEXT NOT NULL DEFAULT '',
                done        INTEGER NOT NULL DEFAULT 0,
                retries     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_credentials_user ON credentials(user_id, method);

            CREATE TABLE topics (
                name        TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                deleted_at  TEXT,
                touched_at  TEXT,
                owner       TEXT NOT NULL DEFAULT '',
                access_auth INTEGER NOT NULL DEFAULT 0,
                access_anon INTEGER NOT NULL DEFAULT 0,
                seq_id      INTEGER NOT NULL DEFAULT 0,
                del_id      INTEGER NOT NULL DEFAULT 0,
                public      TEXT,
                tags        TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE subscriptions (
                topic       TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                deleted_at  TEXT,
                touched_at  TEXT,
                mode_want   INTEGER NOT NULL DEFAULT 0,
                mode_given  INTEGER NOT NULL DEFAULT 0,
                private     TEXT,
                del_id      INTEGER NOT NULL DEFAULT 0,
                recv_seq_id INTEGER NOT NULL DEFAULT 0,
                read_seq_id INTEGER NOT NULL DEFAULT 0,
                with_user   TEXT,
                PRIMARY KEY (topic, user_id)
            );

            CREATE INDEX idx_subscriptions_user ON subscriptions(user_id);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                topic       TEXT NOT NULL,
                from_user   TEXT NOT NULL,
                seq_id      INTEGER NOT NULL,
                head        TEXT NOT NULL DEFAULT '{}',
                content     TEXT,
                UNIQUE(topic, seq_id)
            );

            CREATE TABLE dellog (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                topic       TEXT NOT NULL,
                deleted_for TEXT,
                del_id      INTEGER NOT NULL,
                ranges      TEXT NOT NULL DEFAULT '[]',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_dellog_topic ON dellog(topic, del_id);

            CREATE TABLE devices (
                user_id     TEXT NOT NULL,
                device_id   TEXT NOT NULL,
                platform    TEXT NOT NULL DEFAULT '',
                last_seen   TEXT NOT NULL,
                lang        TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (user_id, device_id)
            );

            CREATE TABLE files (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                status      TEXT NOT NULL,
                mime_type   TEXT NOT NULL DEFAULT '',
                size        INTEGER NOT NULL DEFAULT 0,
                location    TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX idx_files_created ON files(created_at);

            CREATE TABLE filemsglinks (
                file_id     TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                msg_id      TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                PRIMARY KEY (file_id, msg_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}

/// Highest migration applied, 0 for an empty database.
pub fn version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
}

/// Drop every table, data included.
pub fn drop_all(conn: &Connection) -> rusqlite::Result<()> {
    for table in TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
    }
    info!("DB: dropped all tables");
    Ok(())
}
