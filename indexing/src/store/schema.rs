//! DDL for the on-disk `FINJA` database.
//!
//! Table names match the persisted schema named in the external interfaces:
//! `finja` (postings), `token`, `path_token`, `file`, `key_value`.

use rusqlite::Connection;

use crate::Result;

pub fn ensure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS finja (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            token_id INTEGER NOT NULL,
            file_id  INTEGER NOT NULL,
            line     INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS finja_token_id_idx ON finja (token_id);
        CREATE INDEX IF NOT EXISTS finja_file_idx ON finja (file_id);

        CREATE TABLE IF NOT EXISTS token (
            id     INTEGER PRIMARY KEY,
            string BLOB NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS path_token (
            id     INTEGER PRIMARY KEY AUTOINCREMENT,
            string TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS file (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            path     BLOB NOT NULL UNIQUE,
            md5      BLOB,
            inode    INTEGER,
            found    INTEGER NOT NULL DEFAULT 1,
            encoding TEXT NOT NULL DEFAULT 'utf-8'
        );
        CREATE INDEX IF NOT EXISTS file_md5_idx ON file (md5);

        CREATE TABLE IF NOT EXISTS key_value (
            key   INTEGER PRIMARY KEY,
            value BLOB NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// `key_value.key` enumerants (spec.md §6).
pub const KV_INTERPUNCT: i64 = 0;
pub const KV_MAX_ID: i64 = 1;
