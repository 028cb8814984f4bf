//! Opens and bootstraps the embedded relational store.
//!
//! The store itself (a transactional SQL engine with B-tree indexes) is an
//! external collaborator: this module only owns the schema and the small
//! key/value accessors layered on top of it.

pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::{Error, Result};

/// Name of the anchor file / database at the project root.
pub const ANCHOR_FILE: &str = "FINJA";

/// Open (or create) the store at `root`.
///
/// If `create` is false and no `FINJA` file exists at `root`, returns
/// [`Error::NoAnchor`].
pub fn open(root: &Path, create: bool) -> Result<Connection> {
    let db_path: PathBuf = root.join(ANCHOR_FILE);
    let existed = db_path.is_file();
    if !existed && !create {
        return Err(Error::NoAnchor);
    }
    let conn = Connection::open(&db_path)?;
    schema::ensure(&conn)?;
    Ok(conn)
}

pub fn get_kv(conn: &Connection, key: i64) -> Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM key_value WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn set_kv(conn: &Connection, key: i64, value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO key_value (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Read the `INTERPUNCT` flag, defaulting to `false` for a freshly created store.
pub fn get_interpunct(conn: &Connection) -> Result<bool> {
    Ok(get_kv(conn, schema::KV_INTERPUNCT)?
        .map(|bytes| bytes.first() == Some(&1))
        .unwrap_or(false))
}

/// Persist the `INTERPUNCT` flag. Must only be called once, at database creation:
/// the flag is immutable for the life of the database.
pub fn set_interpunct(conn: &Connection, enabled: bool) -> Result<()> {
    set_kv(conn, schema::KV_INTERPUNCT, &[enabled as u8])
}
