//! Write-through intern table mapping a normalized token to its integer id.
//!
//! New ids are assigned monotonically off a `MAX_ID` counter persisted in
//! `key_value`, so ids never collide across sessions. Inserts are buffered in
//! memory and only become durable rows when [`TokenDictionary::commit`] runs
//! inside the caller's transaction.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::{normalise::Normalized, store, Result};

/// Any id below this is reserved for future sentinel use; `MAX_ID` starts here
/// on a fresh database. Open question (b) in the design notes: the exact
/// value is arbitrary, it only needs to exceed the count of `key_value`
/// enumerants.
const INITIAL_MAX_ID: u32 = 8;

pub struct TokenDictionary {
    cache: HashMap<Vec<u8>, u32>,
    pending: Vec<(u32, Vec<u8>)>,
    max_id: u32,
}

impl TokenDictionary {
    /// Load `MAX_ID` from `key_value`, seeding it if absent.
    pub fn load(conn: &Connection) -> Result<Self> {
        let max_id = match store::get_kv(conn, store::schema::KV_MAX_ID)? {
            Some(bytes) if bytes.len() == 4 => {
                u32::from_le_bytes(bytes.try_into().expect("checked len == 4"))
            }
            Some(_) => INITIAL_MAX_ID,
            None => INITIAL_MAX_ID,
        };
        Ok(Self {
            cache: HashMap::new(),
            pending: Vec::new(),
            max_id,
        })
    }

    /// Resolve a token to its id, assigning a fresh one (buffered, not yet
    /// durable) if this is the first time it has been seen.
    pub fn id_for(&mut self, conn: &Connection, token: &Normalized) -> Result<u32> {
        let key = token.as_bytes().to_vec();
        if let Some(&id) = self.cache.get(&key) {
            return Ok(id);
        }

        if let Some(id) = conn
            .query_row(
                "SELECT id FROM token WHERE string = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            let id = id as u32;
            self.cache.insert(key, id);
            return Ok(id);
        }

        self.max_id += 1;
        let id = self.max_id;
        self.pending.push((id, key.clone()));
        self.cache.insert(key, id);
        Ok(id)
    }

    /// Look up a token without interning it. Used by search, where a query
    /// token that was never indexed must yield no matches rather than a
    /// freshly minted id.
    pub fn lookup(&mut self, conn: &Connection, token: &Normalized) -> Result<Option<u32>> {
        let key = token.as_bytes().to_vec();
        if let Some(&id) = self.cache.get(&key) {
            return Ok(Some(id));
        }
        let found = conn
            .query_row(
                "SELECT id FROM token WHERE string = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if let Some(id) = found {
            let id = id as u32;
            self.cache.insert(key, id);
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }

    /// Flush pending inserts and persist the new `MAX_ID`. Must run inside a
    /// transaction, before any posting referencing a newly assigned id
    /// becomes visible. Returns the number of rows written.
    pub fn commit(&mut self, conn: &Connection) -> Result<usize> {
        let written = self.pending.len();
        {
            let mut stmt = conn.prepare("INSERT INTO token (id, string) VALUES (?1, ?2)")?;
            for (id, bytes) in self.pending.drain(..) {
                stmt.execute(params![id, bytes])?;
            }
        }
        store::set_kv(conn, store::schema::KV_MAX_ID, &self.max_id.to_le_bytes())?;
        Ok(written)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Clear the in-memory cache. Correctness is unaffected because the
    /// dictionary is write-through; only call this once any pending inserts
    /// have been committed.
    pub fn clear(&mut self) {
        debug_assert!(self.pending.is_empty(), "clear with uncommitted inserts");
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalise;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::schema::ensure(&conn).unwrap();
        conn
    }

    #[test]
    fn assigns_monotonic_ids_and_caches() {
        let conn = conn();
        let mut dict = TokenDictionary::load(&conn).unwrap();

        let hello = normalise::normalize("hello").unwrap();
        let world = normalise::normalize("world").unwrap();

        let id1 = dict.id_for(&conn, &hello).unwrap();
        let id2 = dict.id_for(&conn, &world).unwrap();
        assert_ne!(id1, id2);

        // repeat lookups are stable and hit the cache
        assert_eq!(dict.id_for(&conn, &hello).unwrap(), id1);
    }

    #[test]
    fn commit_persists_pending_rows_and_max_id() {
        let conn = conn();
        let mut dict = TokenDictionary::load(&conn).unwrap();
        let hello = normalise::normalize("hello").unwrap();
        let id = dict.id_for(&conn, &hello).unwrap();

        dict.commit(&conn).unwrap();

        let stored: i64 = conn
            .query_row(
                "SELECT id FROM token WHERE string = ?1",
                params![hello.as_bytes()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(stored as u32, id);

        let max_id_bytes = store::get_kv(&conn, store::schema::KV_MAX_ID).unwrap().unwrap();
        assert_eq!(u32::from_le_bytes(max_id_bytes.try_into().unwrap()), id);
    }

    #[test]
    fn ids_never_collide_across_sessions() {
        let conn = conn();
        {
            let mut dict = TokenDictionary::load(&conn).unwrap();
            let hello = normalise::normalize("hello").unwrap();
            dict.id_for(&conn, &hello).unwrap();
            dict.commit(&conn).unwrap();
        }
        // A fresh dictionary reloaded against the same connection must not
        // reuse an id already assigned in the previous "session".
        let mut dict2 = TokenDictionary::load(&conn).unwrap();
        let world = normalise::normalize("world").unwrap();
        let new_id = dict2.id_for(&conn, &world).unwrap();

        let hello_id: i64 = conn
            .query_row(
                "SELECT id FROM token WHERE string = ?1",
                params![normalise::normalize("hello").unwrap().as_bytes()],
                |r| r.get(0),
            )
            .unwrap();
        assert_ne!(new_id as i64, hello_id);
    }

    #[test]
    fn lookup_does_not_mint_new_ids() {
        let conn = conn();
        let mut dict = TokenDictionary::load(&conn).unwrap();
        let unseen = normalise::normalize("neverindexed").unwrap();
        assert_eq!(dict.lookup(&conn, &unseen).unwrap(), None);
        assert_eq!(dict.cache_len(), 0);
    }
}
