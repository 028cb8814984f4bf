//! Two-way intern table for path segments.
//!
//! Each stored file path is a packed array of little-endian `u32` segment ids;
//! typical source trees have deep but highly repetitive paths, so interning
//! segments compresses `file.path` rows substantially versus storing the full
//! path text per row.

use std::collections::HashMap;
use std::path::MAIN_SEPARATOR;

use rusqlite::{params, Connection, OptionalExtension};

use crate::Result;

pub struct PathDictionary {
    forward: HashMap<String, u32>,
    backward: HashMap<u32, String>,
}

impl PathDictionary {
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            backward: HashMap::new(),
        }
    }

    fn id_for_segment(&mut self, conn: &Connection, segment: &str) -> Result<u32> {
        if let Some(&id) = self.forward.get(segment) {
            return Ok(id);
        }
        if let Some(id) = conn
            .query_row(
                "SELECT id FROM path_token WHERE string = ?1",
                params![segment],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            let id = id as u32;
            self.forward.insert(segment.to_owned(), id);
            self.backward.insert(id, segment.to_owned());
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO path_token (string) VALUES (?1)",
            params![segment],
        )?;
        let id = conn.last_insert_rowid() as u32;
        self.forward.insert(segment.to_owned(), id);
        self.backward.insert(id, segment.to_owned());
        Ok(id)
    }

    fn segment_for_id(&mut self, conn: &Connection, id: u32) -> Result<String> {
        if let Some(segment) = self.backward.get(&id) {
            return Ok(segment.clone());
        }
        let segment: String = conn.query_row(
            "SELECT string FROM path_token WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        self.forward.insert(segment.clone(), id);
        self.backward.insert(id, segment.clone());
        Ok(segment)
    }

    /// Split `path` by the host separator, intern each segment, and pack the
    /// ids into a contiguous little-endian `u32` array.
    pub fn compress(&mut self, conn: &Connection, path: &str) -> Result<Vec<u8>> {
        let mut packed = Vec::new();
        for segment in path.split(MAIN_SEPARATOR) {
            if segment.is_empty() {
                continue;
            }
            let id = self.id_for_segment(conn, segment)?;
            packed.extend_from_slice(&id.to_le_bytes());
        }
        Ok(packed)
    }

    /// Reverse [`PathDictionary::compress`].
    pub fn decompress(&mut self, conn: &Connection, packed: &[u8]) -> Result<String> {
        let mut segments = Vec::with_capacity(packed.len() / 4);
        for chunk in packed.chunks_exact(4) {
            let id = u32::from_le_bytes(chunk.try_into().expect("chunks_exact(4)"));
            segments.push(self.segment_for_id(conn, id)?);
        }
        Ok(segments.join(&MAIN_SEPARATOR.to_string()))
    }

    /// Hex-encode (upper-case) the packed id of a single path segment, for
    /// the `--pignore` exclusion filter's `hex(file.path) NOT LIKE '%...%'`
    /// predicate. Exact because ids are fixed-width 32-bit little-endian.
    pub fn segment_hex(&mut self, conn: &Connection, segment: &str) -> Result<String> {
        let id = self.id_for_segment(conn, segment)?;
        Ok(hex::encode_upper(id.to_le_bytes()))
    }

    pub fn cache_len(&self) -> usize {
        self.forward.len()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
    }
}

impl Default for PathDictionary {
    fn default() -> Self {
        Self::new()
    }
}
