//! Runs the tokenizer over a changed file's content and writes its postings
//! under a single transaction.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Instant;

use rusqlite::params;
use tracing::{instrument, trace, warn};

use crate::intern::Dictionaries;
use crate::tokenise::Tokenizer;
use crate::Result;

/// What happened when indexing a single changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Tokens were extracted and postings written.
    Indexed { encoding: &'static str, tokens: usize },
    /// The binary-detector predicate flagged the file; no postings were produced.
    Binary,
    /// UTF-8 decoding failed, and the encoding sniffer could not recover it either.
    DecodeFailed,
}

/// Index a single file that the change detector authorized a reindex for.
///
/// `file_id` must already exist in `file`. On success, this deletes the
/// file's existing postings and replaces them with the freshly tokenized set,
/// atomically with the token-dictionary flush, inside one transaction.
#[instrument(skip(dicts, tokenizer), fields(path = %path.display()))]
pub fn index_file(
    conn: &rusqlite::Connection,
    dicts: &mut Dictionaries,
    tokenizer: &Tokenizer,
    file_id: i64,
    path: &Path,
) -> Result<Outcome> {
    let start = Instant::now();
    let bytes = fs::read(path)?;

    if content_inspector::inspect(&bytes).is_binary() {
        warn!("is binary, skipping");
        return Ok(Outcome::Binary);
    }

    let Some((text, encoding)) = decode(&bytes) else {
        warn!("decoding failed");
        return Ok(Outcome::DecodeFailed);
    };

    let postings: HashSet<_> = tokenizer.tokenize_lines(
        text.lines()
            .enumerate()
            .map(|(i, line)| ((i + 1) as u32, line)),
    );

    let mut resolved: HashSet<(u32, u32)> = HashSet::with_capacity(postings.len());
    for (token, line) in &postings {
        let id = dicts.tokens.id_for(conn, token)?;
        resolved.insert((id, *line));
    }

    let tx = conn.unchecked_transaction()?;
    dicts.tokens.commit(&tx)?;
    tx.execute("DELETE FROM finja WHERE file_id = ?1", params![file_id])?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO finja (token_id, file_id, line) VALUES (?1, ?2, ?3)")?;
        for (token_id, line) in &resolved {
            stmt.execute(params![token_id, file_id, line])?;
        }
    }
    tx.execute(
        "UPDATE file SET encoding = ?1 WHERE id = ?2",
        params![encoding, file_id],
    )?;
    tx.commit()?;

    dicts.maybe_clear();

    trace!(duration = ?start.elapsed(), tokens = resolved.len(), "indexed a file");

    Ok(Outcome::Indexed {
        encoding,
        tokens: resolved.len(),
    })
}

/// Decode `bytes` as UTF-8, falling back to a sniffed encoding. Returns
/// `None` if neither decode succeeds.
fn decode(bytes: &[u8]) -> Option<(String, &'static str)> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some((s.to_owned(), "utf-8"));
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return None;
    }
    Some((text.into_owned(), encoding.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::tempdir;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::schema::ensure(&conn).unwrap();
        conn
    }

    fn insert_file_row(conn: &Connection, path: &str) -> i64 {
        conn.execute(
            "INSERT INTO file (path, found) VALUES (?1, 1)",
            params![path.as_bytes()],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn indexing_a_text_file_writes_postings() {
        let conn = conn();
        let mut dicts = Dictionaries::new(&conn, 1 << 20).unwrap();
        let tokenizer = Tokenizer::new(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello world\nfoo bar\n").unwrap();
        let file_id = insert_file_row(&conn, "a.txt");

        let outcome = index_file(&conn, &mut dicts, &tokenizer, file_id, &path).unwrap();
        assert!(matches!(outcome, Outcome::Indexed { .. }));

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM finja WHERE file_id = ?1",
                params![file_id],
                |r| r.get(0),
            )
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn reindexing_twice_without_change_is_idempotent() {
        let conn = conn();
        let mut dicts = Dictionaries::new(&conn, 1 << 20).unwrap();
        let tokenizer = Tokenizer::new(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello world\n").unwrap();
        let file_id = insert_file_row(&conn, "a.txt");

        index_file(&conn, &mut dicts, &tokenizer, file_id, &path).unwrap();
        let first: Vec<(i64, i64)> = conn
            .prepare("SELECT token_id, line FROM finja WHERE file_id = ?1 ORDER BY token_id, line")
            .unwrap()
            .query_map(params![file_id], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        index_file(&conn, &mut dicts, &tokenizer, file_id, &path).unwrap();
        let second: Vec<(i64, i64)> = conn
            .prepare("SELECT token_id, line FROM finja WHERE file_id = ?1 ORDER BY token_id, line")
            .unwrap()
            .query_map(params![file_id], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn binary_files_are_skipped() {
        let conn = conn();
        let mut dicts = Dictionaries::new(&conn, 1 << 20).unwrap();
        let tokenizer = Tokenizer::new(false);
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, [0u8, 1, 2, 0, 3, 0, 0, 0, 4]).unwrap();
        let file_id = insert_file_row(&conn, "a.bin");

        let outcome = index_file(&conn, &mut dicts, &tokenizer, file_id, &path).unwrap();
        assert_eq!(outcome, Outcome::Binary);
    }
}
