//! Per-file state machine using `(inode, content digest)` to decide whether a
//! visited file is unchanged, needs reindexing, is a duplicate, or has
//! vanished.

use std::fs;
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::intern::PathDictionary;
use crate::Result;

const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Outcome of visiting a file during a reindex walk.
pub enum Detected {
    /// `stat` failed: the file vanished between walk and stat.
    Vanished,
    /// The path exists but is not a regular file (socket, device, symlink loop).
    NotRegular,
    Changed(ChangeResult),
}

pub struct ChangeResult {
    pub file_id: i64,
    /// Whether the indexer should be run against this file.
    pub reindex: bool,
    /// Whether this visit observed a duplicate set whose content diverged,
    /// requiring a second reindex pass.
    pub need_second_pass: bool,
}

/// Visit a single file, update its `file` row, and decide whether it needs
/// (re)indexing. See spec.md §4.5 for the full state machine.
///
/// Uses `fs::metadata`, which follows symlinks, so a symlink pointing at a
/// regular file is indexed as that file; a broken symlink or one caught in a
/// loop surfaces as an I/O error here and is reported as vanished, same as a
/// file that disappeared between the walk and this stat.
pub fn detect(conn: &Connection, paths: &mut PathDictionary, path: &Path) -> Result<Detected> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return Ok(Detected::Vanished),
    };
    if !meta.is_file() {
        return Ok(Detected::NotRegular);
    }
    let inode = meta.ino() as i64;

    let compressed = paths.compress(conn, &path.to_string_lossy())?;

    let existing: Option<(i64, Option<i64>, Option<Vec<u8>>)> = conn
        .query_row(
            "SELECT id, inode, md5 FROM file WHERE path = ?1",
            params![compressed],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    if let Some((file_id, Some(old_inode), _)) = &existing {
        if *old_inode == inode {
            conn.execute("UPDATE file SET found = 1 WHERE id = ?1", params![file_id])?;
            return Ok(Detected::Changed(ChangeResult {
                file_id: *file_id,
                reindex: false,
                need_second_pass: false,
            }));
        }
    }

    let new_md5 = hash_file(path)?;
    let mut need_second_pass = false;

    let old_md5 = existing.as_ref().and_then(|(_, _, md5)| md5.clone());
    if let Some(old_md5) = &old_md5 {
        let dup_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file WHERE md5 = ?1",
            params![old_md5],
            |row| row.get(0),
        )?;
        if dup_count > 1 && old_md5 != &new_md5 {
            need_second_pass = true;
            conn.execute(
                "UPDATE file SET inode = NULL, md5 = NULL WHERE md5 = ?1",
                params![old_md5],
            )?;
        }
    }

    let duplicated: bool = {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file WHERE md5 = ?1",
            params![new_md5],
            |row| row.get(0),
        )?;
        count > 0
    };

    let file_id = match &existing {
        Some((id, _, _)) => {
            conn.execute(
                "UPDATE file SET md5 = ?1, inode = ?2, found = 1 WHERE id = ?3",
                params![new_md5, inode, id],
            )?;
            *id
        }
        None => {
            conn.execute(
                "INSERT INTO file (path, md5, inode, found) VALUES (?1, ?2, ?3, 1)",
                params![compressed, new_md5, inode],
            )?;
            conn.last_insert_rowid()
        }
    };

    let reindex = if duplicated {
        false
    } else {
        old_md5.as_deref() != Some(new_md5.as_slice())
    };

    Ok(Detected::Changed(ChangeResult {
        file_id,
        reindex,
        need_second_pass,
    }))
}

fn hash_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        ctx.consume(&buf[..read]);
    }
    Ok(ctx.compute().0.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::store::schema::ensure(&conn).unwrap();
        conn
    }

    #[test]
    fn new_file_is_inserted_and_flagged_for_reindex() {
        let conn = conn();
        let mut paths = PathDictionary::new();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"hello").unwrap();

        match detect(&conn, &mut paths, &file_path).unwrap() {
            Detected::Changed(res) => assert!(res.reindex),
            _ => panic!("expected Changed"),
        }
    }

    #[test]
    fn unchanged_inode_short_circuits_without_rehash() {
        let conn = conn();
        let mut paths = PathDictionary::new();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"hello").unwrap();

        detect(&conn, &mut paths, &file_path).unwrap();
        match detect(&conn, &mut paths, &file_path).unwrap() {
            Detected::Changed(res) => assert!(!res.reindex),
            _ => panic!("expected Changed"),
        }
    }

    #[test]
    fn vanished_file_is_reported() {
        let conn = conn();
        let mut paths = PathDictionary::new();
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing.txt");

        assert!(matches!(
            detect(&conn, &mut paths, &file_path).unwrap(),
            Detected::Vanished
        ));
    }

    #[test]
    fn identical_content_is_flagged_duplicate_and_skips_reindex() {
        let conn = conn();
        let mut paths = PathDictionary::new();
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"same content").unwrap();
        fs::write(&b, b"same content").unwrap();

        detect(&conn, &mut paths, &a).unwrap();
        match detect(&conn, &mut paths, &b).unwrap() {
            Detected::Changed(res) => assert!(!res.reindex),
            _ => panic!("expected Changed"),
        }
    }

    #[test]
    fn diverging_duplicate_requests_second_pass() {
        let conn = conn();
        let mut paths = PathDictionary::new();
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"same content").unwrap();
        fs::write(&b, b"same content").unwrap();

        detect(&conn, &mut paths, &a).unwrap();
        detect(&conn, &mut paths, &b).unwrap();

        // `a` diverges. Writing via a rename (as editors typically do) gives
        // the path a fresh inode, which is what defeats the inode
        // short-circuit and forces a rehash.
        let tmp = dir.path().join("a.txt.tmp");
        let mut f = fs::File::create(&tmp).unwrap();
        f.write_all(b"different now").unwrap();
        drop(f);
        fs::rename(&tmp, &a).unwrap();

        match detect(&conn, &mut paths, &a).unwrap() {
            Detected::Changed(res) => {
                assert!(res.reindex);
                assert!(res.need_second_pass);
            }
            _ => panic!("expected Changed"),
        }
    }
}
