//! Result formatting primitives: duplicate resolution, context-block
//! extraction, and the raw/human-readable rendering split.
//!
//! This module only computes the strings to print; it does not touch stdout
//! itself, so it can be unit-tested without capturing output (that wiring is
//! the CLI's job).

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection};

use crate::search::Hit;
use crate::Result;

/// Placeholder substituted for a context line that could not be read back off
/// disk (spec.md §7: "File read I/O error during context display").
pub const UNREADABLE_LINE: &str = "!! File not found ";

/// Paths of other files sharing this file's content, for the `duplicates:`
/// section of file-mode output.
pub fn duplicates_of(conn: &Connection, file_id: i64) -> Result<Vec<Vec<u8>>> {
    let md5: Option<Vec<u8>> = conn.query_row(
        "SELECT md5 FROM file WHERE id = ?1",
        params![file_id],
        |row| row.get(0),
    )?;
    let Some(md5) = md5 else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare("SELECT path FROM file WHERE md5 = ?1 AND id != ?2")?;
    let rows = stmt.query_map(params![md5, file_id], |row| row.get(0))?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Sort file-mode hits by decompressed path, descending.
pub fn sort_file_hits(hits: &mut [(String, Hit)]) {
    hits.sort_by(|a, b| b.0.cmp(&a.0));
}

/// Sort line-mode hits by `(path desc, line desc)`.
pub fn sort_line_hits(hits: &mut [(String, Hit)]) {
    hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.line.cmp(&a.1.line)));
}

/// A block of context lines around a single match, already trimmed of
/// leading/trailing blank lines per spec.md §4.9.
pub struct ContextBlock {
    pub lines: Vec<String>,
    /// Index within `lines` of the matched line.
    pub matched_index: usize,
}

/// Read `context` lines of text centered on `line` (1-indexed) from the
/// decompressed path `root`/`rel_path`. Unreadable lines (including the
/// whole file being gone) are replaced with [`UNREADABLE_LINE`] rather than
/// failing the whole search.
pub fn read_context(root: &Path, rel_path: &str, line: i64, context: u32) -> ContextBlock {
    let full = root.join(rel_path);
    let text = fs::read_to_string(&full).ok();

    let line = line.max(1) as usize;
    let half = (context.saturating_sub(1) / 2) as usize;
    let start = line.saturating_sub(half).max(1);
    let end = start + context.saturating_sub(1) as usize;

    let mut lines = Vec::new();
    for n in start..=end {
        let text_line = text
            .as_deref()
            .and_then(|t| t.lines().nth(n - 1))
            .map(str::to_owned)
            .unwrap_or_else(|| UNREADABLE_LINE.to_owned());
        lines.push(text_line);
    }

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let matched_index = line.saturating_sub(start).min(lines.len().saturating_sub(1));
    ContextBlock { lines, matched_index }
}

/// Render a single line-mode match as `path:line:text`, the form used when
/// `context == 1` or `raw` is set.
pub fn render_single_line(path: &str, line: i64, text: &str, raw: bool) -> String {
    if raw {
        format!("{path}\0{line}\0{text}")
    } else {
        format!("{path}:{line}:{text}")
    }
}
