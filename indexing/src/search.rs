//! Compiles a conjunctive multi-term query into a single relational query,
//! ordering terms by cardinality and applying path-exclusion predicates.

use rusqlite::types::Value;
use rusqlite::Connection;
use tracing::{instrument, trace};

use crate::intern::{PathDictionary, TokenDictionary};
use crate::normalise;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Match tokens anywhere within a file, regardless of line.
    File,
    /// Match tokens that all appear on the same line.
    Line,
}

/// A single result row. `line` is `None` in file-mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub file_id: i64,
    pub path: Vec<u8>,
    pub line: Option<i64>,
    pub encoding: String,
}

/// Run a conjunctive search for `queries`, excluding any path containing a
/// segment in `pignore`. Returns an empty result, not an error, if any query
/// token was never interned (spec.md §4.8 step 1).
#[instrument(skip(conn, tokens, paths), fields(queries = ?queries, ?mode))]
pub fn run(
    conn: &Connection,
    tokens: &mut TokenDictionary,
    paths: &mut PathDictionary,
    queries: &[String],
    pignore: &[String],
    mode: Mode,
) -> Result<Vec<Hit>> {
    let mut token_ids = Vec::with_capacity(queries.len());
    for q in queries {
        let Some(normalized) = normalise::normalize(q) else {
            return Ok(Vec::new());
        };
        match tokens.lookup(conn, &normalized)? {
            Some(id) => token_ids.push(id),
            None => return Ok(Vec::new()),
        }
    }
    if token_ids.is_empty() {
        return Ok(Vec::new());
    }

    // Order ascending by cardinality so the join drives off the most
    // selective term first.
    let mut with_cardinality = Vec::with_capacity(token_ids.len());
    for id in token_ids {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM finja WHERE token_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        with_cardinality.push((id, count));
    }
    with_cardinality.sort_by_key(|&(_, count)| count);
    let ordered_ids: Vec<u32> = with_cardinality.into_iter().map(|(id, _)| id).collect();

    let mut pignore_hex = Vec::with_capacity(pignore.len());
    for segment in pignore {
        pignore_hex.push(paths.segment_hex(conn, segment)?);
    }

    let sql = compile(ordered_ids.len(), pignore_hex.len(), mode);

    let mut args: Vec<Value> = ordered_ids.iter().map(|&id| Value::from(id as i64)).collect();
    for hex in &pignore_hex {
        args.push(Value::from(format!("%{hex}%")));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args), |row| {
        Ok(Hit {
            path: row.get(0)?,
            file_id: row.get(1)?,
            line: match mode {
                Mode::File => None,
                Mode::Line => Some(row.get(2)?),
            },
            encoding: match mode {
                Mode::File => String::new(),
                Mode::Line => row.get(3)?,
            },
        })
    })?;

    let hits: Vec<Hit> = rows.collect::<rusqlite::Result<_>>()?;
    trace!(hits = hits.len(), "search complete");
    Ok(hits)
}

/// Compile the SQL for `n` ordered token ids and `m` ignore patterns, per
/// spec.md §4.8. The first term drives the join (`i`); remaining terms
/// (`i_1..i_{n-1}`) join on `file_id`, plus `line` when not in file-mode.
fn compile(n: usize, m: usize, mode: Mode) -> String {
    let projection = match mode {
        Mode::File => "f.path, f.id",
        Mode::Line => "f.path, f.id, i.line, f.encoding",
    };

    let mut sql = format!("SELECT DISTINCT {projection} FROM finja AS i JOIN file AS f ON i.file_id = f.id");

    for k in 1..n {
        sql.push_str(&format!(" JOIN finja AS i_{k} ON i.file_id = i_{k}.file_id"));
        if mode == Mode::Line {
            sql.push_str(&format!(" AND i.line = i_{k}.line"));
        }
    }

    sql.push_str(" WHERE i.token_id = ?1");
    for k in 1..n {
        sql.push_str(&format!(" AND i_{k}.token_id = ?{}", k + 1));
    }
    for j in 0..m {
        sql.push_str(&format!(" AND hex(f.path) NOT LIKE ?{}", n + j + 1));
    }

    sql
}
