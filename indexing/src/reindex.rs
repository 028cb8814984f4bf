//! Two-pass reindex protocol: walks the project, drives the change detector
//! and indexer over every visited file, and cleans up files that vanished.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::change::{self, Detected};
use crate::engine::Engine;
use crate::indexer;
use crate::Result;

const IGNORE_DIRS: &[&str] = &[".git", ".svn", ".bzr", ".hypothesis", "__pycache__"];
const IGNORE_EXTENSIONS: &[&str] = &["svg", "pyc", "ai", "ps"];

/// File listing files explicitly, skipping the directory walk when present.
pub const EXPLICIT_LIST_FILE: &str = "FINJA.lst";

#[derive(Debug, Clone, Default)]
pub struct ReindexOutcome {
    pub files_visited: usize,
    pub passes_run: usize,
    pub batch_exhausted: bool,
}

/// Run the reindex orchestrator. `on_visit` is called once per visited path,
/// before the change detector runs on it; it's meant for progress reporting,
/// never for mutating shared state (spec.md §5 suspension-point rule).
pub fn run(engine: &mut Engine, on_visit: &mut dyn FnMut(&Path)) -> Result<ReindexOutcome> {
    let mut outcome = ReindexOutcome::default();

    loop {
        outcome.passes_run += 1;
        engine.conn.execute("UPDATE file SET found = 0", [])?;

        let mut saw_divergence = false;

        for path in candidates(&engine.root)? {
            if let Some(limit) = engine.config.batch {
                if limit > 0 && outcome.files_visited >= limit {
                    outcome.batch_exhausted = true;
                    break;
                }
            }

            on_visit(&path);
            outcome.files_visited += 1;

            match change::detect(&engine.conn, &mut engine.dicts.paths, &path)? {
                Detected::Vanished => {
                    warn!(path = %path.display(), "not found, skipping");
                }
                Detected::NotRegular => {
                    warn!(path = %path.display(), "not a plain file, skipping");
                }
                Detected::Changed(result) => {
                    saw_divergence |= result.need_second_pass;
                    if result.reindex {
                        let outcome = indexer::index_file(
                            &engine.conn,
                            &mut engine.dicts,
                            &engine.tokenizer,
                            result.file_id,
                            &path,
                        )?;
                        info!(path = %path.display(), ?outcome, "indexed");
                    }
                }
            }
        }

        if outcome.batch_exhausted {
            // Leave `found` flags and any pending vanished-file cleanup for the
            // next invocation: we haven't walked the whole tree this pass.
            break;
        }

        let vanished: i64 = engine.conn.query_row(
            "SELECT COUNT(*) FROM file WHERE found = 0",
            [],
            |row| row.get(0),
        )?;
        if vanished > 0 {
            engine.conn.execute(
                "DELETE FROM finja WHERE file_id IN (SELECT id FROM file WHERE found = 0)",
                [],
            )?;
            engine.conn.execute("DELETE FROM file WHERE found = 0", [])?;
        }

        if !saw_divergence && vanished == 0 {
            break;
        }
    }

    Ok(outcome)
}

/// Enumerate the paths a reindex pass should visit: either the explicit list
/// in `FINJA.lst`, or a pruned walk of the project tree.
fn candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let list_file = root.join(EXPLICIT_LIST_FILE);
    if list_file.is_file() {
        let contents = fs::read_to_string(&list_file)?;
        return Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                let p = Path::new(l);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    root.join(p)
                }
            })
            .collect());
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if is_ignored_extension(entry.path()) {
            continue;
        }
        out.push(entry.path().to_path_buf());
    }
    Ok(out)
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| IGNORE_DIRS.contains(&name))
            .unwrap_or(false)
}

fn is_ignored_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IGNORE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
