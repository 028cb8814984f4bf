//! Ties the store, dictionaries, and tokenizer together behind one handle,
//! and owns the upward walk that locates a project's `FINJA` anchor.
//!
//! This replaces the global mutable state (connection cache, current args,
//! second-pass flag) that a script-style implementation would reach for, with
//! a single explicit value threaded through every operation (spec.md §9).

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::intern::{Dictionaries, DEFAULT_CACHE_SIZE};
use crate::store;
use crate::tokenise::Tokenizer;
use crate::{Error, Result};

/// User-tunable knobs, gathered from the CLI surface (spec.md §6).
#[derive(Debug, Clone)]
pub struct Config {
    /// Cap on files processed in one reindex invocation; `None` is unlimited.
    pub batch: Option<usize>,
    /// Divides the dictionary cache bound by 100 (`--less-memory`).
    pub less_memory: bool,
    /// Enables the interpunct separator set. Only meaningful at database
    /// creation; ignored (and overridden by the stored flag) when opening an
    /// existing database.
    pub interpunct: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch: None,
            less_memory: false,
            interpunct: false,
        }
    }
}

impl Config {
    pub fn effective_cache_size(&self) -> usize {
        if self.less_memory {
            DEFAULT_CACHE_SIZE / 100
        } else {
            DEFAULT_CACHE_SIZE
        }
    }
}

/// Bundles the open store connection, its write-through dictionaries, and a
/// tokenizer configured to match how the store was created.
pub struct Engine {
    pub root: PathBuf,
    pub conn: Connection,
    pub dicts: Dictionaries,
    pub tokenizer: Tokenizer,
    pub config: Config,
}

impl Engine {
    /// Create a fresh store at `root` (or open it if `FINJA` already exists
    /// there), honoring `config.interpunct` only on first creation.
    pub fn create(root: &Path, config: Config) -> Result<Self> {
        let is_new = !root.join(store::ANCHOR_FILE).is_file();
        let conn = store::open(root, true)?;
        if is_new {
            store::set_interpunct(&conn, config.interpunct)?;
        }
        Self::assemble(root, conn, config)
    }

    /// Open an existing store, searching upward from `start` for the `FINJA`
    /// anchor. Fails with [`Error::NoAnchor`] if none is found.
    pub fn open(start: &Path, config: Config) -> Result<Self> {
        let root = find_anchor(start)?;
        let conn = store::open(&root, false)?;
        Self::assemble(&root, conn, config)
    }

    fn assemble(root: &Path, conn: Connection, config: Config) -> Result<Self> {
        let interpunct = store::get_interpunct(&conn)?;
        let cache_size = config.effective_cache_size();
        let dicts = Dictionaries::new(&conn, cache_size)?;
        Ok(Self {
            root: root.to_path_buf(),
            conn,
            dicts,
            tokenizer: Tokenizer::new(interpunct),
            config,
        })
    }

    /// Wire the store's progress callback (fired roughly every 1,000,000
    /// virtual-machine steps) to `callback`, for spinner rendering. Per
    /// spec.md §5, `callback` must never mutate shared state.
    pub fn set_progress_handler(&self, callback: impl FnMut() -> bool + Send + 'static) {
        self.conn.progress_handler(1_000_000, Some(callback));
    }

    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }
}

/// Walk upward from `start` looking for a `FINJA` anchor file, per spec.md §6.
pub fn find_anchor(start: &Path) -> Result<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(store::ANCHOR_FILE).is_file() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(Error::NoAnchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn find_anchor_walks_upward_from_a_nested_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(store::ANCHOR_FILE), b"").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_anchor(&nested).unwrap();
        assert_eq!(found, dir.path());
    }

    #[test]
    fn find_anchor_fails_without_an_anchor() {
        let dir = tempdir().unwrap();
        assert!(matches!(find_anchor(dir.path()), Err(Error::NoAnchor)));
    }

    #[test]
    fn create_then_open_preserves_the_interpunct_flag() {
        let dir = tempdir().unwrap();
        {
            let engine = Engine::create(
                dir.path(),
                Config {
                    interpunct: true,
                    ..Config::default()
                },
            )
            .unwrap();
            assert!(store::get_interpunct(&engine.conn).unwrap());
        }

        let engine = Engine::open(dir.path(), Config::default()).unwrap();
        assert!(store::get_interpunct(&engine.conn).unwrap());
    }

    #[test]
    fn less_memory_divides_cache_bound_by_a_hundred() {
        let config = Config {
            less_memory: true,
            ..Config::default()
        };
        assert_eq!(config.effective_cache_size(), DEFAULT_CACHE_SIZE / 100);
    }
}
