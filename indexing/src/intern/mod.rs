//! Write-through dictionaries and their shared cache bound.

pub mod path_dict;
pub mod token_dict;

pub use path_dict::PathDictionary;
pub use token_dict::TokenDictionary;

use rusqlite::Connection;

use crate::Result;

/// Default cache bound, in entries, shared across both dictionaries.
pub const DEFAULT_CACHE_SIZE: usize = 1 << 20;

/// Bundles the token and path dictionaries and enforces the combined cache
/// bound described in spec.md §4.3: once the two dictionaries together exceed
/// `cache_size` entries, both are cleared. This is safe because both are
/// write-through; only lookup latency is affected until the caches warm again.
pub struct Dictionaries {
    pub tokens: TokenDictionary,
    pub paths: PathDictionary,
    cache_size: usize,
}

impl Dictionaries {
    pub fn new(conn: &Connection, cache_size: usize) -> Result<Self> {
        Ok(Self {
            tokens: TokenDictionary::load(conn)?,
            paths: PathDictionary::new(),
            cache_size,
        })
    }

    /// Clear both dictionaries if their combined size exceeds the cache bound.
    /// Only call this when no inserts are pending (e.g. right after a commit).
    pub fn maybe_clear(&mut self) {
        if self.tokens.cache_len() + self.paths.cache_len() > self.cache_size {
            self.tokens.clear();
            self.paths.clear();
        }
    }
}
