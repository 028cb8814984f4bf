//! A local full-text code index and search engine.
//!
//! A project tree is indexed into a single embedded relational database file
//! (named `FINJA`) at its root: files are tokenized with a multi-pass
//! splitter (see the [`tokenise`] and [`normalise`] module documentation),
//! postings are written under a content-addressed change detector that
//! tolerates duplicate/hard-linked files, and a conjunctive query planner
//! (see [`search`]) answers multi-term lookups ordered by token cardinality.
//!
//! [`engine::Engine`] is the single handle threaded through every operation;
//! there is no global mutable state.

pub mod change;
pub mod format;
pub mod normalise;
pub mod reindex;
pub mod search;
pub mod store;
pub mod tokenise;

mod engine;
mod error;
mod indexer;
mod intern;

pub use engine::{find_anchor, Config, Engine};
pub use error::{Error, Result};
pub use indexer::{index_file, Outcome};
pub use intern::{Dictionaries, PathDictionary, TokenDictionary};
