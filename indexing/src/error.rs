use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error that can be returned by the indexing and search operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Store errors. Per the error design, these are fatal: they propagate and terminate.
    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    /// I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Walkdir errors encountered while traversing the project tree.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// Raised when no `FINJA` anchor file can be found above the current directory.
    #[error("could not find FINJA in this or any parent directory")]
    NoAnchor,

    /// Raised when a key/value row that should always be present is missing or malformed.
    #[error("database corrupt: key_value row for {0:?} is missing or malformed")]
    MalformedKeyValue(&'static str),
}
