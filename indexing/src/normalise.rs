//! Canonicalizes a raw lexeme into the byte form stored in the token dictionary.
//!
//! Short lexemes (length 2–16) are kept verbatim, lowercased, for cheap equality
//! in the dictionary. Longer lexemes collapse to a fixed-width MD5 digest so
//! dictionary rows stay bounded in size; collisions are an accepted residual
//! risk because a search query normalises the same way.

/// Canonical form of a normalised token.
///
/// Both variants are compared and stored as their [`Normalized::as_bytes`]
/// representation; the distinction only matters for understanding how a given
/// dictionary row was produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Normalized {
    /// A short lexeme (2–16 bytes), lowercased.
    Lexeme(String),
    /// The 16-byte MD5 digest of a longer lowercased lexeme.
    Digest([u8; 16]),
}

impl Normalized {
    /// The bytes that are persisted in `token.string` and compared for uniqueness.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Normalized::Lexeme(s) => s.as_bytes(),
            Normalized::Digest(d) => d,
        }
    }
}

/// Normalise a raw lexeme.
///
/// Returns `None` if the trimmed input is shorter than 2 characters (no token).
pub fn normalize(s: &str) -> Option<Normalized> {
    let trimmed = s.trim();
    if trimmed.chars().count() < 2 {
        return None;
    }

    let lower = trimmed.to_lowercase();
    if lower.len() <= 16 {
        Some(Normalized::Lexeme(lower))
    } else {
        let digest = md5::compute(lower.as_bytes());
        Some(Normalized::Digest(digest.0))
    }
}
