//! Multi-pass line tokenizer.
//!
//! [`Tokenizer`] runs five passes over each line: a POSITIVE pass that emits
//! maximal runs of `[A-Za-z0-9_]+`, and four NEGATIVE (split) passes with
//! progressively smaller separator alphabets. Running several alphabets over
//! the same text means a compound identifier like `foo_bar` shows up both as
//! one token and as two, which improves recall for both whole-name and
//! split-name queries. Outputs from every pass are unioned into a single set
//! keyed on `(token, line)`, folding duplicates within a line.

use std::collections::HashSet;

use regex::Regex;

use crate::normalise::{self, Normalized};

const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

const SEMANTIC_PUNCT: &[char] = &[
    '~', '^', '$', '&', '#', '%', '=', ',', ':', ';', '!', '?', '+', '"', '\'', '`', '´', '*',
    '/', '\\', '(', ')', '<', '>', '{', '}', '[', ']', '|',
];

const INTERPUNCT_CHARS: &str = "··᛫•‧∘∙⋅●◦⦁⸰・･𐂧ּ⸱";

/// Splits a line into normalized tokens under a configured separator scheme.
pub struct Tokenizer {
    interpunct: bool,
    positive: Regex,
}

impl Tokenizer {
    /// Create a tokenizer. `interpunct` enables the international interpunct
    /// separator set in the negative passes; it must match the `INTERPUNCT`
    /// flag the database was created with.
    pub fn new(interpunct: bool) -> Self {
        Self {
            interpunct,
            positive: Regex::new(r"[A-Za-z0-9_]+").expect("static pattern is valid"),
        }
    }

    /// Separator alphabet for negative pass `idx` (1..=4).
    fn separators(&self, idx: u8) -> HashSet<char> {
        let mut set: HashSet<char> = WHITESPACE.iter().chain(SEMANTIC_PUNCT).copied().collect();
        match idx {
            1 => set.extend("._-".chars()),
            2 => set.extend(".-".chars()),
            3 => set.extend("._".chars()),
            4 => {}
            _ => unreachable!("only passes 1..=4 are negative"),
        }
        if self.interpunct {
            set.extend(INTERPUNCT_CHARS.chars());
        }
        set
    }

    /// Tokenize a single line, returning the set of `(token, line)` pairs it produced.
    pub fn tokenize_line(&self, line: u32, text: &str) -> HashSet<(Normalized, u32)> {
        let mut out = HashSet::new();

        for m in self.positive.find_iter(text) {
            if let Some(token) = normalise::normalize(m.as_str()) {
                out.insert((token, line));
            }
        }

        for pass in 1..=4u8 {
            let separators = self.separators(pass);
            for fragment in text.split(|c| separators.contains(&c)) {
                if let Some(token) = normalise::normalize(fragment) {
                    out.insert((token, line));
                }
            }
        }

        out
    }

    /// Tokenize a sequence of `(line_number, line_text)` pairs, unioning every
    /// line's tokens into one set.
    pub fn tokenize_lines<'a, I>(&self, lines: I) -> HashSet<(Normalized, u32)>
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        let mut out = HashSet::new();
        for (line, text) in lines {
            out.extend(self.tokenize_line(line, text));
        }
        out
    }
}
