//! # Regex Engine
//!
//! A small NFA-backed regex engine used twice in this crate: to tokenize
//! grammar terminals at build time and as the terminal-matching primitive
//! of the generated lexer at parse time.
//!
//! ## Supported syntax
//!
//! - literals, `.` (any byte), `\` escapes (`\n` is newline, anything
//!   else is itself)
//! - character classes `[...]` with ranges and `^` negation
//! - grouping `(...)`, single-token alternation `|` (group multi-token
//!   branches)
//! - quantifiers `*`, `+`, `?`; all greedy by default, the whole pattern
//!   becomes lazy with a trailing `U` after the closing delimiter
//! - zero-width lookahead `(?=...)` and negative lookahead `(?!...)`
//!
//! Patterns are conventionally written with `/` delimiters, matching
//! their spelling in grammar files: `/[a-z]+/`, `/a*/U`.
//!
//! ## Matching model
//!
//! Matching is a set-of-states walk over the compiled epsilon-NFA,
//! deterministic with respect to the automaton and its input. Greedy
//! matching consumes the longest accepting prefix; lazy matching stops at
//! the shortest. A failed match is a `false` result, never an error. The
//! engine reads from a [`Controller`], which supplies bytes and supports
//! mark/rewind so speculative probes (alternation arms, lookaheads)
//! leave the source where they found it.

mod ast;
mod nfa;

use crate::error::GrammarError;
use crate::stream::SourceStream;
use compact_str::CompactString;
use nfa::{Nfa, StateId};
use std::io::Read;

/// A byte source the match engine can probe and rewind.
pub trait Controller {
    fn peek(&mut self) -> Option<u8>;
    fn bump(&mut self) -> Option<u8>;
    fn mark(&self) -> usize;
    fn rewind(&mut self, mark: usize);
}

impl<R: Read> Controller for SourceStream<R> {
    fn peek(&mut self) -> Option<u8> {
        SourceStream::peek(self)
    }

    fn bump(&mut self) -> Option<u8> {
        SourceStream::bump(self)
    }

    fn mark(&self) -> usize {
        self.position()
    }

    fn rewind(&mut self, mark: usize) {
        self.seek(mark);
    }
}

/// Controller over an in-memory string.
struct StrController<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Controller for StrController<'_> {
    fn peek(&mut self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn mark(&self) -> usize {
        self.pos
    }

    fn rewind(&mut self, mark: usize) {
        self.pos = mark;
    }
}

/// A compiled regular expression.
///
/// Immutable after construction; matching only needs `&self`, so one
/// compiled regex may back any number of matchers.
#[derive(Debug, Clone)]
pub struct Regex {
    source: CompactString,
    nfa: Nfa,
    start: StateId,
    greedy: bool,
}

impl Regex {
    /// Compile a pattern. Malformed patterns report a syntax error with
    /// the offending byte position.
    pub fn new(pattern: &str) -> Result<Self, GrammarError> {
        let (tokens, greedy) = ast::parse(pattern)?;
        let (nfa, start) = Nfa::compile(&tokens);
        Ok(Self {
            source: CompactString::from(pattern),
            nfa,
            start,
            greedy,
        })
    }

    /// The original pattern text, delimiters included.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Match against a string, anchored at its start.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        let mut controller = StrController {
            bytes: text.as_bytes(),
            pos: 0,
        };
        self.nfa.run(self.start, &mut controller, self.greedy)
    }

    /// Match against a string and report how many bytes the match
    /// consumed.
    #[must_use]
    pub fn match_prefix(&self, text: &str) -> Option<usize> {
        let mut controller = StrController {
            bytes: text.as_bytes(),
            pos: 0,
        };
        if self.nfa.run(self.start, &mut controller, self.greedy) {
            Some(controller.pos)
        } else {
            None
        }
    }

    /// Match against a buffered stream, leaving it positioned at the end
    /// of the match. On failure the stream position is unspecified; the
    /// caller restores its own mark.
    pub fn matches_stream<R: Read>(&self, stream: &mut SourceStream<R>) -> bool {
        self.nfa.run(self.start, stream, self.greedy)
    }
}
