//! # Configured Lexer
//!
//! The runtime lexer drives the matcher list from a binary artifact over
//! a forward-buffered stream. It exposes exactly the contract the
//! runtime parser needs:
//!
//! - [`Lexer::read_next_expect`] - try the candidate matchers at the
//!   current position, keep the longest match (lowest matcher id on
//!   ties), and make it the current token. Whitespace is skipped first;
//!   end of input becomes the EOF token. No candidate matching is an
//!   [`ParseError::IncompleteToken`].
//! - [`Lexer::read_next_expect_eof`] - succeed only if the input is
//!   exhausted (after trailing whitespace).
//! - [`Lexer::current`] - inspect without advancing.
//!
//! Within one `read_next_expect` call, matcher results are memoized by
//! index so regex-exclude probes never re-run a matcher.

mod token;

pub use token::{Token, TokenKind};

use crate::error::{ArtifactError, ParseError};
use crate::grammar::{Terminal, TerminalId};
use crate::regex::Regex;
use crate::stream::SourceStream;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::io::Read;

/// A compiled terminal matcher.
#[derive(Debug)]
pub enum Matcher {
    /// Byte-for-byte literal comparison.
    Literal(CompactString),
    /// Longest-prefix regex match.
    Regex(Regex),
    /// Matches the regex unless one of the excluded matchers matches the
    /// same prefix.
    RegexExclude {
        regex: Regex,
        excludes: SmallVec<[TerminalId; 4]>,
    },
}

impl Matcher {
    /// Compile a matcher from its serialized terminal form.
    pub fn from_terminal(terminal: &Terminal) -> Result<Self, ArtifactError> {
        Ok(match terminal {
            Terminal::Literal(text) => Self::Literal(text.clone()),
            Terminal::Regex(pattern) => Self::Regex(Regex::new(pattern)?),
            Terminal::RegexExclude { pattern, excludes } => Self::RegexExclude {
                regex: Regex::new(pattern)?,
                excludes: excludes.clone(),
            },
        })
    }
}

/// Per-call memo of matcher outcomes: matched end position or failure.
#[derive(Default)]
struct MatchState {
    cache: HashMap<TerminalId, Option<usize>>,
}

/// Run one matcher against the stream, memoized. On success the stream
/// is left at the match end; on failure its position is unspecified and
/// the caller restores its own mark.
fn run_matcher<R: Read>(
    matchers: &[Matcher],
    state: &mut MatchState,
    index: TerminalId,
    stream: &mut SourceStream<R>,
) -> bool {
    if let Some(&cached) = state.cache.get(&index) {
        return match cached {
            Some(end) => {
                stream.seek(end);
                true
            }
            None => false,
        };
    }
    let matched = match &matchers[index] {
        Matcher::Literal(text) => text.as_bytes().iter().all(|&b| stream.bump() == Some(b)),
        Matcher::Regex(regex) => regex.matches_stream(stream),
        Matcher::RegexExclude { regex, excludes } => {
            let start = stream.position();
            if regex.matches_stream(stream) {
                let end = stream.position();
                let mut excluded = false;
                for &exclude in excludes {
                    stream.seek(start);
                    if run_matcher(matchers, state, exclude, stream)
                        && stream.position() == end
                    {
                        excluded = true;
                        break;
                    }
                }
                stream.seek(end);
                !excluded
            } else {
                false
            }
        }
    };
    state
        .cache
        .insert(index, matched.then(|| stream.position()));
    matched
}

/// The configured lexer: a matcher list over a buffered input stream.
pub struct Lexer<R> {
    stream: SourceStream<R>,
    matchers: Vec<Matcher>,
    current: Token,
}

impl<R: Read> Lexer<R> {
    pub fn new(matchers: Vec<Matcher>, input: R) -> Self {
        Self {
            stream: SourceStream::new(input),
            matchers,
            current: Token::eof(),
        }
    }

    /// Compile the matcher list of `terminals` and wrap `input`.
    pub fn from_terminals(terminals: &[Terminal], input: R) -> Result<Self, ArtifactError> {
        let matchers = terminals
            .iter()
            .map(Matcher::from_terminal)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(matchers, input))
    }

    /// The token most recently read.
    #[must_use]
    pub const fn current(&self) -> &Token {
        &self.current
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.stream.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.stream.bump();
        }
    }

    /// Advance to the next token, trying only the given candidate
    /// matchers. Candidates are expected in ascending id order; on
    /// equal-length matches the first candidate wins.
    pub fn read_next_expect(
        &mut self,
        candidates: impl IntoIterator<Item = TerminalId>,
    ) -> Result<(), ParseError> {
        self.skip_whitespace();
        self.stream.shrink_to_position();
        if self.stream.peek().is_none() {
            self.current = Token::eof();
            return Ok(());
        }

        let mut state = MatchState::default();
        let start = self.stream.position();
        let mut best: Option<(TerminalId, usize)> = None;
        for index in candidates {
            if run_matcher(&self.matchers, &mut state, index, &mut self.stream) {
                let end = self.stream.position();
                if best.is_none_or(|(_, best_end)| end > best_end) {
                    best = Some((index, end));
                }
            }
            self.stream.seek(start);
        }

        let Some((index, end)) = best else {
            return Err(ParseError::IncompleteToken {
                pos: self.stream.absolute_position(),
            });
        };
        self.stream.seek(end);
        self.current = Token {
            kind: TokenKind::Terminal(index),
            text: CompactString::from(String::from_utf8_lossy(self.stream.consumed_bytes())),
        };
        self.stream.shrink_to_position();
        Ok(())
    }

    /// Require end of input; trailing whitespace is allowed.
    pub fn read_next_expect_eof(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.stream.peek() {
            None => {
                self.current = Token::eof();
                Ok(())
            }
            Some(byte) => Err(ParseError::ExtraToken {
                found: char::from(byte).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(text: &str) -> Matcher {
        Matcher::Literal(CompactString::from(text))
    }

    fn regex(pattern: &str) -> Matcher {
        Matcher::Regex(Regex::new(pattern).expect("pattern should compile"))
    }

    #[test]
    fn test_longest_match_wins() {
        let mut lexer = Lexer::new(vec![literal("le"), literal("let")], "let".as_bytes());
        lexer.read_next_expect([0, 1]).unwrap();
        assert_eq!(lexer.current().kind, TokenKind::Terminal(1));
        assert_eq!(lexer.current().text, "let");
    }

    #[test]
    fn test_equal_length_tie_goes_to_lowest_id() {
        let mut lexer = Lexer::new(
            vec![literal("let"), regex("/[a-z]+/")],
            "let rest".as_bytes(),
        );
        lexer.read_next_expect([0, 1]).unwrap();
        assert_eq!(lexer.current().kind, TokenKind::Terminal(0));
        assert_eq!(lexer.current().text, "let");
    }

    #[test]
    fn test_whitespace_is_skipped() {
        let mut lexer = Lexer::new(vec![literal("a")], "  \n\ta".as_bytes());
        lexer.read_next_expect([0]).unwrap();
        assert_eq!(lexer.current().text, "a");
    }

    #[test]
    fn test_eof_token_at_end_of_input() {
        let mut lexer = Lexer::new(vec![literal("a")], "a  ".as_bytes());
        lexer.read_next_expect([0]).unwrap();
        lexer.read_next_expect([0]).unwrap();
        assert!(lexer.current().is_eof());
        assert!(lexer.read_next_expect_eof().is_ok());
    }

    #[test]
    fn test_no_match_is_incomplete_token() {
        let mut lexer = Lexer::new(vec![literal("a")], "b".as_bytes());
        assert!(matches!(
            lexer.read_next_expect([0]),
            Err(ParseError::IncompleteToken { pos: 0 })
        ));
    }

    #[test]
    fn test_extra_input_fails_eof_expectation() {
        let mut lexer = Lexer::new(vec![literal("a")], " b".as_bytes());
        assert!(matches!(
            lexer.read_next_expect_eof(),
            Err(ParseError::ExtraToken { .. })
        ));
    }

    #[test]
    fn test_regex_exclude_rejects_keyword() {
        let matchers = vec![
            Matcher::RegexExclude {
                regex: Regex::new("/[a-z]+/").unwrap(),
                excludes: SmallVec::from_slice(&[1]),
            },
            literal("let"),
        ];
        // "let" is exactly the excluded keyword.
        let mut lexer = Lexer::new(matchers, "let".as_bytes());
        assert!(matches!(
            lexer.read_next_expect([0]),
            Err(ParseError::IncompleteToken { .. })
        ));
    }

    #[test]
    fn test_regex_exclude_allows_longer_identifier() {
        let matchers = vec![
            Matcher::RegexExclude {
                regex: Regex::new("/[a-z]+/").unwrap(),
                excludes: SmallVec::from_slice(&[1]),
            },
            literal("let"),
        ];
        // "letx" shares only a proper prefix with the keyword.
        let mut lexer = Lexer::new(matchers, "letx".as_bytes());
        lexer.read_next_expect([0]).unwrap();
        assert_eq!(lexer.current().kind, TokenKind::Terminal(0));
        assert_eq!(lexer.current().text, "letx");
    }

    #[test]
    fn test_successive_tokens_shrink_the_buffer() {
        let mut lexer = Lexer::new(
            vec![literal("+"), regex("/[0-9]+/")],
            "12+34".as_bytes(),
        );
        lexer.read_next_expect([0, 1]).unwrap();
        assert_eq!(lexer.current().text, "12");
        lexer.read_next_expect([0, 1]).unwrap();
        assert_eq!(lexer.current().text, "+");
        lexer.read_next_expect([0, 1]).unwrap();
        assert_eq!(lexer.current().text, "34");
    }
}
