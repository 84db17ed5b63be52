use crate::grammar::TerminalId;
use compact_str::CompactString;

/// What a token is: one of the grammar's terminals, or end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Terminal(TerminalId),
    Eof,
}

/// One lexed token: its terminal id and the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: CompactString,
}

impl Token {
    pub(crate) fn eof() -> Self {
        Self {
            kind: TokenKind::Eof,
            text: CompactString::default(),
        }
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
