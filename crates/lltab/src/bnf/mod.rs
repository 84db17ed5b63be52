//! # BNF Frontend
//!
//! Parses the grammar source language into a [`Grammar`]:
//!
//! ```text
//! (* comment *)
//! Expr = Expr "+" Term | Term ;
//! Term = /[0-9]+/ ;
//! Ident = [/[a-z]+/ Keywords] ;
//! Keywords = "let" | "if" ;
//! ```
//!
//! `=` defines, `|` separates alternatives (each becomes its own
//! production), `;` terminates. Right-hand symbols are bare identifiers
//! (nonterminals), `"..."` string terminals (the empty string is
//! epsilon), `/.../` regex terminals (a trailing `U` keeps the lazy
//! marker with the pattern), and `[/.../ Name]` regex-exclude terminals
//! whose exclusion list is resolved to the string terminals on `Name`'s
//! right-hand sides.
//!
//! Terminals are deduplicated in order of first appearance; their index
//! is the terminal id everywhere downstream.

use crate::error::GrammarError;
use crate::grammar::{Grammar, Production, Symbol, Terminal, TerminalId};
use crate::intern::NameTable;
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;

/// One token of the grammar source.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BnfToken {
    Definition,
    Termination,
    Alternation,
    BracketOpen,
    BracketClose,
    StringTerminal(CompactString),
    RegexTerminal(CompactString),
    /// An empty string terminal.
    Epsilon,
    Ident(CompactString),
    Comment,
    Eof,
}

impl BnfToken {
    fn describe(&self) -> String {
        match self {
            Self::Definition => "'='".to_string(),
            Self::Termination => "';'".to_string(),
            Self::Alternation => "'|'".to_string(),
            Self::BracketOpen => "'['".to_string(),
            Self::BracketClose => "']'".to_string(),
            Self::StringTerminal(text) => format!("{text:?}"),
            Self::RegexTerminal(text) => text.to_string(),
            Self::Epsilon => "empty string".to_string(),
            Self::Ident(name) => name.to_string(),
            Self::Comment => "comment".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// Character-class scanner over the grammar source.
struct BnfLexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    current: BnfToken,
    current_pos: usize,
}

impl<'a> BnfLexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
            current: BnfToken::Eof,
            current_pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn is_ident_byte(byte: u8) -> bool {
        byte.is_ascii_alphanumeric()
    }

    fn read_next(&mut self) -> Result<(), GrammarError> {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.current_pos = self.pos;
        let Some(byte) = self.bump() else {
            self.current = BnfToken::Eof;
            return Ok(());
        };
        self.current = match byte {
            b'=' => BnfToken::Definition,
            b';' => BnfToken::Termination,
            b'|' => BnfToken::Alternation,
            b'[' => BnfToken::BracketOpen,
            b']' => BnfToken::BracketClose,
            b'"' => self.read_string()?,
            b'/' => self.read_regex()?,
            b'(' => self.read_comment()?,
            other if Self::is_ident_byte(other) => {
                let start = self.pos - 1;
                while matches!(self.peek(), Some(b) if Self::is_ident_byte(b)) {
                    self.pos += 1;
                }
                BnfToken::Ident(CompactString::from(
                    String::from_utf8_lossy(&self.bytes[start..self.pos]),
                ))
            }
            other => {
                return Err(GrammarError::UnexpectedChar {
                    pos: self.current_pos,
                    found: char::from(other),
                })
            }
        };
        Ok(())
    }

    /// `"..."` with `\"`, `\\` and `\n` escapes decoded. Empty means
    /// epsilon.
    fn read_string(&mut self) -> Result<BnfToken, GrammarError> {
        let start = self.current_pos;
        let mut value = CompactString::default();
        loop {
            match self.bump() {
                None => {
                    return Err(GrammarError::Unterminated {
                        pos: start,
                        what: "string terminal",
                    })
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => value.push('\n'),
                    Some(escaped) => value.push(char::from(escaped)),
                    None => {
                        return Err(GrammarError::Unterminated {
                            pos: start,
                            what: "string terminal",
                        })
                    }
                },
                Some(other) => value.push(char::from(other)),
            }
        }
        if value.is_empty() {
            Ok(BnfToken::Epsilon)
        } else {
            Ok(BnfToken::StringTerminal(value))
        }
    }

    /// `/.../` kept verbatim, delimiters and escapes included, plus an
    /// optional trailing `U`.
    fn read_regex(&mut self) -> Result<BnfToken, GrammarError> {
        let start = self.current_pos;
        let mut value = CompactString::from("/");
        loop {
            match self.bump() {
                None => {
                    return Err(GrammarError::Unterminated {
                        pos: start,
                        what: "regex terminal",
                    })
                }
                Some(b'\\') => {
                    value.push('\\');
                    match self.bump() {
                        Some(escaped) => value.push(char::from(escaped)),
                        None => {
                            return Err(GrammarError::Unterminated {
                                pos: start,
                                what: "regex terminal",
                            })
                        }
                    }
                }
                Some(b'/') => {
                    value.push('/');
                    break;
                }
                Some(other) => value.push(char::from(other)),
            }
        }
        if self.peek() == Some(b'U') {
            self.pos += 1;
            value.push('U');
        }
        Ok(BnfToken::RegexTerminal(value))
    }

    /// `(* ... *)`
    fn read_comment(&mut self) -> Result<BnfToken, GrammarError> {
        let start = self.current_pos;
        if self.bump() != Some(b'*') {
            return Err(GrammarError::UnexpectedChar {
                pos: start,
                found: '(',
            });
        }
        let mut previous = 0u8;
        loop {
            match self.bump() {
                None => {
                    return Err(GrammarError::Unterminated {
                        pos: start,
                        what: "comment",
                    })
                }
                Some(b')') if previous == b'*' => return Ok(BnfToken::Comment),
                Some(other) => previous = other,
            }
        }
    }
}

/// A terminal as first parsed, before exclusion lists are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RawTerminal {
    Literal(CompactString),
    Regex(CompactString),
    RegexExclude {
        pattern: CompactString,
        excludes: CompactString,
    },
}

struct BnfParser<'a> {
    lexer: BnfLexer<'a>,
    names: &'a mut NameTable,
    terminals: Vec<RawTerminal>,
    terminal_index: HashMap<RawTerminal, TerminalId>,
}

impl BnfParser<'_> {
    fn terminal_id(&mut self, terminal: RawTerminal) -> TerminalId {
        if let Some(&id) = self.terminal_index.get(&terminal) {
            return id;
        }
        let id = self.terminals.len();
        self.terminals.push(terminal.clone());
        self.terminal_index.insert(terminal, id);
        id
    }

    fn unexpected(&self, expected: &str) -> GrammarError {
        GrammarError::UnexpectedBnfToken {
            pos: self.lexer.current_pos,
            found: self.lexer.current.describe(),
            expected: expected.to_string(),
        }
    }

    fn parse(&mut self) -> Result<Vec<Production>, GrammarError> {
        let mut productions = Vec::new();
        self.lexer.read_next()?;
        while self.lexer.current != BnfToken::Eof {
            if self.lexer.current != BnfToken::Comment {
                let left = match &self.lexer.current {
                    BnfToken::Ident(name) => self.names.intern(name),
                    _ => return Err(self.unexpected("a nonterminal name")),
                };
                self.lexer.read_next()?;
                if self.lexer.current != BnfToken::Definition {
                    return Err(self.unexpected("'='"));
                }
                self.lexer.read_next()?;
                productions.push(Production::new(left, self.parse_right()?));
                while self.lexer.current == BnfToken::Alternation {
                    self.lexer.read_next()?;
                    productions.push(Production::new(left, self.parse_right()?));
                }
            }
            self.lexer.read_next()?;
        }
        Ok(productions)
    }

    fn parse_right(&mut self) -> Result<crate::grammar::Rhs, GrammarError> {
        let mut right = crate::grammar::Rhs::new();
        loop {
            match self.lexer.current.clone() {
                BnfToken::Ident(name) => {
                    let name = self.names.intern(&name);
                    right.push(Symbol::NonTerminal(name));
                }
                BnfToken::StringTerminal(text) => {
                    let id = self.terminal_id(RawTerminal::Literal(text));
                    right.push(Symbol::Terminal(id));
                }
                BnfToken::RegexTerminal(pattern) => {
                    let id = self.terminal_id(RawTerminal::Regex(pattern));
                    right.push(Symbol::Terminal(id));
                }
                BnfToken::Epsilon => right.push(Symbol::End),
                BnfToken::BracketOpen => {
                    let id = self.parse_regex_exclude()?;
                    right.push(Symbol::Terminal(id));
                }
                _ => return Err(self.unexpected("a symbol")),
            }
            self.lexer.read_next()?;
            if matches!(
                self.lexer.current,
                BnfToken::Termination | BnfToken::Alternation
            ) {
                return Ok(right);
            }
        }
    }

    /// `[/.../ Name]`, positioned on the opening bracket.
    fn parse_regex_exclude(&mut self) -> Result<TerminalId, GrammarError> {
        self.lexer.read_next()?;
        let pattern = match self.lexer.current.clone() {
            BnfToken::RegexTerminal(pattern) => pattern,
            _ => return Err(self.unexpected("a regex terminal")),
        };
        self.lexer.read_next()?;
        let excludes = match self.lexer.current.clone() {
            BnfToken::Ident(name) => name,
            _ => return Err(self.unexpected("an exclusion nonterminal name")),
        };
        self.lexer.read_next()?;
        if self.lexer.current != BnfToken::BracketClose {
            return Err(self.unexpected("']'"));
        }
        Ok(self.terminal_id(RawTerminal::RegexExclude { pattern, excludes }))
    }
}

/// Parse grammar source into a [`Grammar`] with `start` as its start
/// nonterminal.
pub fn parse_grammar(
    source: &str,
    start: &str,
    names: &mut NameTable,
) -> Result<Grammar, GrammarError> {
    let mut parser = BnfParser {
        lexer: BnfLexer::new(source),
        names,
        terminals: Vec::new(),
        terminal_index: HashMap::new(),
    };
    let productions = parser.parse()?;
    let terminals = resolve_excludes(&parser.terminals, &productions, parser.names)?;
    let start = parser.names.intern(start);
    Ok(Grammar::new(start, productions, terminals))
}

/// Resolve each regex-exclude's nonterminal to the ids of the string
/// terminals on its right-hand sides. The exclusion nonterminal must be
/// defined even if nothing else references it.
fn resolve_excludes(
    raw: &[RawTerminal],
    productions: &[Production],
    names: &NameTable,
) -> Result<Vec<Terminal>, GrammarError> {
    raw.iter()
        .map(|terminal| match terminal {
            RawTerminal::Literal(text) => Ok(Terminal::Literal(text.clone())),
            RawTerminal::Regex(pattern) => Ok(Terminal::Regex(pattern.clone())),
            RawTerminal::RegexExclude { pattern, excludes } => {
                let left = names
                    .get(excludes)
                    .ok_or_else(|| GrammarError::UndefinedNonTerminal {
                        name: excludes.to_string(),
                    })?;
                let mut ids: SmallVec<[TerminalId; 4]> = SmallVec::new();
                let mut found = false;
                for production in productions {
                    if production.left != left {
                        continue;
                    }
                    found = true;
                    for symbol in &production.right {
                        if let Symbol::Terminal(id) = symbol {
                            if matches!(raw[*id], RawTerminal::Literal(_)) && !ids.contains(id) {
                                ids.push(*id);
                            }
                        }
                    }
                }
                if !found {
                    return Err(GrammarError::UndefinedNonTerminal {
                        name: excludes.to_string(),
                    });
                }
                Ok(Terminal::RegexExclude {
                    pattern: pattern.clone(),
                    excludes: ids,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Symbol;

    fn parse(source: &str, start: &str) -> (Grammar, NameTable) {
        let mut names = NameTable::new();
        let grammar = parse_grammar(source, start, &mut names).expect("grammar should parse");
        (grammar, names)
    }

    #[test]
    fn test_single_production() {
        let (grammar, mut names) = parse(r#"A = "a";"#, "A");
        assert_eq!(grammar.productions.len(), 1);
        assert_eq!(grammar.productions[0].left, names.intern("A"));
        assert_eq!(
            grammar.productions[0].right.as_slice(),
            [Symbol::Terminal(0)]
        );
        assert_eq!(grammar.terminals, vec![Terminal::Literal("a".into())]);
    }

    #[test]
    fn test_alternation_expands_to_productions() {
        let (grammar, mut names) = parse(r#"E = E "+" T | T; T = "a";"#, "E");
        assert_eq!(grammar.productions.len(), 3);
        let e = names.intern("E");
        assert_eq!(grammar.productions[0].left, e);
        assert_eq!(grammar.productions[1].left, e);
        assert_eq!(grammar.productions[1].right.len(), 1);
    }

    #[test]
    fn test_comment_is_skipped() {
        let (grammar, _) = parse(r#"(* hello *) A = "a";"#, "A");
        assert_eq!(grammar.productions.len(), 1);
    }

    #[test]
    fn test_empty_string_is_epsilon() {
        let (grammar, _) = parse(r#"A = "a" | "";"#, "A");
        assert_eq!(grammar.productions[1].right.as_slice(), [Symbol::End]);
        // Epsilon is not a terminal.
        assert_eq!(grammar.terminals.len(), 1);
    }

    #[test]
    fn test_terminals_are_deduplicated() {
        let (grammar, _) = parse(r#"A = "x" B; B = "x";"#, "A");
        assert_eq!(grammar.terminals.len(), 1);
    }

    #[test]
    fn test_regex_terminal_keeps_delimiters_and_lazy_marker() {
        let (grammar, _) = parse(r#"A = /[a-z]+/ B; B = /a*/U;"#, "A");
        assert_eq!(
            grammar.terminals,
            vec![
                Terminal::Regex("/[a-z]+/".into()),
                Terminal::Regex("/a*/U".into())
            ]
        );
    }

    #[test]
    fn test_regex_exclude_resolves_string_terminals() {
        let (grammar, _) = parse(
            r#"X = [/[a-z]+/ Keywords]; Keywords = "let" | "if";"#,
            "X",
        );
        assert_eq!(
            grammar.terminals[0],
            Terminal::RegexExclude {
                pattern: "/[a-z]+/".into(),
                excludes: SmallVec::from_slice(&[1, 2]),
            }
        );
        assert_eq!(grammar.terminals[1], Terminal::Literal("let".into()));
        assert_eq!(grammar.terminals[2], Terminal::Literal("if".into()));
    }

    #[test]
    fn test_missing_exclusion_nonterminal_is_rejected() {
        let mut names = NameTable::new();
        let result = parse_grammar(r#"X = [/[a-z]+/ Keywords];"#, "X", &mut names);
        assert!(matches!(
            result,
            Err(GrammarError::UndefinedNonTerminal { name }) if name == "Keywords"
        ));
    }

    #[test]
    fn test_string_escapes() {
        let (grammar, _) = parse(r#"A = "a\"b\\c\n";"#, "A");
        assert_eq!(
            grammar.terminals,
            vec![Terminal::Literal("a\"b\\c\n".into())]
        );
    }

    #[test]
    fn test_unterminated_string_is_rejected() {
        let mut names = NameTable::new();
        assert!(matches!(
            parse_grammar(r#"A = "abc"#, "A", &mut names),
            Err(GrammarError::Unterminated { what: "string terminal", .. })
        ));
    }

    #[test]
    fn test_unknown_character_is_rejected() {
        let mut names = NameTable::new();
        assert!(matches!(
            parse_grammar("A = $;", "A", &mut names),
            Err(GrammarError::UnexpectedChar { found: '$', .. })
        ));
    }

    #[test]
    fn test_missing_definition_sign() {
        let mut names = NameTable::new();
        assert!(matches!(
            parse_grammar(r#"A "a";"#, "A", &mut names),
            Err(GrammarError::UnexpectedBnfToken { .. })
        ));
    }
}
