//! # Grammar Representation
//!
//! The data model shared by the BNF frontend, the transformation passes,
//! and the table builder: grammar [`Symbol`]s, [`Production`]s, the
//! [`Grammar`] itself, and the deduplicated [`Terminal`] set.
//!
//! Nonterminals are interned [`Name`]s while a grammar is being
//! transformed; the artifact layer maps them to dense integer ids at the
//! serialization boundary, which is why [`Symbol`] is generic over its
//! nonterminal representation. Terminals are matcher-list indices from
//! the start.

pub(crate) mod graph;
pub(crate) mod passes;

use crate::error::GrammarError;
use crate::intern::{Name, NameTable};
use compact_str::CompactString;
use hashbrown::HashSet;
use smallvec::SmallVec;

/// Index of a terminal in the grammar's matcher list.
pub type TerminalId = usize;

/// A grammar symbol: terminal, nonterminal, or the end marker.
///
/// `End` doubles as the epsilon right-hand side (a production whose
/// right is the single symbol `End`) and as the end-of-input lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol<N> {
    Terminal(TerminalId),
    NonTerminal(N),
    End,
}

impl<N> Symbol<N> {
    #[must_use]
    pub const fn is_non_terminal(&self) -> bool {
        matches!(self, Self::NonTerminal(_))
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// A right-hand side: a short ordered sequence of symbols.
pub type SymbolSeq<N> = SmallVec<[Symbol<N>; 4]>;

/// Right-hand side over build-time (interned) nonterminals.
pub type Rhs = SymbolSeq<Name>;

/// One terminal of the grammar, in matcher-list form.
///
/// The id of a terminal is its position in [`Grammar::terminals`]; that
/// same index identifies its matcher in the serialized artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// Matches the literal text exactly.
    Literal(CompactString),
    /// Matches the regex, longest-prefix.
    Regex(CompactString),
    /// Matches the regex unless one of the excluded matchers matches the
    /// same prefix. Implements "identifier except keyword" as one
    /// atomic terminal.
    RegexExclude {
        pattern: CompactString,
        excludes: SmallVec<[TerminalId; 4]>,
    },
}

impl Terminal {
    /// Human-readable form for diagnostics, in grammar-source spelling.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Literal(text) => format!("{text:?}"),
            Self::Regex(pattern) => pattern.to_string(),
            Self::RegexExclude { pattern, .. } => format!("[{pattern} ...]"),
        }
    }
}

/// A production `left -> right`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub left: Name,
    pub right: Rhs,
}

impl Production {
    pub fn new(left: Name, right: Rhs) -> Self {
        Self { left, right }
    }

    /// An epsilon production derives only the end marker.
    #[must_use]
    pub fn is_epsilon(&self) -> bool {
        self.right.len() == 1 && self.right[0] == Symbol::End
    }
}

/// An ordered production list with a distinguished start nonterminal and
/// the terminal set referenced by production rights.
///
/// Production order is part of the build contract: passes visit
/// productions in list order, so two builds of the same grammar with the
/// same fresh-name factory produce identical artifacts.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub productions: Vec<Production>,
    pub start: Name,
    pub terminals: Vec<Terminal>,
}

impl Grammar {
    pub fn new(start: Name, productions: Vec<Production>, terminals: Vec<Terminal>) -> Self {
        Self {
            productions,
            start,
            terminals,
        }
    }

    /// Reject grammars that reference a nonterminal that is never
    /// defined. Runs before any transformation.
    pub fn check_well_formed(&self, names: &NameTable) -> Result<(), GrammarError> {
        let defined: HashSet<Name> = self.productions.iter().map(|p| p.left).collect();
        if !defined.contains(&self.start) {
            return Err(GrammarError::MissingStart {
                name: names.resolve(self.start).to_string(),
            });
        }
        for production in &self.productions {
            for symbol in &production.right {
                if let Symbol::NonTerminal(name) = symbol {
                    if !defined.contains(name) {
                        return Err(GrammarError::UndefinedNonTerminal {
                            name: names.resolve(*name).to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Render a production for diagnostics and debugging.
    #[must_use]
    pub fn production_text(&self, production: &Production, names: &NameTable) -> String {
        let mut out = String::new();
        out.push_str(names.resolve(production.left));
        out.push_str(" =");
        for symbol in &production.right {
            out.push(' ');
            match symbol {
                Symbol::Terminal(id) => out.push_str(&self.terminals[*id].display()),
                Symbol::NonTerminal(name) => out.push_str(names.resolve(*name)),
                Symbol::End => out.push('ε'),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_epsilon_production() {
        let mut names = NameTable::new();
        let e = names.intern("E");
        let epsilon = Production::new(e, smallvec![Symbol::End]);
        let not_epsilon = Production::new(e, smallvec![Symbol::Terminal(0), Symbol::End]);
        assert!(epsilon.is_epsilon());
        assert!(!not_epsilon.is_epsilon());
    }

    #[test]
    fn test_well_formed_rejects_undefined_reference() {
        let mut names = NameTable::new();
        let s = names.intern("S");
        let missing = names.intern("Missing");
        let grammar = Grammar::new(
            s,
            vec![Production::new(s, smallvec![Symbol::NonTerminal(missing)])],
            vec![],
        );
        assert!(matches!(
            grammar.check_well_formed(&names),
            Err(GrammarError::UndefinedNonTerminal { name }) if name == "Missing"
        ));
    }

    #[test]
    fn test_well_formed_requires_start_productions() {
        let mut names = NameTable::new();
        let s = names.intern("S");
        let other = names.intern("Other");
        let grammar = Grammar::new(
            s,
            vec![Production::new(other, smallvec![Symbol::Terminal(0)])],
            vec![Terminal::Literal("a".into())],
        );
        assert!(matches!(
            grammar.check_well_formed(&names),
            Err(GrammarError::MissingStart { .. })
        ));
    }
}
