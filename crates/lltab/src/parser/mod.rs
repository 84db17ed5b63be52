//! # Runtime Parser
//!
//! A table-driven pushdown automaton over the token stream of a
//! configured [`Lexer`]. The parse stack holds tree-node ids; the stack
//! is seeded with the end-marker sentinel and the start nonterminal.
//!
//! Each step inspects the stack top:
//!
//! - a nonterminal is expanded through the table (a missing prediction
//!   is fatal); an epsilon prediction records the node for pruning
//! - a terminal must equal the current token, which is copied into the
//!   node; the lexer is then advanced with the candidate set of whatever
//!   is newly on top
//! - the end marker requires the token stream to be exhausted
//!
//! After the loop, recorded epsilon nodes are unlinked from their
//! parents; removal cascades upward while the emptied parent also
//! becomes childless.

mod tree;

pub use tree::{NodeId, ParseTree};

use crate::artifact::Artifact;
use crate::error::{ArtifactError, ParseError};
use crate::grammar::{Symbol, TerminalId};
use crate::lexer::{Lexer, TokenKind};
use crate::table::LlTable;
use hashbrown::HashMap;
use std::io::Read;

/// Counters reported alongside a successful parse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseMetrics {
    pub tokens_consumed: usize,
    pub nodes_created: usize,
}

/// A successful parse: the tree and its metrics.
#[derive(Debug)]
pub struct ParseResult {
    pub tree: ParseTree,
    pub metrics: ParseMetrics,
}

/// The table-driven runtime parser.
///
/// Holds read-only references into the artifact; the input stream is
/// owned exclusively by the lexer for the duration of the parse.
pub struct Parser<'a, R> {
    lexer: Lexer<R>,
    table: &'a LlTable<usize>,
    matcher_text: Vec<String>,
    candidates: HashMap<usize, Vec<TerminalId>>,
}

impl<'a, R: Read> Parser<'a, R> {
    /// Compile the artifact's matchers and wrap `input`.
    pub fn new(artifact: &'a Artifact, input: R) -> Result<Self, ArtifactError> {
        let lexer = Lexer::from_terminals(&artifact.matchers, input)?;
        let matcher_text = artifact
            .matchers
            .iter()
            .map(crate::grammar::Terminal::display)
            .collect();
        Ok(Self {
            lexer,
            table: &artifact.table,
            matcher_text,
            candidates: HashMap::new(),
        })
    }

    fn candidates_for(&mut self, non_terminal: usize) -> Vec<TerminalId> {
        self.candidates
            .entry(non_terminal)
            .or_insert_with(|| self.table.candidates(non_terminal))
            .clone()
    }

    fn lookahead(&self) -> Symbol<usize> {
        match self.lexer.current().kind {
            TokenKind::Terminal(id) => Symbol::Terminal(id),
            TokenKind::Eof => Symbol::End,
        }
    }

    fn expected_for(&self, non_terminal: usize) -> Vec<String> {
        let mut expected: Vec<String> = self
            .table
            .candidates(non_terminal)
            .into_iter()
            .map(|id| self.matcher_text[id].clone())
            .collect();
        if self.table.predict(non_terminal, &Symbol::End).is_some() {
            expected.push("<end of input>".to_string());
        }
        expected
    }

    /// Parse the whole input into a tree rooted at the start symbol.
    pub fn parse(&mut self) -> Result<ParseResult, ParseError> {
        let start = self.table.start();
        let mut metrics = ParseMetrics::default();
        let mut tree = ParseTree::new(Symbol::NonTerminal(start));
        let root = tree.root();
        let end_node = tree.push(Symbol::End, None);
        let mut stack = vec![end_node, root];
        let mut epsilon_nodes: Vec<NodeId> = Vec::new();

        let start_candidates = self.candidates_for(start);
        self.lexer.read_next_expect(start_candidates)?;

        while let Some(&top) = stack.last() {
            let lookahead = self.lookahead();
            match tree.symbol(top) {
                Symbol::NonTerminal(non_terminal) => {
                    let Some(right) = self.table.predict(non_terminal, &lookahead) else {
                        return Err(ParseError::UnexpectedToken {
                            found: self.lexer.current().text.to_string(),
                            expected: self.expected_for(non_terminal),
                        });
                    };
                    let right = right.to_vec();
                    stack.pop();
                    if right == [Symbol::End] {
                        epsilon_nodes.push(top);
                        continue;
                    }
                    let children: Vec<NodeId> = right
                        .iter()
                        .map(|&symbol| tree.push(symbol, Some(top)))
                        .collect();
                    metrics.nodes_created += children.len();
                    stack.extend(children.iter().rev());
                }
                symbol => {
                    if symbol != lookahead {
                        return Err(ParseError::UnexpectedToken {
                            found: self.lexer.current().text.to_string(),
                            expected: match symbol {
                                Symbol::Terminal(id) => vec![self.matcher_text[id].clone()],
                                _ => vec!["<end of input>".to_string()],
                            },
                        });
                    }
                    tree.set_text(top, self.lexer.current().text.clone());
                    stack.pop();
                    if lookahead != Symbol::End {
                        metrics.tokens_consumed += 1;
                        let Some(&next_top) = stack.last() else {
                            return Err(ParseError::ExtraToken {
                                found: self.lexer.current().text.to_string(),
                            });
                        };
                        match tree.symbol(next_top) {
                            Symbol::NonTerminal(next) => {
                                let candidates = self.candidates_for(next);
                                self.lexer.read_next_expect(candidates)?;
                            }
                            Symbol::Terminal(id) => {
                                self.lexer.read_next_expect([id])?;
                            }
                            Symbol::End => {
                                self.lexer.read_next_expect_eof()?;
                            }
                        }
                    }
                }
            }
        }

        prune_epsilon_nodes(&mut tree, &epsilon_nodes);
        Ok(ParseResult { tree, metrics })
    }
}

/// Remove every recorded epsilon node from its parent; when the removal
/// leaves the parent childless it is removed as well, cascading upward.
fn prune_epsilon_nodes(tree: &mut ParseTree, epsilon_nodes: &[NodeId]) {
    for &node in epsilon_nodes {
        let mut current = node;
        loop {
            let Some(parent) = tree.detach(current) else {
                break;
            };
            if !tree.children(parent).is_empty() {
                break;
            }
            current = parent;
        }
    }
}
