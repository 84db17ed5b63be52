//! # First-Set Graph
//!
//! The auxiliary graph driving both FIRST computation and the structural
//! passes. For every production `p` there is an edge from the node of
//! `p`'s first right-hand symbol to the node of `p`'s left nonterminal,
//! labeled with `p`. Reachability from a terminal node therefore yields
//! exactly the nonterminals whose FIRST set contains that terminal, and
//! a cycle is a left recursion.
//!
//! The graph is derived state: it borrows nothing from the grammar, is
//! rebuilt from scratch by each pipeline iteration, and is never
//! persisted. Nodes live in an arena and refer to each other by index.

use super::{Grammar, Symbol};
use crate::intern::Name;
use hashbrown::HashMap;

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// Index of a production in [`Grammar::productions`].
pub(crate) type ProdId = usize;

/// An edge from a production's first right-hand symbol to its left
/// nonterminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
    pub production: ProdId,
    pub to: NodeId,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub symbol: Symbol<Name>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Default)]
pub(crate) struct FirstSetGraph {
    nodes: Vec<Node>,
    index: HashMap<Symbol<Name>, NodeId>,
    /// Nodes whose symbol is a terminal or the end marker, in first
    /// appearance order.
    pub terminal_nodes: Vec<NodeId>,
}

impl FirstSetGraph {
    pub fn build(grammar: &Grammar) -> Self {
        let mut graph = Self::default();
        for (pid, production) in grammar.productions.iter().enumerate() {
            let Some(&first) = production.right.first() else {
                continue;
            };
            let from = graph.node_for(first);
            let to = graph.node_for(Symbol::NonTerminal(production.left));
            graph.nodes[from.0].edges.push(Edge {
                production: pid,
                to,
            });
        }
        graph
    }

    fn node_for(&mut self, symbol: Symbol<Name>) -> NodeId {
        if let Some(&id) = self.index.get(&symbol) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            symbol,
            edges: Vec::new(),
        });
        self.index.insert(symbol, id);
        if !symbol.is_non_terminal() {
            self.terminal_nodes.push(id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Production, Terminal};
    use crate::intern::NameTable;
    use smallvec::smallvec;

    #[test]
    fn test_edges_point_from_right_first_to_left() {
        let mut names = NameTable::new();
        let e = names.intern("E");
        let t = names.intern("T");
        let grammar = Grammar::new(
            e,
            vec![
                Production::new(e, smallvec![Symbol::NonTerminal(t)]),
                Production::new(t, smallvec![Symbol::Terminal(0)]),
            ],
            vec![Terminal::Literal("a".into())],
        );
        let graph = FirstSetGraph::build(&grammar);

        assert_eq!(graph.terminal_nodes.len(), 1);
        let terminal = graph.node(graph.terminal_nodes[0]);
        assert_eq!(terminal.symbol, Symbol::Terminal(0));
        assert_eq!(terminal.edges.len(), 1);

        // a -> T, then T -> E
        let t_node = graph.node(terminal.edges[0].to);
        assert_eq!(t_node.symbol, Symbol::NonTerminal(t));
        assert_eq!(t_node.edges.len(), 1);
        assert_eq!(graph.node(t_node.edges[0].to).symbol, Symbol::NonTerminal(e));
    }

    #[test]
    fn test_end_marker_is_a_terminal_node() {
        let mut names = NameTable::new();
        let e = names.intern("E");
        let grammar = Grammar::new(
            e,
            vec![Production::new(e, smallvec![Symbol::End])],
            vec![],
        );
        let graph = FirstSetGraph::build(&grammar);
        assert_eq!(graph.terminal_nodes.len(), 1);
        assert_eq!(graph.node(graph.terminal_nodes[0]).symbol, Symbol::End);
    }
}
