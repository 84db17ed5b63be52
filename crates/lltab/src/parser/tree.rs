//! The parse tree, arena style: nodes live in a vector and refer to
//! parent and children by index. The parent link exists for epsilon
//! pruning; ownership questions never arise because detached nodes
//! simply stay in the arena unreferenced.

use crate::grammar::Symbol;
use compact_str::CompactString;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct NodeData {
    symbol: Symbol<usize>,
    text: CompactString,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The tree produced by a parse. Terminal nodes carry the matched text;
/// nonterminal nodes carry their children in derivation order.
#[derive(Debug)]
pub struct ParseTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl ParseTree {
    pub(crate) fn new(root_symbol: Symbol<usize>) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.push(root_symbol, None);
        tree
    }

    pub(crate) fn push(&mut self, symbol: Symbol<usize>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            symbol,
            text: CompactString::default(),
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub(crate) fn set_text(&mut self, id: NodeId, text: CompactString) {
        self.nodes[id.0].text = text;
    }

    /// Unlink `id` from its parent, returning the parent.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id.0].parent?;
        self.nodes[parent.0].children.retain(|&child| child != id);
        Some(parent)
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn symbol(&self, id: NodeId) -> Symbol<usize> {
        self.nodes[id.0].symbol
    }

    /// Matched text of a terminal node; empty for nonterminals.
    #[must_use]
    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.is_empty()
    }

    /// Nodes of the subtree under `id`, parents before children.
    #[must_use]
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for &child in self.nodes[node.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Terminal leaves under `id` in source order, as `(terminal id,
    /// text)` pairs.
    #[must_use]
    pub fn terminals(&self, id: NodeId) -> Vec<(usize, &str)> {
        self.preorder(id)
            .into_iter()
            .filter_map(|node| match self.symbol(node) {
                Symbol::Terminal(terminal) => Some((terminal, self.text(node))),
                _ => None,
            })
            .collect()
    }
}
