//! Grammar transformation passes.
//!
//! The fixed-point driver in the table module runs these in order each
//! iteration over a freshly built first-set graph:
//!
//! 1. [`prune_unreachable`] drops productions whose left nonterminal is
//!    unreachable from the start symbol, plus degenerate empty rights.
//! 2. [`remove_right_first_end`] folds away leading nonterminals that
//!    can only derive epsilon.
//! 3. [`eliminate_left_recursion`] breaks one first-set-graph cycle per
//!    invocation.
//! 4. [`eliminate_backtracking`] factors one shared derivation prefix
//!    per invocation.
//!
//! The recursion and factoring passes return `true` after a single
//! rewrite so the driver re-runs analysis before they look again; both
//! visit productions in grammar order, keeping rewrites deterministic.

use super::graph::{Edge, FirstSetGraph, NodeId};
use super::{Grammar, Production, Symbol};
use crate::error::BuildError;
use crate::intern::{Name, NameTable};
use hashbrown::{HashMap, HashSet};
use smallvec::smallvec;

/// Drop every production whose left nonterminal is not reachable from
/// the start symbol, and any production with an empty right-hand side.
/// Surviving productions are re-listed in traversal order.
pub(crate) fn prune_unreachable(grammar: &mut Grammar) {
    let mut kept = Vec::with_capacity(grammar.productions.len());
    let mut visited: HashSet<Name> = HashSet::new();
    visited.insert(grammar.start);
    let mut stack = vec![grammar.start];
    while let Some(left) = stack.pop() {
        for production in &grammar.productions {
            if production.left == left && !production.right.is_empty() {
                kept.push(production.clone());
                for symbol in &production.right {
                    if let Symbol::NonTerminal(name) = symbol {
                        if visited.insert(*name) {
                            stack.push(*name);
                        }
                    }
                }
            }
        }
    }
    grammar.productions = kept;
}

/// If a nonterminal can only derive epsilon (its node is reachable from
/// the end marker but from no real terminal), drop it from the front of
/// every right-hand side it starts. Mutates in place and intentionally
/// reports no change; the next analysis rebuild absorbs the edit.
pub(crate) fn remove_right_first_end(grammar: &mut Grammar, graph: &FirstSetGraph) -> bool {
    let mut reachable: HashSet<NodeId> = HashSet::new();
    let mut end_node = None;
    for &terminal in &graph.terminal_nodes {
        if graph.node(terminal).symbol == Symbol::End {
            end_node = Some(terminal);
            continue;
        }
        let mut stack = vec![terminal];
        while let Some(id) = stack.pop() {
            reachable.insert(id);
            for edge in &graph.node(id).edges {
                if !reachable.contains(&edge.to) {
                    stack.push(edge.to);
                }
            }
        }
    }
    let Some(end_node) = end_node else {
        return false;
    };
    for edge in &graph.node(end_node).edges {
        if reachable.contains(&edge.to) {
            continue;
        }
        for dependent in &graph.node(edge.to).edges {
            let right = &mut grammar.productions[dependent.production].right;
            right.remove(0);
            if right.is_empty() {
                right.push(Symbol::End);
            }
        }
    }
    false
}

/// Break one left-recursive cycle, if any, and report whether a rewrite
/// happened. Cycle detection is a DFS from each terminal node; an edge
/// that re-enters a node on the current path closes a cycle.
pub(crate) fn eliminate_left_recursion(
    grammar: &mut Grammar,
    graph: &FirstSetGraph,
    names: &mut NameTable,
) -> Result<bool, BuildError> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    for &terminal in &graph.terminal_nodes {
        if graph.node(terminal).symbol == Symbol::End {
            continue;
        }
        let mut path: HashMap<NodeId, Edge> = HashMap::new();
        if cycle_dfs(terminal, grammar, graph, names, &mut visited, &mut path)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn cycle_dfs(
    node: NodeId,
    grammar: &mut Grammar,
    graph: &FirstSetGraph,
    names: &mut NameTable,
    visited: &mut HashSet<NodeId>,
    path: &mut HashMap<NodeId, Edge>,
) -> Result<bool, BuildError> {
    for edge in &graph.node(node).edges {
        if visited.insert(edge.to) {
            path.insert(node, *edge);
            if cycle_dfs(edge.to, grammar, graph, names, visited, path)? {
                return Ok(true);
            }
            path.remove(&node);
        } else {
            path.insert(node, *edge);
            if path.contains_key(&edge.to) {
                break_cycle(grammar, graph, names, path, node, *edge);
                return Ok(true);
            }
            path.remove(&node);
        }
    }
    Ok(false)
}

/// Rewrite the productions along the cycle closed by `closing` (an edge
/// from `node` back to a node on the current path). Clones the cycle
/// productions under fresh nonterminals with their leading (recursive)
/// symbol dropped, then terminates the recursion head with a fresh
/// epsilon-ended nonterminal appended to its remaining productions.
fn break_cycle(
    grammar: &mut Grammar,
    graph: &FirstSetGraph,
    names: &mut NameTable,
    path: &HashMap<NodeId, Edge>,
    node: NodeId,
    closing: Edge,
) {
    let head = closing.to;
    let mut pre_non_terminal: Option<Name> = None;
    let mut current = head;
    loop {
        let Some(&current_edge) = path.get(&current) else {
            break;
        };
        let pid = current_edge.production;
        let is_first = current == head;
        let is_last = current == node;
        let left = grammar.productions[pid].left;

        let mut new_right = grammar.productions[pid].right.clone();
        new_right.remove(0);
        if !is_first {
            if let Some(pre) = pre_non_terminal {
                new_right.insert(0, Symbol::NonTerminal(pre));
            }
        }
        if new_right.is_empty() {
            new_right.push(Symbol::End);
        }

        if is_first && is_last {
            grammar.productions[pid].right = new_right;
        } else if is_first {
            let new_left = names.fresh(left);
            pre_non_terminal = Some(new_left);
            grammar.productions[pid].left = new_left;
            grammar.productions[pid].right = new_right;
        } else if is_last {
            let kept_left = grammar.productions[pid].left;
            grammar.productions.push(Production::new(kept_left, new_right));
        } else {
            let new_left = names.fresh(left);
            pre_non_terminal = Some(new_left);
            grammar.productions.push(Production::new(new_left, new_right));
        }

        let next = current_edge.to;
        if !is_last && graph.node(next).edges.len() > 1 {
            if let (Some(pre), Some(next_edge)) = (pre_non_terminal, path.get(&next)) {
                let new_left = names.fresh(left);
                let head_symbol = graph.node(head).symbol;
                grammar.productions.push(Production::new(
                    new_left,
                    smallvec![head_symbol, Symbol::NonTerminal(pre)],
                ));
                grammar
                    .productions
                    .push(Production::new(new_left, smallvec![Symbol::NonTerminal(left)]));
                // Route the continuation through the clone when the node
                // has other inbound derivations.
                let right = &mut grammar.productions[next_edge.production].right;
                right.remove(0);
                right.insert(0, Symbol::NonTerminal(new_left));
            }
        }

        current = next;
        if current == head {
            break;
        }
    }

    // Terminate the recursion head: every remaining production of the
    // head nonterminal continues into the fresh epsilon-ended one.
    let closing_left = grammar.productions[closing.production].left;
    let new_left = names.fresh(closing_left);
    let count = grammar.productions.len();
    for pid in 0..count {
        if grammar.productions[pid].left == closing_left && !grammar.productions[pid].is_epsilon() {
            grammar.productions[pid]
                .right
                .push(Symbol::NonTerminal(new_left));
        }
    }
    grammar.productions[closing.production].left = new_left;
    grammar
        .productions
        .push(Production::new(new_left, smallvec![Symbol::End]));
}

/// A derivation path from a terminal node, as the list of edges taken.
#[derive(Debug, Clone, Default)]
struct Path {
    edges: Vec<Edge>,
}

/// Factor one shared derivation prefix, if any, and report whether a
/// rewrite happened. A node reached twice from the same terminal means
/// two productions of some nonterminal can begin with that terminal;
/// the shared prefix is hoisted into a fresh sub-nonterminal.
pub(crate) fn eliminate_backtracking(
    grammar: &mut Grammar,
    graph: &FirstSetGraph,
    names: &mut NameTable,
) -> Result<bool, BuildError> {
    for &terminal in &graph.terminal_nodes {
        if graph.node(terminal).symbol == Symbol::End {
            continue;
        }
        let mut path_map: HashMap<NodeId, Path> = HashMap::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![terminal];
        while let Some(id) = stack.pop() {
            for edge in &graph.node(id).edges {
                let mut new_path = path_map.get(&id).cloned().unwrap_or_default();
                new_path.edges.push(*edge);
                if visited.contains(&edge.to) {
                    let old_path = path_map.get(&edge.to).cloned().unwrap_or_default();
                    extract_common_factor(&new_path, &old_path, terminal, grammar, graph, names)?;
                    return Ok(true);
                }
                visited.insert(edge.to);
                stack.push(edge.to);
                path_map.insert(edge.to, new_path);
            }
        }
    }
    Ok(false)
}

/// Hoist the prefix shared by two paths converging on the same node: a
/// new production `left -> terminal X` takes the common front, and both
/// path suffixes are rewritten to hang off the fresh `X`.
fn extract_common_factor(
    new_path: &Path,
    old_path: &Path,
    terminal: NodeId,
    grammar: &mut Grammar,
    graph: &FirstSetGraph,
    names: &mut NameTable,
) -> Result<(), BuildError> {
    let last_pid = match new_path.edges.last() {
        Some(edge) => edge.production,
        None => return Ok(()),
    };
    let left = grammar.productions[last_pid].left;

    // Find the first edge where the two derivations diverge.
    let mut index = 0;
    let mut start_node;
    let mut last_next = terminal;
    loop {
        start_node = last_next;
        let (new_edge, old_edge) = match (new_path.edges.get(index), old_path.edges.get(index)) {
            (Some(n), Some(o)) => (n, o),
            _ => {
                return Err(BuildError::NoCommonFactor {
                    non_terminal: names.resolve(left).to_string(),
                })
            }
        };
        last_next = new_edge.to;
        index += 1;
        if new_edge.production != old_edge.production {
            break;
        }
    }
    let diverge = index - 1;

    // Both suffixes share the last production `left -> terminal X`.
    let new_left = names.fresh(left);
    let start_symbol = graph.node(start_node).symbol;
    grammar.productions.push(Production::new(
        left,
        smallvec![start_symbol, Symbol::NonTerminal(new_left)],
    ));

    extract_front(new_path, diverge, start_node, new_left, grammar, graph, names);
    extract_front(old_path, diverge, start_node, new_left, grammar, graph, names);
    Ok(())
}

/// Rewrite a path suffix so its derivations are reachable through
/// `common`: the diverging production loses its leading symbol, middle
/// productions are cloned (when their node has other inbound edges) or
/// rewritten in place, and the last production lands under `common`.
fn extract_front(
    path: &Path,
    from: usize,
    start_node: NodeId,
    common: Name,
    grammar: &mut Grammar,
    graph: &FirstSetGraph,
    names: &mut NameTable,
) {
    let mut pre_non_terminal: Option<Name> = None;
    let last = path.edges.len() - 1;
    for index in from..path.edges.len() {
        let edge = path.edges[index];
        let is_first = index == from;
        let is_last = index == last;
        let pid = edge.production;
        let left = grammar.productions[pid].left;

        let mut new_right = grammar.productions[pid].right.clone();
        new_right.remove(0);
        if !is_first {
            if let Some(pre) = pre_non_terminal {
                new_right.insert(0, Symbol::NonTerminal(pre));
            }
        }
        if new_right.is_empty() {
            new_right.push(Symbol::End);
        }

        if is_first && is_last {
            grammar.productions[pid].left = common;
            grammar.productions[pid].right = new_right;
        } else if is_first {
            let new_left = names.fresh(left);
            pre_non_terminal = Some(new_left);
            grammar.productions[pid].left = new_left;
            grammar.productions[pid].right = new_right;
        } else if is_last {
            grammar.productions.push(Production::new(common, new_right));
        } else {
            let new_left = names.fresh(left);
            pre_non_terminal = Some(new_left);
            grammar.productions.push(Production::new(new_left, new_right));
        }

        if !is_last && graph.node(edge.to).edges.len() > 1 {
            if let Some(pre) = pre_non_terminal {
                let new_left = names.fresh(left);
                grammar.productions.push(Production::new(
                    new_left,
                    smallvec![graph.node(start_node).symbol, Symbol::NonTerminal(pre)],
                ));
                grammar
                    .productions
                    .push(Production::new(new_left, smallvec![Symbol::NonTerminal(left)]));
                let next_edge = path.edges[index + 1];
                for other in &graph.node(edge.to).edges {
                    if other.production == next_edge.production {
                        continue;
                    }
                    let right = &mut grammar.productions[other.production].right;
                    right.remove(0);
                    right.insert(0, Symbol::NonTerminal(new_left));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Terminal;

    fn arith_grammar(names: &mut NameTable) -> Grammar {
        // E = E "+" T | T; T = "a";
        let e = names.intern("E");
        let t = names.intern("T");
        Grammar::new(
            e,
            vec![
                Production::new(
                    e,
                    smallvec![
                        Symbol::NonTerminal(e),
                        Symbol::Terminal(0),
                        Symbol::NonTerminal(t)
                    ],
                ),
                Production::new(e, smallvec![Symbol::NonTerminal(t)]),
                Production::new(t, smallvec![Symbol::Terminal(1)]),
            ],
            vec![Terminal::Literal("+".into()), Terminal::Literal("a".into())],
        )
    }

    #[test]
    fn test_prune_drops_unreachable_productions() {
        let mut names = NameTable::new();
        let s = names.intern("S");
        let dead = names.intern("Dead");
        let mut grammar = Grammar::new(
            s,
            vec![
                Production::new(s, smallvec![Symbol::Terminal(0)]),
                Production::new(dead, smallvec![Symbol::Terminal(0)]),
            ],
            vec![Terminal::Literal("a".into())],
        );
        prune_unreachable(&mut grammar);
        assert_eq!(grammar.productions.len(), 1);
        assert_eq!(grammar.productions[0].left, s);
    }

    #[test]
    fn test_prune_drops_empty_rights() {
        let mut names = NameTable::new();
        let s = names.intern("S");
        let mut grammar = Grammar::new(
            s,
            vec![
                Production::new(s, smallvec![]),
                Production::new(s, smallvec![Symbol::Terminal(0)]),
            ],
            vec![Terminal::Literal("a".into())],
        );
        prune_unreachable(&mut grammar);
        assert_eq!(grammar.productions.len(), 1);
    }

    #[test]
    fn test_direct_left_recursion_is_broken() {
        let mut names = NameTable::new();
        let mut grammar = arith_grammar(&mut names);
        let graph = FirstSetGraph::build(&grammar);
        let changed = eliminate_left_recursion(&mut grammar, &graph, &mut names).unwrap();
        assert!(changed);

        let e = names.intern("E");
        let e1 = names.get("E1").expect("fresh nonterminal E1");
        let t = names.intern("T");

        // E = T E1; E1 = "+" T E1 | ε; T = "a";
        let expect = |left, right: &[Symbol<Name>]| {
            assert!(
                grammar
                    .productions
                    .iter()
                    .any(|p| p.left == left && p.right.as_slice() == right),
                "missing production {left:?} -> {right:?} in {:?}",
                grammar.productions
            );
        };
        expect(e, &[Symbol::NonTerminal(t), Symbol::NonTerminal(e1)]);
        expect(
            e1,
            &[
                Symbol::Terminal(0),
                Symbol::NonTerminal(t),
                Symbol::NonTerminal(e1),
            ],
        );
        expect(e1, &[Symbol::End]);

        // And no production starts with its own left nonterminal.
        for p in &grammar.productions {
            assert_ne!(p.right[0], Symbol::NonTerminal(p.left));
        }
    }

    #[test]
    fn test_common_prefix_is_factored() {
        let mut names = NameTable::new();
        // S = "a" B | "a" C; B = "b"; C = "c";
        let s = names.intern("S");
        let b = names.intern("B");
        let c = names.intern("C");
        let mut grammar = Grammar::new(
            s,
            vec![
                Production::new(s, smallvec![Symbol::Terminal(0), Symbol::NonTerminal(b)]),
                Production::new(s, smallvec![Symbol::Terminal(0), Symbol::NonTerminal(c)]),
                Production::new(b, smallvec![Symbol::Terminal(1)]),
                Production::new(c, smallvec![Symbol::Terminal(2)]),
            ],
            vec![
                Terminal::Literal("a".into()),
                Terminal::Literal("b".into()),
                Terminal::Literal("c".into()),
            ],
        );
        let graph = FirstSetGraph::build(&grammar);
        let changed = eliminate_backtracking(&mut grammar, &graph, &mut names).unwrap();
        assert!(changed);

        let s1 = names.get("S1").expect("fresh nonterminal S1");
        assert!(grammar.productions.iter().any(|p| {
            p.left == s
                && p.right.as_slice() == [Symbol::Terminal(0), Symbol::NonTerminal(s1)]
        }));
        assert!(grammar
            .productions
            .iter()
            .any(|p| p.left == s1 && p.right.as_slice() == [Symbol::NonTerminal(b)]));
        assert!(grammar
            .productions
            .iter()
            .any(|p| p.left == s1 && p.right.as_slice() == [Symbol::NonTerminal(c)]));
    }

    #[test]
    fn test_remove_right_first_end_folds_epsilon_only_prefix() {
        let mut names = NameTable::new();
        // S = N "a"; N = ε;  (N derives only epsilon)
        let s = names.intern("S");
        let n = names.intern("N");
        let mut grammar = Grammar::new(
            s,
            vec![
                Production::new(s, smallvec![Symbol::NonTerminal(n), Symbol::Terminal(0)]),
                Production::new(n, smallvec![Symbol::End]),
            ],
            vec![Terminal::Literal("a".into())],
        );
        let graph = FirstSetGraph::build(&grammar);
        let changed = remove_right_first_end(&mut grammar, &graph);
        assert!(!changed, "pass reports no change by design");
        assert_eq!(
            grammar.productions[0].right.as_slice(),
            [Symbol::Terminal(0)]
        );
    }
}
