//! # Predictive Table Construction
//!
//! The build-time half of the crate: run the transformation pipeline to
//! a fixed point, then populate the LL(1) table.
//!
//! ## Pipeline
//!
//! Each iteration prunes unreachable productions, rebuilds the first-set
//! graph, folds epsilon-only prefixes, and gives the left-recursion and
//! left-factoring passes one rewrite each. The loop ends when no pass
//! reports a change; a configurable iteration cap bounds pathological
//! grammars (see [`BuildOptions`]).
//!
//! ## Table population
//!
//! FIRST entries come from a DFS over the settled graph: every
//! nonterminal reachable from a terminal `t` gets a `(nonterminal, t)`
//! entry holding the right-hand side of the production on the arriving
//! edge, and a second claim on the same slot is an LL(1) conflict.
//! FOLLOW entries are a closure over production contexts seeded at the
//! epsilon productions; they fill `(nonterminal, follower)` slots with
//! the epsilon right-hand side wherever FIRST left a gap.

use crate::error::BuildError;
use crate::grammar::graph::FirstSetGraph;
use crate::grammar::{passes, Grammar, Symbol, SymbolSeq, TerminalId};
use crate::intern::{Name, NameTable};
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};

type Row<N> = HashMap<Symbol<N>, SymbolSeq<N>, RandomState>;

/// Knobs for table construction.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Upper bound on pipeline iterations before the grammar is declared
    /// not LL(1)-reducible.
    pub max_iterations: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_iterations: 256,
        }
    }
}

/// The predictive parse table: `nonterminal -> lookahead -> right-hand
/// side`. Immutable once built.
#[derive(Debug, Clone)]
pub struct LlTable<N> {
    start: N,
    rows: HashMap<N, Row<N>, RandomState>,
}

impl<N> PartialEq for LlTable<N>
where
    N: Copy + Eq + std::hash::Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.rows == other.rows
    }
}

impl<N> LlTable<N>
where
    N: Copy + Eq + std::hash::Hash,
{
    pub(crate) fn new(start: N) -> Self {
        Self {
            start,
            rows: HashMap::with_hasher(RandomState::new()),
        }
    }

    #[must_use]
    pub const fn start(&self) -> N {
        self.start
    }

    /// The production body chosen for `(non_terminal, lookahead)`, if
    /// any.
    #[must_use]
    pub fn predict(&self, non_terminal: N, lookahead: &Symbol<N>) -> Option<&[Symbol<N>]> {
        self.rows
            .get(&non_terminal)?
            .get(lookahead)
            .map(SymbolSeq::as_slice)
    }

    /// The terminals that may begin `non_terminal`, sorted by id. These
    /// are the matcher candidates the lexer is told to try.
    #[must_use]
    pub fn candidates(&self, non_terminal: N) -> Vec<TerminalId> {
        let mut out: Vec<TerminalId> = self
            .rows
            .get(&non_terminal)
            .map(|row| {
                row.keys()
                    .filter_map(|symbol| match symbol {
                        Symbol::Terminal(id) => Some(*id),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = (&N, &Row<N>)> {
        self.rows.iter()
    }

    pub(crate) fn insert(&mut self, non_terminal: N, lookahead: Symbol<N>, right: SymbolSeq<N>) {
        self.rows
            .entry(non_terminal)
            .or_default()
            .insert(lookahead, right);
    }
}

impl<N> LlTable<N> {
    /// Number of populated `(nonterminal, lookahead)` entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }
}

/// Rewrite `grammar` into LL(1) shape in place, returning the number of
/// pipeline iterations it took. Exposed separately from [`build`] so the
/// transformed grammar itself can be inspected.
pub fn transform(
    grammar: &mut Grammar,
    names: &mut NameTable,
    options: &BuildOptions,
) -> Result<usize, BuildError> {
    let mut iterations = 0;
    loop {
        if iterations >= options.max_iterations {
            return Err(BuildError::NotReducible { iterations });
        }
        iterations += 1;
        passes::prune_unreachable(grammar);
        let graph = FirstSetGraph::build(grammar);
        passes::remove_right_first_end(grammar, &graph);
        if passes::eliminate_left_recursion(grammar, &graph, names)? {
            continue;
        }
        if passes::eliminate_backtracking(grammar, &graph, names)? {
            continue;
        }
        return Ok(iterations);
    }
}

/// Transform `grammar` and build its predictive table.
pub fn build(
    grammar: &mut Grammar,
    names: &mut NameTable,
    options: &BuildOptions,
) -> Result<LlTable<Name>, BuildError> {
    grammar.check_well_formed(names)?;
    transform(grammar, names, options)?;
    // The epsilon-prefix pass mutates without reporting, so analysis is
    // rebuilt once more over the settled grammar.
    let graph = FirstSetGraph::build(grammar);

    let mut table = LlTable::new(grammar.start);
    let mut first_sets: Vec<HashSet<Symbol<Name>>> =
        vec![HashSet::new(); grammar.productions.len()];
    create_first_entries(grammar, &graph, names, &mut table, &mut first_sets)?;
    create_follow_entries(grammar, &first_sets, &mut table);
    Ok(table)
}

/// DFS from each terminal node: every nonterminal it reaches has the
/// terminal in its FIRST set, and the production on the arriving edge is
/// the prediction. A slot claimed twice is an LL(1) conflict.
fn create_first_entries(
    grammar: &Grammar,
    graph: &FirstSetGraph,
    names: &NameTable,
    table: &mut LlTable<Name>,
    first_sets: &mut [HashSet<Symbol<Name>>],
) -> Result<(), BuildError> {
    for &terminal_node in &graph.terminal_nodes {
        let terminal_symbol = graph.node(terminal_node).symbol;
        if terminal_symbol == Symbol::End {
            continue;
        }
        let mut stack: Vec<(Option<usize>, _)> = vec![(None, terminal_node)];
        while let Some((arriving, node_id)) = stack.pop() {
            let node = graph.node(node_id);
            if let (Symbol::NonTerminal(left), Some(pid)) = (node.symbol, arriving) {
                let row = table
                    .rows
                    .entry(left)
                    .or_default();
                if row.contains_key(&terminal_symbol) {
                    return Err(BuildError::Conflict {
                        non_terminal: names.resolve(left).to_string(),
                        lookahead: lookahead_text(grammar, terminal_symbol),
                    });
                }
                row.insert(terminal_symbol, grammar.productions[pid].right.clone());
                first_sets[pid].insert(terminal_symbol);
            }
            for edge in &node.edges {
                stack.push((Some(edge.production), edge.to));
            }
        }
    }
    Ok(())
}

/// Closure over production contexts, seeded at the epsilon productions.
/// Direct followers (the symbol after an occurrence) accumulate in a
/// leaf set; an occurrence in last position links the containing
/// production so its own followers propagate down later.
fn create_follow_entries(
    grammar: &Grammar,
    first_sets: &[HashSet<Symbol<Name>>],
    table: &mut LlTable<Name>,
) {
    let production_count = grammar.productions.len();
    let mut previous: Vec<Vec<usize>> = vec![Vec::new(); production_count];
    let mut leaf_sets: Vec<(usize, HashSet<Symbol<Name>>)> = Vec::new();

    let mut work: Vec<usize> = (0..production_count)
        .filter(|&pid| grammar.productions[pid].right.first() == Some(&Symbol::End))
        .collect();

    while !work.is_empty() {
        let mut next_work = Vec::new();
        for &wid in &work {
            let work_left = grammar.productions[wid].left;
            let mut leaf: HashSet<Symbol<Name>> = HashSet::new();
            if work_left == grammar.start {
                // End of input follows the start symbol, in addition to
                // whatever its occurrences contribute below.
                leaf.insert(Symbol::End);
            }
            for (mid, context) in grammar.productions.iter().enumerate() {
                if context.left == work_left {
                    continue;
                }
                for (i, symbol) in context.right.iter().enumerate() {
                    if *symbol != Symbol::NonTerminal(work_left) {
                        continue;
                    }
                    if i + 1 >= context.right.len() {
                        // Occurrence in last position: FOLLOW(work_left)
                        // inherits FOLLOW(context.left).
                        if previous[mid].is_empty() {
                            next_work.push(mid);
                        }
                        if !previous[mid].contains(&wid) {
                            previous[mid].push(wid);
                        }
                        continue;
                    }
                    match context.right[i + 1] {
                        Symbol::NonTerminal(successor) => {
                            for (pid, production) in grammar.productions.iter().enumerate() {
                                if production.left == successor {
                                    leaf.extend(first_sets[pid].iter().copied());
                                }
                            }
                        }
                        follower @ Symbol::Terminal(_) => {
                            leaf.insert(follower);
                        }
                        Symbol::End => {
                            leaf.insert(Symbol::End);
                        }
                    }
                }
            }
            leaf_sets.push((wid, leaf));
        }
        work = next_work;
    }

    // Propagate each leaf set down its previous-links to the epsilon
    // productions, filling slots FIRST left empty.
    for (origin, symbols) in &leaf_sets {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack = vec![*origin];
        while let Some(pid) = stack.pop() {
            if !seen.insert(pid) {
                continue;
            }
            if previous[pid].is_empty() {
                let left = grammar.productions[pid].left;
                let row = table.rows.entry(left).or_default();
                for symbol in symbols {
                    row.entry(*symbol)
                        .or_insert_with(|| grammar.productions[pid].right.clone());
                }
            } else {
                stack.extend(previous[pid].iter().copied());
            }
        }
    }
}

fn lookahead_text(grammar: &Grammar, symbol: Symbol<Name>) -> String {
    match symbol {
        Symbol::Terminal(id) => grammar.terminals[id].display(),
        Symbol::NonTerminal(_) => "<nonterminal>".to_string(),
        Symbol::End => "<end of input>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Production, Terminal};
    use smallvec::smallvec;

    fn arith(names: &mut NameTable) -> Grammar {
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
    fn test_arithmetic_table() {
        let mut names = NameTable::new();
        let mut grammar = arith(&mut names);
        let table = build(&mut grammar, &mut names, &BuildOptions::default()).unwrap();

        let e = names.intern("E");
        let t = names.intern("T");
        let e1 = names.get("E1").expect("fresh nonterminal");
        let plus = Symbol::Terminal(0);
        let a = Symbol::Terminal(1);

        assert_eq!(
            table.predict(e, &a),
            Some(&[Symbol::NonTerminal(t), Symbol::NonTerminal(e1)][..])
        );
        assert_eq!(
            table.predict(e1, &plus),
            Some(&[plus, Symbol::NonTerminal(t), Symbol::NonTerminal(e1)][..])
        );
        assert_eq!(table.predict(e1, &Symbol::End), Some(&[Symbol::End][..]));
        assert_eq!(table.predict(t, &a), Some(&[a][..]));
        assert_eq!(table.predict(e, &plus), None);
    }

    #[test]
    fn test_candidates_are_sorted_terminals() {
        let mut names = NameTable::new();
        let mut grammar = arith(&mut names);
        let table = build(&mut grammar, &mut names, &BuildOptions::default()).unwrap();
        let e1 = names.get("E1").unwrap();
        // E1 predicts on "+" and on End; only the terminal is a
        // candidate for the lexer.
        assert_eq!(table.candidates(e1), vec![0]);
        assert_eq!(table.candidates(names.intern("E")), vec![1]);
    }

    #[test]
    fn test_iteration_cap_reports_not_reducible() {
        let mut names = NameTable::new();
        let mut grammar = arith(&mut names);
        let options = BuildOptions { max_iterations: 1 };
        assert!(matches!(
            build(&mut grammar, &mut names, &options),
            Err(BuildError::NotReducible { .. })
        ));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let mut names = NameTable::new();
        let mut grammar = arith(&mut names);
        transform(&mut grammar, &mut names, &BuildOptions::default()).unwrap();
        let snapshot = grammar.productions.clone();
        let second = transform(&mut grammar, &mut names, &BuildOptions::default()).unwrap();
        assert_eq!(second, 1, "second run should settle immediately");
        assert_eq!(grammar.productions, snapshot);
    }

    #[test]
    fn test_first_conflict_is_reported() {
        // Two productions of S both start with the same terminal; fed
        // straight to table population this is the conflict the builder
        // must refuse.
        let mut names = NameTable::new();
        let s = names.intern("S");
        let a = names.intern("A");
        let b = names.intern("B");
        let grammar = Grammar::new(
            s,
            vec![
                Production::new(s, smallvec![Symbol::NonTerminal(a)]),
                Production::new(s, smallvec![Symbol::NonTerminal(b)]),
                Production::new(a, smallvec![Symbol::Terminal(0)]),
                Production::new(b, smallvec![Symbol::Terminal(0)]),
            ],
            vec![Terminal::Literal("x".into())],
        );
        let graph = FirstSetGraph::build(&grammar);
        let mut table = LlTable::new(grammar.start);
        let mut first_sets = vec![HashSet::new(); grammar.productions.len()];
        let result = create_first_entries(&grammar, &graph, &names, &mut table, &mut first_sets);
        assert!(matches!(
            result,
            Err(BuildError::Conflict { non_terminal, .. }) if non_terminal == "S"
        ));
    }

    #[test]
    fn test_follow_through_chained_last_positions() {
        // S = "(" A ")"; A = B; B = ε | "b";
        // FOLLOW(B) must inherit ")" through A.
        let mut names = NameTable::new();
        let s = names.intern("S");
        let a = names.intern("A");
        let b = names.intern("B");
        let mut grammar = Grammar::new(
            s,
            vec![
                Production::new(
                    s,
                    smallvec![
                        Symbol::Terminal(0),
                        Symbol::NonTerminal(a),
                        Symbol::Terminal(1)
                    ],
                ),
                Production::new(a, smallvec![Symbol::NonTerminal(b)]),
                Production::new(b, smallvec![Symbol::End]),
                Production::new(b, smallvec![Symbol::Terminal(2)]),
            ],
            vec![
                Terminal::Literal("(".into()),
                Terminal::Literal(")".into()),
                Terminal::Literal("b".into()),
            ],
        );
        let table = build(&mut grammar, &mut names, &BuildOptions::default()).unwrap();
        assert_eq!(
            table.predict(b, &Symbol::Terminal(1)),
            Some(&[Symbol::End][..])
        );
        assert_eq!(
            table.predict(b, &Symbol::Terminal(2)),
            Some(&[Symbol::Terminal(2)][..])
        );
    }
}
