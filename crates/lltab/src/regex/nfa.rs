//! The epsilon-NFA built from a parsed pattern, and the match engine
//! that drives it over a character source.
//!
//! States live in an arena and reference each other by index. A
//! transition without a condition is an epsilon transition. A state is
//! accepting when it has no transitions, or when an epsilon transition
//! (or a satisfied lookahead) leads to an accepting state.
//!
//! Lookahead transitions are zero-width: when the sub-automaton matches
//! at the current position the engine continues through the transition
//! without advancing, and the probe itself always restores the source
//! position it started from.

use super::ast::{Ast, SetItem};
use super::Controller;
use hashbrown::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StateId(usize);

#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Char(u8),
    Any,
    InSet { items: Vec<SetItem>, inverted: bool },
    Lookahead { start: StateId, inverted: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct Transition {
    condition: Option<Condition>,
    target: StateId,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Nfa {
    states: Vec<State>,
}

impl Nfa {
    /// Compile a parsed token sequence; returns the automaton and its
    /// start state.
    pub(crate) fn compile(tokens: &[Ast]) -> (Self, StateId) {
        let mut nfa = Self::default();
        let start = nfa.add_state();
        let mut current = start;
        for token in tokens {
            current = nfa.generate(token, current);
        }
        (nfa, start)
    }

    fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        StateId(self.states.len() - 1)
    }

    fn add_transition(&mut self, from: StateId, condition: Option<Condition>, target: StateId) {
        self.states[from.0].transitions.push(Transition { condition, target });
    }

    /// Append the states for one token, entering at `pre`; returns the
    /// token's end state.
    fn generate(&mut self, token: &Ast, pre: StateId) -> StateId {
        match token {
            Ast::Char(c) => {
                let end = self.add_state();
                self.add_transition(pre, Some(Condition::Char(*c)), end);
                end
            }
            Ast::Any => {
                let end = self.add_state();
                self.add_transition(pre, Some(Condition::Any), end);
                end
            }
            Ast::CharSet { items, inverted } => {
                let end = self.add_state();
                self.add_transition(
                    pre,
                    Some(Condition::InSet {
                        items: items.clone(),
                        inverted: *inverted,
                    }),
                    end,
                );
                end
            }
            Ast::Sequence(tokens) => {
                let mut current = pre;
                for t in tokens {
                    current = self.generate(t, current);
                }
                current
            }
            Ast::Alternation(left, right) => {
                let end = self.add_state();
                let left_end = self.generate(left, pre);
                self.add_transition(left_end, None, end);
                let right_end = self.generate(right, pre);
                self.add_transition(right_end, None, end);
                end
            }
            Ast::ZeroOrMore(inner) => {
                let end = self.add_state();
                self.add_transition(pre, None, end);
                let inner_end = self.generate(inner, pre);
                self.add_transition(inner_end, None, pre);
                end
            }
            Ast::ZeroOrOnce(inner) => {
                let end = self.generate(inner, pre);
                self.add_transition(pre, None, end);
                end
            }
            Ast::OnceOrMore(inner) => {
                let end = self.add_state();
                let inner_end = self.generate(inner, pre);
                self.add_transition(inner_end, None, pre);
                self.add_transition(inner_end, None, end);
                end
            }
            Ast::Lookahead { body, inverted } => {
                // The sub-automaton is detached; it is only entered by
                // the lookahead probe.
                let sub_start = self.add_state();
                let mut current = sub_start;
                for t in body {
                    current = self.generate(t, current);
                }
                let end = self.add_state();
                self.add_transition(
                    pre,
                    Some(Condition::Lookahead {
                        start: sub_start,
                        inverted: *inverted,
                    }),
                    end,
                );
                end
            }
        }
    }

    fn lookahead_holds(
        &self,
        start: StateId,
        inverted: bool,
        controller: &mut dyn Controller,
    ) -> bool {
        let mark = controller.mark();
        let hit = self.run(start, controller, true);
        controller.rewind(mark);
        hit != inverted
    }

    /// Whether `state` accepts at the current position, seeing through
    /// epsilon transitions and satisfied lookaheads. The visited set
    /// guards against epsilon cycles from nested quantifiers.
    fn is_matched(
        &self,
        state: StateId,
        controller: &mut dyn Controller,
        visited: &mut HashSet<StateId>,
    ) -> bool {
        if !visited.insert(state) {
            return false;
        }
        let transitions = &self.states[state.0].transitions;
        if transitions.is_empty() {
            return true;
        }
        transitions.iter().any(|t| match &t.condition {
            None => self.is_matched(t.target, controller, visited),
            Some(Condition::Lookahead { start, inverted }) => {
                self.lookahead_holds(*start, *inverted, controller)
                    && self.is_matched(t.target, controller, visited)
            }
            Some(_) => false,
        })
    }

    fn any_matched(&self, set: &HashSet<StateId>, controller: &mut dyn Controller) -> bool {
        set.iter()
            .any(|&state| self.is_matched(state, controller, &mut HashSet::new()))
    }

    /// Collect the states reachable from `state` on the next input byte.
    /// Conditions are evaluated against the controller and the position
    /// is restored after each probe; the caller advances the input once
    /// per step.
    fn accept_from(
        &self,
        state: StateId,
        controller: &mut dyn Controller,
        next: &mut HashSet<StateId>,
        visited: &mut HashSet<StateId>,
    ) {
        if !visited.insert(state) {
            return;
        }
        for t in &self.states[state.0].transitions {
            match &t.condition {
                None => self.accept_from(t.target, controller, next, visited),
                Some(Condition::Lookahead { start, inverted }) => {
                    if self.lookahead_holds(*start, *inverted, controller) {
                        self.accept_from(t.target, controller, next, visited);
                    }
                }
                Some(condition) => {
                    let mark = controller.mark();
                    if eval_condition(condition, controller) {
                        next.insert(t.target);
                    }
                    controller.rewind(mark);
                }
            }
        }
    }

    /// The match loop of §4.1: maintain the live state set, advance one
    /// byte at a time. Greedy records the last accepting position and
    /// rewinds to it when the set dies; lazy returns at the first
    /// accepting position.
    pub(crate) fn run(&self, start: StateId, controller: &mut dyn Controller, greedy: bool) -> bool {
        let mut current: HashSet<StateId> = HashSet::new();
        current.insert(start);

        if !greedy && self.any_matched(&current, controller) {
            return true;
        }
        let mut last_matched = if greedy && self.any_matched(&current, controller) {
            Some(controller.mark())
        } else {
            None
        };

        while controller.peek().is_some() {
            let mut next = HashSet::new();
            for &state in &current {
                self.accept_from(state, controller, &mut next, &mut HashSet::new());
            }
            controller.bump();
            current = next;

            if greedy {
                if current.is_empty() {
                    if let Some(mark) = last_matched {
                        controller.rewind(mark);
                        return true;
                    }
                    return false;
                }
                if self.any_matched(&current, controller) {
                    last_matched = Some(controller.mark());
                }
            } else {
                if current.is_empty() {
                    return false;
                }
                if self.any_matched(&current, controller) {
                    return true;
                }
            }
        }
        greedy && self.any_matched(&current, controller)
    }
}

fn eval_condition(condition: &Condition, controller: &mut dyn Controller) -> bool {
    match condition {
        Condition::Char(c) => controller.bump() == Some(*c),
        Condition::Any => controller.bump().is_some(),
        Condition::InSet { items, inverted } => match controller.bump() {
            Some(ch) => *inverted != items.iter().any(|item| item.contains(ch)),
            None => false,
        },
        // Handled by the caller; lookaheads do not consume.
        Condition::Lookahead { .. } => false,
    }
}
