//! A small complete DPLL solver.
//!
//! Unit propagation plus chronological backtracking. Variables are decided
//! in index order and tried `true` first, so the first model found is the
//! lexicographically greatest one under that variable order. The resolver
//! relies on this for deterministic version selection.

use std::time::Instant;

/// A literal: variable index plus polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit {
    pub var: usize,
    pub positive: bool,
}

impl Lit {
    pub fn pos(var: usize) -> Self {
        Self { var, positive: true }
    }

    pub fn neg(var: usize) -> Self {
        Self {
            var,
            positive: false,
        }
    }
}

/// A disjunction of literals.
pub type Clause = Vec<Lit>;

/// Search limits. Exceeding either ends the search as [`SolveOutcome::Exhausted`].
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_decisions: u64,
    pub deadline: Option<Instant>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self {
            max_decisions: u64::MAX,
            deadline: None,
        }
    }

    fn expired(&self, decisions: u64) -> bool {
        decisions > self.max_decisions || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// A full assignment, indexed by variable.
    Sat(Vec<bool>),
    Unsat,
    /// The budget ran out before the search finished.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
struct Decision {
    trail_len: usize,
    var: usize,
    /// Both polarities have been tried.
    flipped: bool,
}

struct Search<'a> {
    clauses: &'a [&'a Clause],
    assignment: Vec<Option<bool>>,
    trail: Vec<usize>,
}

impl Search<'_> {
    fn value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.var].map(|v| v == lit.positive)
    }

    fn assign(&mut self, var: usize, value: bool) {
        self.assignment[var] = Some(value);
        self.trail.push(var);
    }

    fn undo_to(&mut self, len: usize) {
        while self.trail.len() > len {
            if let Some(var) = self.trail.pop() {
                self.assignment[var] = None;
            }
        }
    }

    /// Apply unit propagation to a fixed point. Returns `false` on conflict.
    fn propagate(&mut self) -> bool {
        let clauses = self.clauses;
        loop {
            let mut changed = false;
            for clause in clauses {
                let mut satisfied = false;
                let mut unassigned = None;
                let mut open = 0usize;
                for &lit in clause.iter() {
                    match self.value(lit) {
                        Some(true) => {
                            satisfied = true;
                            break;
                        }
                        Some(false) => {}
                        None => {
                            open += 1;
                            unassigned = Some(lit);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (open, unassigned) {
                    (0, _) => return false,
                    (1, Some(lit)) => {
                        self.assign(lit.var, lit.positive);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }

    fn next_unassigned(&self) -> Option<usize> {
        self.assignment.iter().position(Option::is_none)
    }
}

/// Decide satisfiability of the conjunction of `clauses` over `num_vars`
/// variables.
pub fn solve(num_vars: usize, clauses: &[&Clause], budget: Budget) -> SolveOutcome {
    let mut search = Search {
        clauses,
        assignment: vec![None; num_vars],
        trail: Vec::new(),
    };
    let mut decisions: Vec<Decision> = Vec::new();
    let mut count: u64 = 0;

    loop {
        if !search.propagate() {
            // Backtrack to the most recent decision with an untried polarity.
            loop {
                let Some(last) = decisions.pop() else {
                    return SolveOutcome::Unsat;
                };
                search.undo_to(last.trail_len);
                if !last.flipped {
                    decisions.push(Decision {
                        flipped: true,
                        ..last
                    });
                    search.assign(last.var, false);
                    break;
                }
            }
            continue;
        }

        let Some(var) = search.next_unassigned() else {
            let model = search
                .assignment
                .iter()
                .map(|v| v.unwrap_or(false))
                .collect();
            return SolveOutcome::Sat(model);
        };

        count += 1;
        if budget.expired(count) {
            return SolveOutcome::Exhausted;
        }
        decisions.push(Decision {
            trail_len: search.trail.len(),
            var,
            flipped: false,
        });
        search.assign(var, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(num_vars: usize, clauses: &[Clause]) -> SolveOutcome {
        let refs: Vec<&Clause> = clauses.iter().collect();
        solve(num_vars, &refs, Budget::unlimited())
    }

    fn satisfies(model: &[bool], clauses: &[Clause]) -> bool {
        clauses
            .iter()
            .all(|c| c.iter().any(|l| model[l.var] == l.positive))
    }

    #[test]
    fn test_empty_formula_prefers_true() {
        assert_eq!(run(3, &[]), SolveOutcome::Sat(vec![true, true, true]));
    }

    #[test]
    fn test_unit_clauses_force_values() {
        let clauses = vec![vec![Lit::neg(0)], vec![Lit::pos(0), Lit::pos(1)]];
        assert_eq!(run(2, &clauses), SolveOutcome::Sat(vec![false, true]));
    }

    #[test]
    fn test_contradiction_is_unsat() {
        let clauses = vec![vec![Lit::pos(0)], vec![Lit::neg(0)]];
        assert_eq!(run(1, &clauses), SolveOutcome::Unsat);
    }

    #[test]
    fn test_exactly_one_picks_first_variable() {
        // x0 + x1 + x2 = 1
        let clauses = vec![
            vec![Lit::pos(0), Lit::pos(1), Lit::pos(2)],
            vec![Lit::neg(0), Lit::neg(1)],
            vec![Lit::neg(0), Lit::neg(2)],
            vec![Lit::neg(1), Lit::neg(2)],
        ];
        assert_eq!(run(3, &clauses), SolveOutcome::Sat(vec![true, false, false]));
    }

    #[test]
    fn test_backtracking_finds_model() {
        // x0 -> x1, x1 -> x2, not x2: forces x0 = false
        let clauses = vec![
            vec![Lit::neg(0), Lit::pos(1)],
            vec![Lit::neg(1), Lit::pos(2)],
            vec![Lit::neg(2)],
        ];
        let SolveOutcome::Sat(model) = run(3, &clauses) else {
            panic!("expected a model");
        };
        assert!(satisfies(&model, &clauses));
        assert!(!model[0]);
    }

    #[test]
    fn test_pigeonhole_three_into_two_is_unsat() {
        // p(i, h) = var i*2 + h
        let v = |i: usize, h: usize| i * 2 + h;
        let mut clauses = Vec::new();
        for i in 0..3 {
            clauses.push(vec![Lit::pos(v(i, 0)), Lit::pos(v(i, 1))]);
        }
        for h in 0..2 {
            for i in 0..3 {
                for j in (i + 1)..3 {
                    clauses.push(vec![Lit::neg(v(i, h)), Lit::neg(v(j, h))]);
                }
            }
        }
        assert_eq!(run(6, &clauses), SolveOutcome::Unsat);
    }

    #[test]
    fn test_decision_budget_exhausts() {
        let budget = Budget {
            max_decisions: 0,
            deadline: None,
        };
        let clause = vec![Lit::pos(0), Lit::pos(1)];
        assert_eq!(solve(2, &[&clause], budget), SolveOutcome::Exhausted);
    }
}
