//! An in-process DPLL (Davis-Putnam-Logemann-Loveland) backend.
//!
//! The solver is intentionally small: chronological backtracking over an explicit trail,
//! unit propagation driven by per-literal occurrence lists, and a fixed variable order.
//! It is meant for small instances (tests, the totalizer checks, toy timetables), not for
//! full-term timetables, which should go to an external competition solver through [`ExternalSolver`](crate::sat::external::ExternalSolver).
//!
//! The core loop:
//! 1.  **Unit Propagation:** whenever a literal becomes false, every clause containing it is
//!     revisited; a clause with one unassigned literal left forces that literal, a clause with
//!     none is a conflict.
//! 2.  **Decision:** the lowest unassigned variable is set to `false` first.
//! 3.  **Backtracking:** on conflict the most recent decision that has not been flipped yet is
//!     undone and retried with the opposite value.

use std::time::{Duration, Instant};

use log::trace;

use crate::error::SolverError;
use crate::sat::assignment::{Model, VarState};
use crate::sat::cnf::Cnf;
use crate::sat::literal::{Lit, Var};
use crate::sat::solver::{SatSolver, SolveOutcome, SolverStats};

/// How often (in decisions) the deadline is polled.
const DEADLINE_POLL_INTERVAL: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct DpllSolver {
    stats: SolverStats,
    /// Decisions made over all calls.
    pub decisions: usize,
    /// Literals forced by unit propagation over all calls.
    pub propagations: usize,
}

impl DpllSolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SatSolver for DpllSolver {
    fn solve(&mut self, cnf: &Cnf, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError> {
        let start = Instant::now();
        let deadline = timeout.map(|t| start + t);

        let mut search = Search::new(cnf);
        let outcome = match search.run(deadline) {
            Some(true) => SolveOutcome::Satisfiable(search.model()),
            Some(false) => SolveOutcome::Unsatisfiable,
            None => SolveOutcome::Unknown,
        };

        self.decisions += search.decisions;
        self.propagations += search.propagations;
        self.stats.record(&outcome, start.elapsed());
        trace!(
            "dpll: {} decisions, {} propagations, {:?}",
            search.decisions,
            search.propagations,
            start.elapsed()
        );

        Ok(outcome)
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }

    fn name(&self) -> &str {
        "dpll"
    }
}

#[derive(Debug, Clone, Copy)]
struct Decision {
    trail_len: usize,
    lit: Lit,
    flipped: bool,
}

#[derive(Debug)]
struct Search<'a> {
    cnf: &'a Cnf,
    values: Vec<VarState>,
    /// For each literal code, the clauses containing that literal.
    occurrences: Vec<Vec<usize>>,
    trail: Vec<Lit>,
    decisions_stack: Vec<Decision>,
    queue_head: usize,
    decisions: usize,
    propagations: usize,
}

const fn code(lit: Lit) -> usize {
    lit.var().index() * 2 + if lit.is_positive() { 0 } else { 1 }
}

impl<'a> Search<'a> {
    fn new(cnf: &'a Cnf) -> Self {
        let num_vars = cnf.num_vars as usize;
        let mut occurrences = vec![Vec::new(); (num_vars + 1) * 2];
        for (i, clause) in cnf.iter().enumerate() {
            for &lit in clause.iter() {
                occurrences[code(lit)].push(i);
            }
        }

        Self {
            cnf,
            values: vec![VarState::Unassigned; num_vars + 1],
            occurrences,
            trail: Vec::new(),
            decisions_stack: Vec::new(),
            queue_head: 0,
            decisions: 0,
            propagations: 0,
        }
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        match self.values[lit.var().index()] {
            VarState::Assigned(b) => Some(b == lit.is_positive()),
            VarState::Unassigned => None,
        }
    }

    fn assign(&mut self, lit: Lit) {
        self.values[lit.var().index()] = VarState::Assigned(lit.is_positive());
        self.trail.push(lit);
    }

    /// Assigns the unit clauses of the input. Returns `false` on an immediate contradiction.
    fn assign_units(&mut self) -> bool {
        let cnf = self.cnf;
        for clause in cnf.iter() {
            if clause.is_empty() {
                return false;
            }
            if clause.is_unit() {
                match self.value(clause[0]) {
                    Some(false) => return false,
                    Some(true) => {}
                    None => self.assign(clause[0]),
                }
            }
        }
        true
    }

    /// Propagates every trail literal not yet processed. Returns `false` on conflict.
    fn propagate(&mut self) -> bool {
        let cnf = self.cnf;
        while self.queue_head < self.trail.len() {
            let falsified = self.trail[self.queue_head].negated();
            self.queue_head += 1;

            for idx in 0..self.occurrences[code(falsified)].len() {
                let clause_idx = self.occurrences[code(falsified)][idx];
                let mut unassigned = None;
                let mut open = 0;
                let mut satisfied = false;

                for &lit in cnf[clause_idx].iter() {
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
                    (1, Some(unit)) => {
                        self.propagations += 1;
                        self.assign(unit);
                    }
                    _ => {}
                }
            }
        }
        true
    }

    /// Undoes the most recent unflipped decision and retries it with the other polarity.
    /// Returns `false` when every decision has been exhausted.
    fn backtrack(&mut self) -> bool {
        while let Some(decision) = self.decisions_stack.pop() {
            for lit in self.trail.drain(decision.trail_len..) {
                self.values[lit.var().index()] = VarState::Unassigned;
            }
            self.queue_head = decision.trail_len;

            if !decision.flipped {
                let flipped = decision.lit.negated();
                self.decisions_stack.push(Decision {
                    trail_len: decision.trail_len,
                    lit: flipped,
                    flipped: true,
                });
                self.assign(flipped);
                return true;
            }
        }
        false
    }

    fn pick(&self) -> Option<Var> {
        self.values
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, v)| v.is_unassigned())
            .map(|(i, _)| Var::new(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    /// `Some(true)` if satisfiable, `Some(false)` if unsatisfiable, `None` on timeout.
    fn run(&mut self, deadline: Option<Instant>) -> Option<bool> {
        if !self.assign_units() {
            return Some(false);
        }

        loop {
            if !self.propagate() {
                if !self.backtrack() {
                    return Some(false);
                }
                continue;
            }

            let Some(var) = self.pick() else {
                return Some(true);
            };

            self.decisions += 1;
            if self.decisions % DEADLINE_POLL_INTERVAL == 0
                && deadline.is_some_and(|d| Instant::now() >= d)
            {
                return None;
            }

            let lit = var.negative();
            self.decisions_stack.push(Decision {
                trail_len: self.trail.len(),
                lit,
                flipped: false,
            });
            self.assign(lit);
        }
    }

    fn model(&self) -> Model {
        Model::from_literals(self.trail.iter().map(|l| l.to_i32()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve(clauses: Vec<Vec<i32>>) -> SolveOutcome {
        DpllSolver::new().solve(&Cnf::from(clauses), None).unwrap()
    }

    #[test]
    fn test_simple_sat() {
        let cnf = Cnf::from(vec![vec![1, 2], vec![-1, 3], vec![-3, -2]]);
        let SolveOutcome::Satisfiable(model) = DpllSolver::new().solve(&cnf, None).unwrap() else {
            panic!("expected a model");
        };
        assert!(cnf.verify(&model));
    }

    #[test]
    fn test_simple_unsat() {
        assert_eq!(
            solve(vec![vec![1, 2], vec![-1, 2], vec![1, -2], vec![-1, -2]]),
            SolveOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_contradictory_units() {
        assert_eq!(solve(vec![vec![3], vec![-3]]), SolveOutcome::Unsatisfiable);
    }

    #[test]
    fn test_empty_formula_is_sat() {
        assert!(solve(vec![]).is_sat());
    }

    #[test]
    fn test_pigeonhole_three_into_two_is_unsat() {
        // p(i, h) = pigeon i in hole h, variable 2 * i + h + 1
        let p = |i: i32, h: i32| 2 * i + h + 1;
        let mut clauses = Vec::new();
        for i in 0..3 {
            clauses.push(vec![p(i, 0), p(i, 1)]);
        }
        for h in 0..2 {
            for i in 0..3 {
                for j in (i + 1)..3 {
                    clauses.push(vec![-p(i, h), -p(j, h)]);
                }
            }
        }
        assert_eq!(solve(clauses), SolveOutcome::Unsatisfiable);
    }

    #[test]
    fn test_stats_are_recorded() {
        let mut solver = DpllSolver::new();
        let _ = solver.solve(&Cnf::from(vec![vec![1]]), None).unwrap();
        let _ = solver.solve(&Cnf::from(vec![vec![1], vec![-1]]), None).unwrap();
        let stats = solver.stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.satisfiable, 1);
        assert_eq!(stats.unsatisfiable, 1);
    }
}
