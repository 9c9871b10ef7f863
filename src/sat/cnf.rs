#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! An in-memory CNF formula.
//!
//! A [`Cnf`] is the hand-off format between the encoders and the SAT backends: a flat list of
//! [`Clause`]s plus the largest variable identifier in use. Its [`Display`](fmt::Display)
//! implementation renders the DIMACS text that external solvers consume.

use core::fmt;
use core::ops::Index;

use crate::sat::assignment::Model;
use crate::sat::clause::Clause;
use crate::sat::literal::Var;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnf {
    /// Largest variable identifier that may appear in the formula.
    pub num_vars: u32,
    pub clauses: Vec<Clause>,
}

impl Cnf {
    #[must_use]
    pub fn new(num_vars: u32, clauses: Vec<Clause>) -> Self {
        let used = clauses
            .iter()
            .flat_map(Clause::iter)
            .map(|l| l.var().id())
            .max()
            .unwrap_or(0);
        Self {
            num_vars: num_vars.max(used),
            clauses,
        }
    }

    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    #[must_use]
    pub fn num_literals(&self) -> usize {
        self.clauses.iter().map(Clause::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = Var> {
        (1..=self.num_vars).map(Var::new)
    }

    pub fn add_clause(&mut self, clause: Clause) {
        if let Some(max) = clause.iter().map(|l| l.var().id()).max() {
            self.num_vars = self.num_vars.max(max);
        }
        self.clauses.push(clause);
    }

    /// Checks that every clause has at least one literal satisfied by `model`.
    #[must_use]
    pub fn verify(&self, model: &Model) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|&l| model.satisfies(l)))
    }
}

impl Index<usize> for Cnf {
    type Output = Clause;

    fn index(&self, index: usize) -> &Self::Output {
        &self.clauses[index]
    }
}

impl From<Vec<Vec<i32>>> for Cnf {
    fn from(clauses: Vec<Vec<i32>>) -> Self {
        Self::new(0, clauses.into_iter().map(Clause::from).collect())
    }
}

impl fmt::Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "p cnf {} {}", self.num_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for lit in clause.iter() {
                write!(f, "{lit} ")?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_vars_tracks_largest_literal() {
        let cnf = Cnf::from(vec![vec![1, -4], vec![2]]);
        assert_eq!(cnf.num_vars, 4);
        assert_eq!(cnf.num_clauses(), 2);
        assert_eq!(cnf.num_literals(), 3);
    }

    #[test]
    fn test_display_is_dimacs() {
        let cnf = Cnf::from(vec![vec![1, -2], vec![2, 3]]);
        assert_eq!(cnf.to_string(), "p cnf 3 2\n-2 1 0\n2 3 0\n");
    }

    #[test]
    fn test_verify() {
        let cnf = Cnf::from(vec![vec![1, -2], vec![2, 3]]);
        assert!(cnf.verify(&Model::from_literals([1, 2, -3])));
        assert!(!cnf.verify(&Model::from_literals([-1, 2, -3])));
        // absent variables count as false
        assert!(cnf.verify(&Model::from_literals([3])));
    }
}
