#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
use core::ops::Index;

use smallvec::SmallVec;

use crate::sat::literal::Lit;

/// A disjunction of literals.
///
/// Literals are kept sorted and free of duplicates so that two clauses over the same set of
/// literals compare (and hash) equal, which is what lets the encoding context collapse
/// duplicate clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Clause {
    literals: SmallVec<[Lit; 8]>,
}

impl Clause {
    pub fn new(literals: impl IntoIterator<Item = Lit>) -> Self {
        let mut literals: SmallVec<[Lit; 8]> = literals.into_iter().collect();
        literals.sort_unstable();
        literals.dedup();
        Self { literals }
    }

    /// `true` if the clause contains a literal and its negation, so it holds under every
    /// assignment.
    #[must_use]
    pub fn is_tautology(&self) -> bool {
        // sorted by signed value, so `-v` and `v` sit on opposite sides of zero
        self.literals
            .iter()
            .take_while(|l| !l.is_positive())
            .any(|l| self.literals.binary_search(&l.negated()).is_ok())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.len() == 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lit> {
        self.literals.iter()
    }

    #[must_use]
    pub fn contains(&self, lit: Lit) -> bool {
        self.literals.binary_search(&lit).is_ok()
    }

    #[must_use]
    pub fn literals(&self) -> &[Lit] {
        &self.literals
    }
}

impl Index<usize> for Clause {
    type Output = Lit;

    fn index(&self, index: usize) -> &Self::Output {
        &self.literals[index]
    }
}

impl FromIterator<Lit> for Clause {
    fn from_iter<T: IntoIterator<Item = Lit>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<i32>> for Clause {
    fn from(literals: Vec<i32>) -> Self {
        Self::new(literals.into_iter().map(Lit::from_i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_normalises_order_and_duplicates() {
        let a = Clause::from(vec![3, -1, 3, 2]);
        let b = Clause::from(vec![2, 3, -1]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a[0], Lit::from_i32(-1));
    }

    #[test]
    fn test_clause_tautology() {
        assert!(Clause::from(vec![1, -2, 2]).is_tautology());
        assert!(!Clause::from(vec![1, -2, 3]).is_tautology());
        assert!(!Clause::default().is_tautology());
    }
}
