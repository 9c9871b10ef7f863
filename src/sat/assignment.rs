#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
use core::fmt;
use core::ops::Index;

use crate::sat::literal::{Lit, Var};

/// The truth value of a variable in a partial assignment.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default, Hash, PartialOrd, Ord)]
pub enum VarState {
    #[default]
    Unassigned,
    Assigned(bool),
}

impl VarState {
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        !self.is_assigned()
    }

    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::Assigned(true))
    }
}

/// A complete assignment returned by a SAT backend.
///
/// Solvers are free to omit variables from their output; any variable that was never
/// mentioned reads as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model(Vec<bool>);

impl Model {
    /// Builds a model from DIMACS-style signed literals. Zeros are ignored.
    pub fn from_literals(literals: impl IntoIterator<Item = i32>) -> Self {
        let mut values = Vec::new();
        for value in literals.into_iter().filter(|&v| v != 0) {
            let index = value.unsigned_abs() as usize;
            if values.len() <= index {
                values.resize(index + 1, false);
            }
            values[index] = value > 0;
        }
        Self(values)
    }

    #[must_use]
    pub fn value(&self, var: Var) -> bool {
        self.0.get(var.index()).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn satisfies(&self, lit: Lit) -> bool {
        self.value(lit.var()) == lit.is_positive()
    }

    /// The variables assigned `true`, in increasing order.
    pub fn true_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.0
            .iter()
            .enumerate()
            .skip(1)
            .filter(|&(_, &b)| b)
            .map(|(i, _)| Var::new(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    /// Number of variables assigned `true` among `vars`.
    pub fn count_true<'a>(&self, vars: impl IntoIterator<Item = &'a Var>) -> usize {
        vars.into_iter().filter(|&&v| self.value(v)).count()
    }
}

impl Index<Var> for Model {
    type Output = bool;

    fn index(&self, var: Var) -> &Self::Output {
        self.0.get(var.index()).unwrap_or(&false)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v")?;
        for (i, &b) in self.0.iter().enumerate().skip(1) {
            if b {
                write!(f, " {i}")?;
            } else {
                write!(f, " -{i}")?;
            }
        }
        write!(f, " 0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_absent_vars_are_false() {
        let model = Model::from_literals([1, -2, 5, 0]);
        assert!(model.value(Var::new(1)));
        assert!(!model.value(Var::new(2)));
        assert!(!model.value(Var::new(3)));
        assert!(model.value(Var::new(5)));
        assert!(!model.value(Var::new(40)));
        assert!(model.satisfies(Lit::from_i32(-40)));
    }

    #[test]
    fn test_true_vars() {
        let model = Model::from_literals([3, -1, 2]);
        let vars: Vec<u32> = model.true_vars().map(Var::id).collect();
        assert_eq!(vars, vec![2, 3]);
        assert_eq!(model.count_true(&[Var::new(1), Var::new(2)]), 1);
    }

    #[test]
    fn test_display() {
        let model = Model::from_literals([1, -2]);
        assert_eq!(model.to_string(), "v 1 -2 0");
    }
}
