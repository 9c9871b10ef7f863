#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
use core::fmt;
use core::ops::{Neg, Not};

/// A propositional variable. Identifiers start at 1, as in DIMACS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    /// # Panics
    ///
    /// If `id` is zero or does not fit in a DIMACS literal.
    #[must_use]
    pub fn new(id: u32) -> Self {
        assert!(id > 0, "variable 0 is reserved as the DIMACS clause terminator");
        assert!(i32::try_from(id).is_ok(), "variable {id} overflows a DIMACS literal");
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn positive(self) -> Lit {
        Lit(self.0 as i32)
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn negative(self) -> Lit {
        Lit(-(self.0 as i32))
    }

    #[must_use]
    pub const fn lit(self, polarity: bool) -> Lit {
        if polarity { self.positive() } else { self.negative() }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed literal in DIMACS convention: `v` is the variable, `-v` its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Lit(i32);

impl Lit {
    /// # Panics
    ///
    /// If `value` is zero.
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        assert_ne!(value, 0, "0 is not a literal");
        Self(value)
    }

    #[must_use]
    pub const fn to_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn var(self) -> Var {
        Var(self.0.unsigned_abs())
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn negated(self) -> Self {
        Self(-self.0)
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl Not for Lit {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

impl Not for Var {
    type Output = Lit;

    fn not(self) -> Self::Output {
        self.negative()
    }
}

impl From<Var> for Lit {
    fn from(var: Var) -> Self {
        var.positive()
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_neg() {
        let v = Var::new(7);
        assert_eq!(!v.positive(), v.negative());
        assert_eq!(-v.negative(), v.positive());
        assert_eq!(!v, Lit::from_i32(-7));
    }

    #[test]
    fn test_literal_var_and_polarity() {
        let lit = Lit::from_i32(-3);
        assert_eq!(lit.var(), Var::new(3));
        assert!(!lit.is_positive());
        assert_eq!(Var::new(3).lit(false), lit);
    }

    #[test]
    #[should_panic(expected = "variable 0 is reserved")]
    fn test_zero_variable_rejected() {
        let _ = Var::new(0);
    }
}
