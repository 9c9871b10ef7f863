use std::time::Duration;

use crate::error::SolverError;
use crate::sat::assignment::Model;
use crate::sat::cnf::Cnf;

/// The answer of a single SAT call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Satisfiable(Model),
    Unsatisfiable,
    /// The backend gave up, usually because the timeout expired.
    Unknown,
}

impl SolveOutcome {
    #[must_use]
    pub const fn is_sat(&self) -> bool {
        matches!(self, Self::Satisfiable(_))
    }
}

/// Counters kept by a backend across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolverStats {
    pub calls: usize,
    pub satisfiable: usize,
    pub unsatisfiable: usize,
    pub unknown: usize,
    pub time: Duration,
}

impl SolverStats {
    pub(crate) fn record(&mut self, outcome: &SolveOutcome, elapsed: Duration) {
        self.calls += 1;
        self.time += elapsed;
        match outcome {
            SolveOutcome::Satisfiable(_) => self.satisfiable += 1,
            SolveOutcome::Unsatisfiable => self.unsatisfiable += 1,
            SolveOutcome::Unknown => self.unknown += 1,
        }
    }
}

/// A SAT backend: anything that can decide a [`Cnf`] and hand back a model.
pub trait SatSolver {
    /// Decides `cnf`, giving up after `timeout` if one is set.
    ///
    /// # Errors
    ///
    /// If the backend could not be run at all. Running out of time is not an error; it is
    /// reported as [`SolveOutcome::Unknown`].
    fn solve(&mut self, cnf: &Cnf, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError>;

    fn stats(&self) -> SolverStats;

    fn name(&self) -> &str;
}

impl<S: SatSolver + ?Sized> SatSolver for Box<S> {
    fn solve(&mut self, cnf: &Cnf, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError> {
        (**self).solve(cnf, timeout)
    }

    fn stats(&self) -> SolverStats {
        (**self).stats()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
