//! Lexicographic search over priority levels.
//!
//! Levels are solved most important first. At each level the engine asks for the smallest
//! number of that level's criteria that must be set, with every earlier level pinned to the
//! minimum it already proved, so a less important level can never buy an improvement with a
//! worse outcome at a more important one. Level 0 is hard: its criteria are always false.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::encoding::context::{EncoderCache, EncodingContext};
use crate::encoding::encode_constraint;
use crate::encoding::placement::{encode_placement, encode_room_conflicts};
use crate::encoding::totalizer::at_most_k;
use crate::error::{ScheduleError, ScheduleResult};
use crate::sat::literal::{Lit, Var};
use crate::sat::solver::{SatSolver, SolveOutcome};
use crate::search::decode::decode;
use crate::search::schedule::{Placement, Schedule, SearchStats, Violation};
use crate::timetable::model::TimetableData;
use crate::timetable::validation::validate;

/// Limits for one search. The default has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Upper bound on each solver call.
    pub solver_timeout: Option<Duration>,
    /// Wall-clock budget for the whole search, checked between solver calls.
    pub time_budget: Option<Duration>,
    /// Stop after this level.
    pub max_priority: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    EncodingLevel(u32),
    Solving { priority: u32, k: usize },
    LevelSolved { priority: u32, k: usize },
    Infeasible(u32),
    Done,
}

enum LevelOutcome {
    Solved {
        k: usize,
        placement: Placement,
        violations: BTreeSet<Violation>,
    },
    OutOfTime,
}

/// Builds the instance for `priority`: base placement, every constraint up to and including
/// `priority`, and each earlier level capped at its entry in `pins` (0 if absent).
///
/// Returns the context together with the criteria of `priority` itself, which are left
/// unbounded.
///
/// # Panics
///
/// If an encoder registers a criterion that no clause mentions.
#[must_use]
pub fn encode_level<'a>(
    data: &'a TimetableData,
    priority: u32,
    pins: &BTreeMap<u32, usize>,
) -> (EncodingContext<'a>, Vec<Var>) {
    let mut ctx = EncodingContext::new(data);
    let mut cache = EncoderCache::new();
    encode_placement(&mut ctx);
    encode_room_conflicts(&mut ctx);

    for constraint in data.constraints.iter().filter(|c| c.priority <= priority) {
        encode_constraint(&mut ctx, &mut cache, constraint);
    }
    ctx.assert_criteria_used();

    for level in data.priorities().into_iter().filter(|&l| l < priority) {
        let k = pins.get(&level).copied().unwrap_or(0);
        let lits: Vec<Lit> = ctx.criteria_at(level).into_iter().map(Var::positive).collect();
        at_most_k(&mut ctx, &lits, k);
    }

    let criteria = ctx.criteria_at(priority);
    (ctx, criteria)
}

/// Drives the level-by-level search with one SAT backend.
pub struct PriorityEngine<'a, S: SatSolver> {
    data: &'a TimetableData,
    solver: S,
    options: SearchOptions,
    state: SearchState,
    minimums: BTreeMap<u32, usize>,
    stats: SearchStats,
}

impl<'a, S: SatSolver> PriorityEngine<'a, S> {
    pub fn new(data: &'a TimetableData, solver: S, options: SearchOptions) -> Self {
        Self {
            data,
            solver,
            options,
            state: SearchState::Idle,
            minimums: BTreeMap::new(),
            stats: SearchStats::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SearchState {
        self.state
    }

    pub const fn solver(&self) -> &S {
        &self.solver
    }

    /// The levels that will be searched, in order. Level 0 is always first.
    #[must_use]
    pub fn levels(&self) -> Vec<u32> {
        let mut levels = self.data.priorities();
        levels.insert(0);
        levels
            .into_iter()
            .filter(|&p| self.options.max_priority.is_none_or(|max| p <= max))
            .collect()
    }

    /// Runs the search to completion or until the time budget runs out.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::Data`] if the snapshot is inconsistent.
    /// - [`ScheduleError::Solver`] if the backend could not be run.
    /// - [`ScheduleError::Infeasible`] if a level cannot be satisfied at all.
    /// - [`ScheduleError::BudgetExhausted`] if time ran out before level 0 was solved.
    ///
    /// Running out of time at a later level is not an error: the schedule of the last
    /// solved level comes back with [`Schedule::incomplete_level`] set.
    pub fn run(&mut self) -> ScheduleResult<Schedule> {
        validate(self.data)?;
        let start = Instant::now();
        self.minimums.clear();
        self.stats = SearchStats::default();
        let mut best: Option<(Placement, BTreeSet<Violation>)> = None;

        for priority in self.levels() {
            self.state = SearchState::EncodingLevel(priority);
            info!("searching level {priority}");
            match self.solve_level(priority, start) {
                Ok(LevelOutcome::Solved {
                    k,
                    placement,
                    violations,
                }) => {
                    info!("level {priority} solved with {k} violation(s)");
                    self.state = SearchState::LevelSolved { priority, k };
                    self.minimums.insert(priority, k);
                    self.stats.levels_solved += 1;
                    best = Some((placement, violations));
                }
                Ok(LevelOutcome::OutOfTime) => {
                    warn!("time budget exhausted at level {priority}");
                    self.state = SearchState::Done;
                    return self.finish(best, Some(priority));
                }
                Err(e) => {
                    if let ScheduleError::Infeasible { priority } = &e {
                        self.state = SearchState::Infeasible(*priority);
                    }
                    return Err(e);
                }
            }
        }

        self.state = SearchState::Done;
        info!(
            "search finished after {} solver call(s) in {:.3}s",
            self.stats.solver_calls,
            start.elapsed().as_secs_f64()
        );
        self.finish(best, None)
    }

    fn finish(
        &self,
        best: Option<(Placement, BTreeSet<Violation>)>,
        incomplete_level: Option<u32>,
    ) -> ScheduleResult<Schedule> {
        let Some((placement, violations)) = best else {
            return Err(ScheduleError::BudgetExhausted {
                priority: incomplete_level.unwrap_or(0),
            });
        };
        Ok(Schedule {
            placement,
            violations,
            level_minimums: self.minimums.clone(),
            incomplete_level,
            stats: self.stats,
        })
    }

    /// Time left for the next solver call, or `None` if the budget is spent.
    fn next_timeout(&self, start: Instant) -> Option<Option<Duration>> {
        let remaining = match self.options.time_budget {
            Some(budget) => Some(budget.checked_sub(start.elapsed()).filter(|d| !d.is_zero())?),
            None => None,
        };
        Some(match (self.options.solver_timeout, remaining) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }

    fn solve_level(&mut self, priority: u32, start: Instant) -> ScheduleResult<LevelOutcome> {
        let encode_start = Instant::now();
        let (ctx, criteria) = encode_level(self.data, priority, &self.minimums);
        self.stats.encode_time += encode_start.elapsed();
        let lits: Vec<Lit> = criteria.iter().map(|v| v.positive()).collect();

        let max_k = if priority == 0 { 0 } else { criteria.len() };
        for k in 0..=max_k {
            let Some(timeout) = self.next_timeout(start) else {
                return Ok(LevelOutcome::OutOfTime);
            };
            self.state = SearchState::Solving { priority, k };

            let mut bounded = ctx.clone();
            if k < criteria.len() {
                at_most_k(&mut bounded, &lits, k);
            }
            let cnf = bounded.to_cnf();
            self.stats.record_instance(cnf.num_vars, cnf.num_clauses());
            debug!(
                "level {priority}, k = {k}: {} variables, {} clauses",
                cnf.num_vars,
                cnf.num_clauses()
            );

            let solve_start = Instant::now();
            let outcome = self.solver.solve(&cnf, timeout)?;
            self.stats.solve_time += solve_start.elapsed();
            self.stats.solver_calls += 1;

            match outcome {
                SolveOutcome::Satisfiable(model) => {
                    let (placement, violations) = decode(&bounded, &model);
                    return Ok(LevelOutcome::Solved {
                        k,
                        placement,
                        violations,
                    });
                }
                SolveOutcome::Unsatisfiable => debug!("level {priority}, k = {k}: unsatisfiable"),
                SolveOutcome::Unknown => return Ok(LevelOutcome::OutOfTime),
            }
        }

        Err(ScheduleError::Infeasible { priority })
    }
}
