//! What a finished search hands back: the placement, the violations it had to accept and
//! the per-level optimum that was proven.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Serialize;

/// Where and when one section meets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// `None` for sections without candidate rooms.
    pub room: Option<String>,
    pub time_slot: String,
}

/// Section name to its assignment, ordered by name.
pub type Placement = BTreeMap<String, Assignment>;

/// A criterion that is set in the final model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Violation {
    pub priority: u32,
    pub message: String,
}

/// Counters collected over one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub levels_solved: usize,
    pub solver_calls: usize,
    /// Size of the largest instance handed to the solver.
    pub max_vars: u32,
    pub max_clauses: usize,
    pub encode_time: Duration,
    pub solve_time: Duration,
}

impl SearchStats {
    pub(crate) fn record_instance(&mut self, vars: u32, clauses: usize) {
        self.max_vars = self.max_vars.max(vars);
        self.max_clauses = self.max_clauses.max(clauses);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub placement: Placement,
    pub violations: BTreeSet<Violation>,
    /// Fewest criteria that had to be set at each solved level.
    pub level_minimums: BTreeMap<u32, usize>,
    /// The level the search was working on when it ran out of time.
    pub incomplete_level: Option<u32>,
    pub stats: SearchStats,
}

impl Schedule {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.incomplete_level.is_none()
    }

    pub fn violations_at(&self, priority: u32) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.priority == priority)
    }

    /// Violation counts per priority, most important first, e.g. `1:0 2:3 3:1`.
    #[must_use]
    pub fn score(&self) -> String {
        self.level_minimums
            .iter()
            .filter(|&(&p, _)| p > 0)
            .map(|(p, k)| format!("{p}:{k}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialises the schedule for the persistence layer.
    ///
    /// # Errors
    ///
    /// If serialisation fails, which only happens on I/O errors of the writer.
    pub fn write_json<W: std::io::Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.placement.keys().map(String::len).max().unwrap_or(0);
        for (section, assignment) in &self.placement {
            write!(f, "{section:<width$}  {}", assignment.time_slot)?;
            if let Some(room) = &assignment.room {
                write!(f, "  {room}")?;
            }
            writeln!(f)?;
        }

        if !self.violations.is_empty() {
            writeln!(f)?;
            for v in &self.violations {
                writeln!(f, "[{}] {}", v.priority, v.message)?;
            }
        }

        write!(f, "\nscore: {}", self.score())?;
        if let Some(p) = self.incomplete_level {
            write!(f, " (level {p} not finished)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Schedule {
        let mut placement = Placement::new();
        placement.insert(
            "CS 1400".to_string(),
            Assignment {
                room: Some("SET 105".to_string()),
                time_slot: "MWF0900".to_string(),
            },
        );
        placement.insert(
            "CS 6000".to_string(),
            Assignment {
                room: None,
                time_slot: "TR1200".to_string(),
            },
        );
        Schedule {
            placement,
            violations: [
                Violation {
                    priority: 2,
                    message: "Ada wants 1 day(s) off on MWF".to_string(),
                },
                Violation {
                    priority: 1,
                    message: "CS 1400 placed in SET 105".to_string(),
                },
            ]
            .into_iter()
            .collect(),
            level_minimums: [(0, 0), (1, 1), (2, 1)].into_iter().collect(),
            incomplete_level: Some(3),
            stats: SearchStats::default(),
        }
    }

    #[test]
    fn test_score_skips_hard_level() {
        assert_eq!(schedule().score(), "1:1 2:1");
    }

    #[test]
    fn test_violations_are_ordered_by_priority() {
        let s = schedule();
        let first = s.violations.iter().next().unwrap();
        assert_eq!(first.priority, 1);
        assert_eq!(s.violations_at(2).count(), 1);
        assert!(!s.is_complete());
    }

    #[test]
    fn test_display() {
        let text = schedule().to_string();
        assert!(text.contains("CS 1400  MWF0900  SET 105"));
        assert!(text.contains("CS 6000  TR1200\n"));
        assert!(text.contains("[2] Ada wants 1 day(s) off on MWF"));
        assert!(text.ends_with("score: 1:1 2:1 (level 3 not finished)"));
    }

    #[test]
    fn test_json() {
        let mut out = Vec::new();
        schedule().write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["placement"]["CS 6000"]["room"], serde_json::Value::Null);
        assert_eq!(value["level_minimums"]["1"], 1);
        assert_eq!(value["incomplete_level"], 3);
    }
}
