//! Error types shared across the crate.
//!
//! The taxonomy mirrors how a scheduling run can fail:
//! - [`DataError`]: the snapshot handed to the engine is inconsistent (a constraint names an
//!   entity that does not exist, a malformed time, ...). These are detected before any
//!   encoding happens.
//! - [`SolverError`]: the SAT backend could not be run or produced output we cannot read.
//! - [`ScheduleError`]: the terminal outcomes of a priority search that produced no schedule.
//!
//! Encoder invariant violations are not represented here; they panic, because they signal a
//! bug in the encoder rather than bad input.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by the scheduling entry points.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Inconsistencies in the timetable snapshot.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read timetable snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed timetable snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("constraint '{constraint}' references unknown section '{section}'")]
    UnknownSection { constraint: String, section: String },

    #[error("constraint '{constraint}' references unknown faculty '{faculty}'")]
    UnknownFaculty { constraint: String, faculty: String },

    #[error("'{owner}' references unknown room '{room}'")]
    UnknownRoom { owner: String, room: String },

    #[error("'{owner}' references unknown time slot '{time_slot}'")]
    UnknownTimeSlot { owner: String, time_slot: String },

    #[error("section '{0}' has no candidate time slots")]
    NoCandidateTimeSlots(String),

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("invalid time '{0}': expected HH:MM on a 5 minute boundary")]
    InvalidTime(String),

    #[error("invalid days '{0}': expected letters from MTWRFSU")]
    InvalidDays(String),

    #[error("invalid duration {0}: expected a positive multiple of 5 minutes")]
    InvalidDuration(i64),

    #[error("time slot conflict between '{0}' and '{1}' is not symmetric")]
    AsymmetricConflict(String, String),
}

/// Failures of a SAT backend.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("IO error while talking to the solver: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start solver '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("unreadable solver output: {0}")]
    MalformedOutput(String),
}

/// Terminal outcomes of a priority search that produced no schedule at all.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("the timetable is infeasible at priority {priority}")]
    Infeasible { priority: u32 },

    #[error("time budget exhausted while searching priority {priority}; no schedule was found")]
    BudgetExhausted { priority: u32 },
}

impl DataError {
    pub(crate) fn unknown_section(constraint: impl Into<String>, section: impl Into<String>) -> Self {
        Self::UnknownSection {
            constraint: constraint.into(),
            section: section.into(),
        }
    }

    pub(crate) fn unknown_faculty(constraint: impl Into<String>, faculty: impl Into<String>) -> Self {
        Self::UnknownFaculty {
            constraint: constraint.into(),
            faculty: faculty.into(),
        }
    }
}
