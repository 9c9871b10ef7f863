#![warn(missing_docs)]
//! This crate compiles a university course timetable with prioritised preferences into SAT
//! and finds a schedule that is optimal level by level.

/// The `error` module defines the error taxonomy shared by loading, solving and search.
pub mod error;

/// The `sat` module holds the solver-facing layer: literals, clauses, CNF, DIMACS I/O, an
/// in-process DPLL backend and the adapter for external solver executables.
pub mod sat;

/// The `timetable` module implements the domain model (rooms, time slots, sections, faculty,
/// constraints), the JSON snapshot loader and consistency checks.
pub mod timetable;

/// The `encoding` module translates a timetable and its constraints into clauses and
/// criterion variables.
pub mod encoding;

/// The `search` module implements the priority-lexicographic search and decodes models into
/// schedules.
pub mod search;
