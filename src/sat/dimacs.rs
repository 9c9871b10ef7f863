#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Writing the DIMACS CNF format, and reading SAT competition solver output.
//!
//! The DIMACS CNF format is a standard text-based format for representing
//! boolean satisfiability problems:
//! - A problem line 'p cnf <`num_variables`> <`num_clauses`>'.
//! - Clause lines: space-separated signed integers terminated by '0'.
//!
//! Solvers following the competition conventions answer with an 's' status line and
//! one or more 'v' lines holding the model, the last of which ends with '0'.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::sat::cnf::Cnf;

/// Writes `cnf` in DIMACS format.
///
/// # Errors
///
/// Propagates any error of the underlying writer.
pub fn write_dimacs<W: Write>(cnf: &Cnf, writer: W) -> io::Result<()> {
    let mut out = BufWriter::new(writer);
    writeln!(out, "p cnf {} {}", cnf.num_vars, cnf.num_clauses())?;
    for clause in cnf.iter() {
        for lit in clause.iter() {
            write!(out, "{lit} ")?;
        }
        writeln!(out, "0")?;
    }
    out.flush()
}

/// Writes `cnf` to the file at `path`, replacing it if it exists.
///
/// # Errors
///
/// If the file cannot be created or written.
pub fn write_file(cnf: &Cnf, path: impl AsRef<Path>) -> io::Result<()> {
    write_dimacs(cnf, File::create(path)?)
}

/// The status line of a solver answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Satisfiable,
    Unsatisfiable,
    Unknown,
}

/// What could be read from a solver's standard output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SolverOutput {
    pub status: Option<Status>,
    /// The literals of every 'v' line, concatenated, without the terminating zero.
    pub literals: Vec<i32>,
}

/// Reads the 's' status line and the concatenated 'v' lines of a solver answer.
///
/// Tokens on 'v' lines that are not integers are skipped, so a truncated answer still yields
/// whatever literals it holds.
#[must_use]
pub fn parse_solver_output(text: &str) -> SolverOutput {
    let mut output = SolverOutput::default();

    for line in text.lines().map(str::trim) {
        if let Some(status) = line.strip_prefix("s ") {
            output.status = match status.trim() {
                "SATISFIABLE" => Some(Status::Satisfiable),
                "UNSATISFIABLE" => Some(Status::Unsatisfiable),
                _ => Some(Status::Unknown),
            };
        } else if let Some(values) = line.strip_prefix('v') {
            output.literals.extend(
                values
                    .split_whitespace()
                    .filter_map(|t| t.parse::<i32>().ok())
                    .filter(|&v| v != 0),
            );
        }
    }

    output
}
