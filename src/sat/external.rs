//! Runs an external SAT solver as a subprocess.
//!
//! The protocol is the one used by the SAT competitions: the instance is written to a DIMACS
//! file whose path is passed as the last argument, the solver exits with `10` for SAT or
//! `20` for UNSAT, and a satisfying assignment is printed on one or more `v` lines.
//! Solvers that do not follow the exit-code convention are handled by reading their `s`
//! status line instead, or failing that, any `v` lines they printed. A claimed assignment is
//! only accepted if it satisfies the instance.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::SolverError;
use crate::sat::assignment::Model;
use crate::sat::cnf::Cnf;
use crate::sat::dimacs::{self, Status};
use crate::sat::solver::{SatSolver, SolveOutcome, SolverStats};

const EXIT_SATISFIABLE: i32 = 10;
const EXIT_UNSATISFIABLE: i32 = 20;

/// A SAT solver executable driven through files and exit codes.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    program: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
    keep_files: bool,
    stats: SolverStats,
}

impl ExternalSolver {
    /// A solver invoked as `program <instance.cnf>`, using the system temporary directory for
    /// its files.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: std::env::temp_dir(),
            keep_files: false,
            stats: SolverStats::default(),
        }
    }

    /// Extra arguments placed before the instance path.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Leave the instance and output files behind after each call, for debugging.
    #[must_use]
    pub const fn keep_files(mut self, keep: bool) -> Self {
        self.keep_files = keep;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn instance_files(&self) -> InstanceFiles {
        let stem = format!("timetable-{}-{:016x}", std::process::id(), fastrand::u64(..));
        InstanceFiles {
            instance: self.work_dir.join(format!("{stem}.cnf")),
            output: self.work_dir.join(format!("{stem}.out")),
            keep: self.keep_files,
        }
    }
}

impl SatSolver for ExternalSolver {
    fn solve(&mut self, cnf: &Cnf, timeout: Option<Duration>) -> Result<SolveOutcome, SolverError> {
        let start = Instant::now();
        let files = self.instance_files();

        dimacs::write_file(cnf, &files.instance)?;
        debug!(
            "running {} on {} ({} vars, {} clauses)",
            self.program.display(),
            files.instance.display(),
            cnf.num_vars,
            cnf.num_clauses()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&files.instance)
            .stdout(File::create(&files.output)?)
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SolverError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = match timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => Some(status),
                None => {
                    // the process may exit between the timeout and the kill
                    let _ = child.kill();
                    let _ = child.wait()?;
                    None
                }
            },
            None => Some(child.wait()?),
        };

        let outcome = match status {
            Some(status) => interpret(status, &fs::read_to_string(&files.output)?, cnf)?,
            None => {
                debug!("{} timed out after {:?}", self.program.display(), start.elapsed());
                SolveOutcome::Unknown
            }
        };

        self.stats.record(&outcome, start.elapsed());
        Ok(outcome)
    }

    fn stats(&self) -> SolverStats {
        self.stats
    }

    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("external")
    }
}

fn interpret(status: ExitStatus, stdout: &str, cnf: &Cnf) -> Result<SolveOutcome, SolverError> {
    let output = dimacs::parse_solver_output(stdout);

    match status.code() {
        Some(EXIT_SATISFIABLE) => witness(cnf, output.literals),
        Some(EXIT_UNSATISFIABLE) => Ok(SolveOutcome::Unsatisfiable),
        code => match output.status {
            Some(Status::Satisfiable) => witness(cnf, output.literals),
            Some(Status::Unsatisfiable) => Ok(SolveOutcome::Unsatisfiable),
            Some(Status::Unknown) => Ok(SolveOutcome::Unknown),
            None if !output.literals.is_empty() => witness(cnf, output.literals),
            None if code.is_none() => Ok(SolveOutcome::Unknown),
            None => Err(SolverError::MalformedOutput(format!(
                "exit code {} and no status line",
                code.unwrap_or_default()
            ))),
        },
    }
}

/// Accepts the solver's literals as a model only if they stay within the instance and
/// satisfy every clause.
fn witness(cnf: &Cnf, literals: Vec<i32>) -> Result<SolveOutcome, SolverError> {
    if let Some(&lit) = literals.iter().find(|l| l.unsigned_abs() > cnf.num_vars) {
        return Err(SolverError::MalformedOutput(format!(
            "assignment mentions variable {} but the instance has {}",
            lit.unsigned_abs(),
            cnf.num_vars
        )));
    }
    let model = Model::from_literals(literals);
    if !cnf.verify(&model) {
        return Err(SolverError::MalformedOutput(
            "reported assignment does not satisfy the instance".to_string(),
        ));
    }
    Ok(SolveOutcome::Satisfiable(model))
}

/// The files of one solver call, removed on drop unless asked to keep them.
#[derive(Debug)]
struct InstanceFiles {
    instance: PathBuf,
    output: PathBuf,
    keep: bool,
}

impl Drop for InstanceFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in [&self.instance, &self.output] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove {}: {e}", path.display());
                }
            }
        }
    }
}
