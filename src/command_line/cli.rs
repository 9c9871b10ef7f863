#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, CommandFactory, Parser, Subcommand};
use log::{info, warn};
use thiserror::Error;
use tikv_jemalloc_ctl::{epoch, stats};

use timetable_sat::error::{DataError, ScheduleError};
use timetable_sat::sat::dimacs;
use timetable_sat::sat::dpll::DpllSolver;
use timetable_sat::sat::external::ExternalSolver;
use timetable_sat::sat::solver::SatSolver;
use timetable_sat::search::engine::{PriorityEngine, SearchOptions, encode_level};
use timetable_sat::search::schedule::Schedule;
use timetable_sat::timetable::loader::{self, LoadReport};
use timetable_sat::timetable::model::TimetableData;
use timetable_sat::timetable::validation::validate;

/// Defines the command-line interface for the timetabler.
#[derive(Parser, Debug)]
#[command(name = "timetable-sat", version, about = "Prioritised course timetabling with SAT")]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub common: CommonOptions,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the priority search and print the schedule.
    Solve {
        /// Timetable snapshot (JSON).
        #[arg(short, long)]
        input: PathBuf,

        /// External solver executable, called as `<solver> [args] <instance.cnf>`.
        #[arg(long, default_value = "kissat", conflicts_with = "builtin")]
        solver: PathBuf,

        /// Extra argument for the external solver; may be repeated.
        #[arg(long = "solver-arg", allow_hyphen_values = true)]
        solver_args: Vec<String>,

        /// Use the in-process DPLL backend instead of an external solver.
        #[arg(long, default_value_t = false)]
        builtin: bool,

        /// Per-call solver timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Wall-clock budget for the whole search in seconds.
        #[arg(long)]
        budget: Option<u64>,

        /// Stop after this priority level.
        #[arg(long)]
        max_priority: Option<u32>,

        /// Write the schedule as JSON to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for the solver's instance and output files.
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Keep the solver's instance and output files.
        #[arg(long, default_value_t = false)]
        keep_files: bool,
    },

    /// Write the DIMACS instance of one priority level.
    Export {
        #[arg(short, long)]
        input: PathBuf,

        /// The level whose criteria are left unbounded.
        #[arg(short, long)]
        priority: u32,

        /// Cap for an earlier level, as `level=k`; may be repeated. Unpinned levels are hard.
        #[arg(long = "pin", value_parser = parse_pin)]
        pins: Vec<(u32, usize)>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Load and validate a snapshot without solving.
    Check {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Generate shell completion scripts.
    Completions {
        /// The shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Defines common command-line options shared across different subcommands.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct CommonOptions {
    /// Enable debug output, providing more verbose logging during the search.
    #[arg(short, long, global = true, default_value_t = false, conflicts_with = "quiet")]
    pub(crate) debug: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, default_value_t = false)]
    pub(crate) quiet: bool,

    /// Print problem and search statistics after solving.
    #[arg(long, global = true, default_value_t = false)]
    pub(crate) stats: bool,
}

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

fn write_error(path: &Path) -> impl FnOnce(io::Error) -> CliError + '_ {
    move |source| CliError::Write {
        path: path.to_path_buf(),
        source,
    }
}

fn parse_pin(s: &str) -> Result<(u32, usize), String> {
    let (level, k) = s
        .split_once('=')
        .ok_or_else(|| format!("expected level=k, got '{s}'"))?;
    let level = level.trim().parse().map_err(|e| format!("bad level '{level}': {e}"))?;
    let k = k.trim().parse().map_err(|e| format!("bad count '{k}': {e}"))?;
    Ok((level, k))
}

fn load(input: &Path) -> Result<(TimetableData, LoadReport, Duration), CliError> {
    let time = Instant::now();
    let (data, report) = loader::load_file(input)?;
    let elapsed = time.elapsed();
    info!(
        "loaded {}: {} sections, {} rooms, {} time slots, {} faculty, {} constraints",
        input.display(),
        data.sections.len(),
        data.rooms.len(),
        data.time_slots.len(),
        data.faculty.len(),
        data.constraints.len()
    );
    if report.skipped() > 0 {
        warn!("{} constraint(s) of unsupported kinds were skipped", report.skipped());
    }
    Ok((data, report, elapsed))
}

/// Settings of the `solve` subcommand.
#[derive(Debug, Clone)]
pub(crate) struct SolveArgs {
    pub input: PathBuf,
    pub solver: PathBuf,
    pub solver_args: Vec<String>,
    pub builtin: bool,
    pub options: SearchOptions,
    pub output: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub keep_files: bool,
}

impl SolveArgs {
    fn backend(&self) -> Box<dyn SatSolver> {
        if self.builtin {
            return Box::new(DpllSolver::new());
        }
        let mut solver = ExternalSolver::new(&self.solver)
            .with_args(self.solver_args.iter().cloned())
            .keep_files(self.keep_files);
        if let Some(dir) = &self.work_dir {
            solver = solver.with_work_dir(dir);
        }
        Box::new(solver)
    }
}

/// Runs the priority search and reports the schedule.
///
/// # Errors
///
/// If the snapshot cannot be loaded, the search fails, or the output cannot be written.
pub(crate) fn solve_timetable(args: &SolveArgs, common: &CommonOptions) -> Result<(), CliError> {
    let (data, _, load_time) = load(&args.input)?;
    let mut engine = PriorityEngine::new(&data, args.backend(), args.options);
    info!("levels to search: {:?}", engine.levels());

    let time = Instant::now();
    let schedule = engine.run()?;
    let elapsed = time.elapsed();

    println!("{schedule}");
    if let Some(path) = &args.output {
        let file = File::create(path).map_err(write_error(path))?;
        schedule
            .write_json(BufWriter::new(file))
            .map_err(|e| CliError::Write {
                path: path.clone(),
                source: e.into(),
            })?;
        info!("schedule written to {}", path.display());
    }

    if common.stats {
        print_stats(&data, &schedule, engine.solver().name(), load_time, elapsed);
    }
    Ok(())
}

/// Writes the instance of one level as DIMACS.
///
/// # Errors
///
/// If the snapshot is invalid or the file cannot be written.
pub(crate) fn export_level(
    input: &Path,
    priority: u32,
    pins: &[(u32, usize)],
    output: &Path,
) -> Result<(), CliError> {
    let (data, _, _) = load(input)?;
    validate(&data)?;

    let pins: BTreeMap<u32, usize> = pins.iter().copied().collect();
    let (ctx, criteria) = encode_level(&data, priority, &pins);
    let cnf = ctx.to_cnf();
    dimacs::write_file(&cnf, output).map_err(write_error(output))?;

    println!(
        "DIMACS written to: {} ({} variables, {} clauses, {} criteria at level {priority})",
        output.display(),
        cnf.num_vars,
        cnf.num_clauses(),
        criteria.len()
    );
    for var in criteria {
        if let Some(problem) = ctx.problem(var) {
            println!("c {var} {}", problem.message);
        }
    }
    Ok(())
}

/// Loads and validates a snapshot.
///
/// # Errors
///
/// If the snapshot is malformed or inconsistent.
pub(crate) fn check_timetable(input: &Path) -> Result<(), CliError> {
    let (data, report, _) = load(input)?;
    validate(&data)?;

    stat_line("Sections", data.sections.len());
    stat_line("Schedulable sections", data.schedulable_sections().count());
    stat_line("Rooms", data.rooms.len());
    stat_line("Time slots", data.time_slots.len());
    stat_line("Faculty", data.faculty.len());
    stat_line("Constraints", data.constraints.len());
    stat_line(
        "Priority levels",
        data.priorities()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    );
    for (kind, count) in &report.skipped_kinds {
        stat_line(&format!("Skipped '{kind}'"), count);
    }
    println!("OK");
    Ok(())
}

pub(crate) fn print_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Helper function to print a single statistic line in a formatted table row.
pub(crate) fn stat_line(label: &str, value: impl std::fmt::Display) {
    println!("|  {label:<28} {value:>18}  |");
}

/// Helper function to print a statistic line that includes a rate (value/second).
pub(crate) fn stat_line_with_rate(label: &str, value: usize, elapsed: f64) {
    let rate = if elapsed > 0.0 {
        value as f64 / elapsed
    } else {
        0.0
    };
    println!("|  {label:<20} {value:>12} ({rate:>9.1}/sec)  |");
}

/// Allocated and resident memory in MiB, if jemalloc can report them.
fn memory_usage() -> Option<(f64, f64)> {
    const MIB: f64 = 1024.0 * 1024.0;
    epoch::advance().ok()?;
    let allocated = stats::allocated::mib().ok()?.read().ok()?;
    let resident = stats::resident::mib().ok()?.read().ok()?;
    Some((allocated as f64 / MIB, resident as f64 / MIB))
}

fn print_stats(data: &TimetableData, schedule: &Schedule, solver: &str, load_time: Duration, elapsed: Duration) {
    let s = &schedule.stats;
    let elapsed_secs = elapsed.as_secs_f64();

    println!("\n=======================[ Problem Statistics ]=========================");
    stat_line("Load time (s)", format!("{:.3}", load_time.as_secs_f64()));
    stat_line("Sections", data.sections.len());
    stat_line("Rooms", data.rooms.len());
    stat_line("Time slots", data.time_slots.len());
    stat_line("Faculty", data.faculty.len());
    stat_line("Constraints", data.constraints.len());

    println!("========================[ Search Statistics ]========================");
    stat_line("Solver", solver);
    stat_line("Levels solved", s.levels_solved);
    stat_line_with_rate("Solver calls", s.solver_calls, elapsed_secs);
    stat_line("Largest instance (vars)", s.max_vars);
    stat_line("Largest instance (clauses)", s.max_clauses);
    stat_line("Encode time (s)", format!("{:.3}", s.encode_time.as_secs_f64()));
    stat_line("Solve time (s)", format!("{:.3}", s.solve_time.as_secs_f64()));
    if let Some((allocated, resident)) = memory_usage() {
        stat_line("Memory usage (MiB)", format!("{allocated:.2}"));
        stat_line("Resident memory (MiB)", format!("{resident:.2}"));
    }
    stat_line("Wall time (s)", format!("{elapsed_secs:.3}"));
    println!("=====================================================================");

    if let Some(p) = schedule.incomplete_level {
        println!("\nINCOMPLETE (level {p})");
    } else {
        println!("\nOPTIMAL");
    }
}
