//! # timetable-sat
//!
//! `timetable-sat` builds university course timetables. A term's rooms, time slots, sections,
//! faculty and prioritised constraints are read from a JSON snapshot, compiled into CNF, and
//! solved level by level with an external SAT solver (or the built-in DPLL backend for small
//! inputs).
//!
//! ## Usage
//!
//! ```sh
//! timetable-sat [GLOBAL_OPTIONS] <SUBCOMMAND>
//! ```
//!
//! ### Subcommands
//!
//! 1.  **`solve`**: Run the priority search and print the schedule.
//!     ```sh
//!     timetable-sat solve --input term.json --solver kissat --budget 600 --output schedule.json
//!     ```
//!
//! 2.  **`export`**: Write the DIMACS instance of one level, with earlier levels pinned.
//!     ```sh
//!     timetable-sat export --input term.json --priority 2 --pin 1=3 --output level2.cnf
//!     ```
//!
//! 3.  **`check`**: Load and validate a snapshot.
//!
//! 4.  **`completions`**: Print a shell completion script.
//!
//! ### Common Options
//!
//! -   `-d, --debug`: Log every solver call.
//! -   `-q, --quiet`: Only log warnings and errors.
//! -   `--stats`: Print problem and search statistics after solving.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use log::{LevelFilter, error};

use crate::command_line::cli::{
    Cli, CliError, Commands, CommonOptions, SolveArgs, check_timetable, export_level, print_completions,
    solve_timetable,
};
use timetable_sat::search::engine::SearchOptions;

mod command_line;

/// Global allocator using `tikv-jemallocator` for potentially better performance
/// and memory usage tracking.
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn configure_logging(common: &CommonOptions) {
    let level_filter = if common.debug {
        LevelFilter::Debug
    } else if common.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .format(move |buf, record| writeln!(buf, "{}", record.args()))
        .filter_level(level_filter)
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Solve {
            input,
            solver,
            solver_args,
            builtin,
            timeout,
            budget,
            max_priority,
            output,
            work_dir,
            keep_files,
        } => {
            let args = SolveArgs {
                input,
                solver,
                solver_args,
                builtin,
                options: SearchOptions {
                    solver_timeout: timeout.map(Duration::from_secs),
                    time_budget: budget.map(Duration::from_secs),
                    max_priority,
                },
                output,
                work_dir,
                keep_files,
            };
            solve_timetable(&args, &cli.common)
        }
        Commands::Export {
            input,
            priority,
            pins,
            output,
        } => export_level(&input, priority, &pins, &output),
        Commands::Check { input } => check_timetable(&input),
        Commands::Completions { shell } => {
            print_completions(shell);
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    configure_logging(&cli.common);

    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}
