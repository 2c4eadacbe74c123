//! Fabrik CLI — optimize and score factory layouts from the command line.
//!
//! `fabrik optimize` reads a layout JSON, runs the optimizer, writes the
//! best layout back out, and prints the score breakdown. `fabrik score`
//! routes a layout and prints its score without optimizing.

#![warn(missing_docs)]

use clap::{Parser, Subcommand, ValueEnum};
use fabrik_grid::evaluate_grid;
use fabrik_layout::LayoutFile;
use fabrik_opt::{Mode, OptimizeControl, OptimizerConfig, Progress};
use fabrik_route::route_all;
use std::path::PathBuf;
use std::process;

/// Fabrik — factory layout place-and-route.
#[derive(Parser, Debug)]
#[command(name = "fabrik", version, about = "Fabrik layout toolkit")]
struct Cli {
    /// Suppress progress output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Optimize a layout file and write the result.
    Optimize(OptimizeArgs),
    /// Route a layout file and print its score.
    Score {
        /// Input layout JSON.
        input: PathBuf,
    },
}

/// Run mode selector for the CLI.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    /// Single bounded run.
    Normal,
    /// Longer run honoring the time budget.
    Deep,
}

/// Arguments for `fabrik optimize`.
#[derive(Parser, Debug)]
struct OptimizeArgs {
    /// Input layout JSON.
    input: PathBuf,

    /// Output path for the optimized layout (defaults to stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optimization mode.
    #[arg(short, long, value_enum, default_value_t = CliMode::Normal)]
    mode: CliMode,

    /// Wall-clock budget in milliseconds (deep mode only).
    #[arg(long)]
    time_budget_ms: Option<u64>,

    /// Deterministic PRNG seed.
    #[arg(long)]
    seed: Option<u32>,
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Optimize(args) => optimize(&args, cli.quiet),
        Command::Score { input } => score(&input),
    };
    process::exit(code);
}

fn load_grid(path: &PathBuf) -> Result<fabrik_grid::GridState, String> {
    let json = std::fs::read_to_string(path).map_err(|e| format!("reading {path:?}: {e}"))?;
    let file = LayoutFile::from_json(&json).map_err(|e| e.to_string())?;
    file.to_grid().map_err(|e| e.to_string())
}

fn optimize(args: &OptimizeArgs, quiet: bool) -> i32 {
    let grid = match load_grid(&args.input) {
        Ok(grid) => grid,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let mut config = match args.mode {
        CliMode::Normal => OptimizerConfig::normal(),
        CliMode::Deep => OptimizerConfig::deep(),
    };
    config.time_budget_ms = args.time_budget_ms;
    config.seed = args.seed;
    if config.mode == Mode::Deep && config.time_budget_ms.is_none() {
        config.time_budget_ms = Some(10_000);
    }

    let control = if quiet {
        OptimizeControl::default()
    } else {
        OptimizeControl::with_progress(|p: &Progress| {
            eprintln!("[{}] best={:.2} iterations={}", p.phase, p.best_total, p.iterations);
        })
    };
    let outcome = fabrik_opt::run_optimizer(&grid, &config, control);

    let result = LayoutFile::from_grid(&outcome.grid).to_json();
    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, result) {
                eprintln!("error: writing {path:?}: {e}");
                return 1;
            }
        }
        None => println!("{result}"),
    }
    eprintln!("{}", outcome.score);
    0
}

fn score(input: &PathBuf) -> i32 {
    let mut grid = match load_grid(input) {
        Ok(grid) => grid,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };
    let report = route_all(&mut grid);
    if !report.is_fully_routed() {
        eprintln!(
            "warning: {} connection(s) failed to route",
            report.failed.len()
        );
    }
    println!("{}", evaluate_grid(&grid));
    0
}
