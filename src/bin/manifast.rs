use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use manifast::{ExecutionOutcome, InterpreterConfig, ManifastError, Repl, execute_with_config};

#[derive(Parser)]
#[command(author, version, about = "Manifast language interpreter")]
struct Args {
    /// Abort calls nested deeper than this
    #[arg(long, global = true, default_value_t = 10_000)]
    max_depth: usize,
    /// Abort after executing this many statements
    #[arg(long, global = true)]
    step_budget: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Manifast script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Manifast code
    Eval { source: String },
}

fn main() -> Result<ExitCode, ManifastError> {
    init_tracing();
    let args = Args::parse();
    let config = InterpreterConfig::new()
        .with_max_call_depth(args.max_depth)
        .with_step_budget(args.step_budget);
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => {
            let source = fs::read_to_string(&script)?;
            Ok(finish(execute_with_config(&source, config.with_echo_output(true))))
        }
        Command::Eval { source } => {
            Ok(finish(execute_with_config(&source, config.with_echo_output(true))))
        }
        Command::Repl => {
            Repl::with_config(config).run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Output was already echoed; only the marker line is left to print.
fn finish(outcome: ExecutionOutcome) -> ExitCode {
    match outcome.diagnostic_line() {
        None => ExitCode::SUCCESS,
        Some(line) => {
            if !outcome.output.is_empty() && !outcome.output.ends_with('\n') {
                println!();
            }
            println!("{line}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("MANIFAST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
