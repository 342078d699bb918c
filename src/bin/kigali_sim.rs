//! CLI driver for the engine. A minimal harness that exercises the library
//! the way a real DSL interpreter eventually would, built on the same `clap`
//! derive pattern used for simulation-runner CLIs elsewhere (`world3-cli`).

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kigali_sim::operation::ProgramDefinition;
use kigali_sim::{facade, result};

#[derive(Parser)]
#[command(name = "kigali-sim", about = "Montreal/Kigali refrigerant policy simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a program file for structural errors without running it.
    Validate {
        /// Path to a JSON-encoded program definition.
        path: PathBuf,
    },

    /// Run a named simulation and write its results as CSV.
    Run {
        /// Path to a JSON-encoded program definition.
        path: PathBuf,

        /// Name of the simulation stanza to run.
        #[arg(long)]
        scenario: String,

        /// Destination for the CSV output (stdout if omitted).
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the engine's version.
    Version,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { path } => validate(&path),
        Commands::Run { path, scenario, csv } => run(&path, &scenario, csv.as_deref()),
        Commands::Version => {
            println!("kigali-sim {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}

fn load_program(path: &std::path::Path) -> Result<ProgramDefinition> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read program file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse program file {}", path.display()))
}

fn validate(path: &std::path::Path) -> Result<()> {
    let program = load_program(path)?;
    match program.validate() {
        Ok(()) => {
            println!("OK: {} is a valid program", path.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("invalid program: {err}");
            std::process::exit(1);
        }
    }
}

fn run(path: &std::path::Path, scenario: &str, csv_out: Option<&std::path::Path>) -> Result<()> {
    let program = load_program(path)?;
    program.validate().context("program failed validation")?;

    let results = facade::run_scenario(&program, scenario)
        .with_context(|| format!("failed to run scenario '{scenario}'"))?;

    match csv_out {
        Some(out_path) => {
            let file = fs::File::create(out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            result::write_csv(file, &results).context("failed to write CSV")?;
            eprintln!("wrote {} rows to {}", results.len(), out_path.display());
        }
        None => {
            result::write_csv(io::stdout(), &results).context("failed to write CSV")?;
        }
    }

    Ok(())
}
