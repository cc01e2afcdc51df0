//! BPL CLI: check, run and disassemble assembly programs.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Input/assembly/shape error
//! - 2: Usage error
//! - 3: Runtime error
//! - otherwise: the code passed to `terminate`

mod commands;

use std::path::PathBuf;
use std::process;

use bpl_common::{Config, ValidationLevel};
use bpl_vm::DEFAULT_STACK_CAPACITY;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bpl")]
#[command(about = "Assemble, check and run BPL programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and execute a program
    Run {
        /// Assembly source file
        file: PathBuf,

        /// Runtime self-checking: none, basic, light or full
        #[arg(long, default_value_t = ValidationLevel::Basic)]
        validation: ValidationLevel,

        /// Let the stack buffer grow when it fills up
        #[arg(long)]
        allow_stack_growth: bool,

        /// Initial stack capacity in bytes
        #[arg(long, default_value_t = DEFAULT_STACK_CAPACITY)]
        stack_size: usize,
    },
    /// Assemble and shape-check a program without running it
    Check {
        /// Assembly source file
        file: PathBuf,
    },
    /// Print the canonical text of a program
    Disassemble {
        /// Assembly source file
        file: PathBuf,
    },
}

fn main() {
    // Logs go to stderr; stdout belongs to the program being run.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            validation,
            allow_stack_growth,
            stack_size,
        } => {
            let config = Config::with_validation(validation).allow_stack_growth(allow_stack_growth);
            commands::run(&file, config, stack_size)
        }
        Commands::Check { file } => commands::check(&file),
        Commands::Disassemble { file } => commands::disassemble(&file),
    };

    if let Err(code) = result {
        process::exit(code);
    }
}
