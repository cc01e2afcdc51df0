//! CLI command implementations.
//!
//! Each command reports its own errors on stderr and returns the process
//! exit code on failure.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Instant;

use bpl_common::{Config, Program};
use bpl_vm::{Processor, RuntimeError};
use tracing::{debug, info};

/// Host stack for the processor thread. Calls nest on the host stack, so
/// the default main thread stack is too small for the full call depth.
const PROCESSOR_STACK_SIZE: usize = 256 << 20;

/// Assemble and execute a program against the standard streams.
pub fn run(path: &Path, config: Config, stack_size: usize) -> Result<(), i32> {
    let program = load(path)?;
    let started = Instant::now();

    match execute(&program, stack_size, config)? {
        Ok(code) => {
            info!(
                file = %path.display(),
                exit_code = code.unwrap_or(0),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "run complete"
            );
            match code {
                None | Some(0) => Ok(()),
                Some(code) => Err(exit_status(code)),
            }
        }
        Err(RuntimeError::Shape(e)) => {
            eprintln!("error: {}: {e}", path.display());
            Err(1)
        }
        Err(e) => {
            eprintln!("runtime error: {e}");
            Err(3)
        }
    }
}

/// Assemble and shape-check a program.
pub fn check(path: &Path) -> Result<(), i32> {
    let program = load(path)?;
    program.check_shape().map_err(|e| {
        eprintln!("error: {}: {e}", path.display());
        1
    })?;
    println!(
        "OK: {} ({} instructions)",
        path.display(),
        program.instruction_count()
    );
    Ok(())
}

/// Print the canonical text of a program.
pub fn disassemble(path: &Path) -> Result<(), i32> {
    let program = load(path)?;
    print!("{}", bpl_assembler::disassemble(&program));
    Ok(())
}

// --- Helpers ---

/// Read and assemble a source file.
fn load(path: &Path) -> Result<Program, i32> {
    let text = fs::read_to_string(path).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", path.display());
        1
    })?;

    let program = bpl_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {}: {e}", path.display());
        1
    })?;
    debug!(
        file = %path.display(),
        instructions = program.instruction_count(),
        "assembled"
    );
    Ok(program)
}

/// Runs the processor on its own thread with a large host stack.
fn execute(
    program: &Program,
    capacity: usize,
    config: Config,
) -> Result<Result<Option<i64>, RuntimeError>, i32> {
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("bpl-processor".to_string())
            .stack_size(PROCESSOR_STACK_SIZE)
            .spawn_scoped(scope, move || -> Result<Option<i64>, RuntimeError> {
                Processor::new(program, capacity, config)?.run()
            })
            .map_err(|e| {
                eprintln!("error: cannot start processor: {e}");
                1
            })?;
        handle.join().map_err(|_| {
            eprintln!("runtime error: processor thread panicked");
            3
        })
    })
}

/// Process exit status for a `terminate` code. Codes outside the `i32`
/// range report a generic failure.
fn exit_status(code: i64) -> i32 {
    i32::try_from(code).unwrap_or(1)
}
