//! BPL processor: executes instruction trees against a typed stack.
//!
//! The processor has:
//! - A [`Stack`] of typed elements in one byte buffer, with scope levels
//! - A call frame stack for function invocation
//! - A [`Console`] for character and number I/O
//!
//! Control flow instructions carry nested blocks, so execution is a tree
//! walk. Each block runs in its own scope level; `return` and `terminate`
//! unwind through the walk as a [`Flow`] signal rather than as errors.
//!
//! # Usage
//!
//! ```
//! use bpl_common::{Config, Instruction, Opcode, Program, Value};
//! use bpl_vm::{BufferConsole, Processor, DEFAULT_STACK_CAPACITY};
//!
//! let program = Program::new(vec![
//!     Instruction::literal(Value::Int64(40)),
//!     Instruction::literal(Value::Int64(2)),
//!     Instruction::op(Opcode::Add),
//!     Instruction::op(Opcode::PrintNumber),
//! ]);
//!
//! let mut vm = Processor::with_console(
//!     &program,
//!     DEFAULT_STACK_CAPACITY,
//!     Config::default(),
//!     BufferConsole::default(),
//! )
//! .unwrap();
//! assert_eq!(vm.run().unwrap(), None);
//! assert_eq!(vm.console().output_string(), "42");
//! ```

pub mod console;
pub mod error;
pub mod execute;
pub mod machine;
pub mod stack;

pub use console::{BufferConsole, Console, StdConsole};
pub use error::{RuntimeError, StackError};
pub use machine::{CallFrame, Flow, Processor, ReturnValue, DEFAULT_STACK_CAPACITY, MAX_CALL_DEPTH};
pub use stack::{Element, Stack};

use bpl_common::{Config, Program};

/// Execute a program against the standard streams with the default stack
/// capacity.
///
/// Returns the `terminate` exit code, or `None` if the program ran off its
/// end.
///
/// # Errors
///
/// Returns [`RuntimeError`] if the program is malformed or execution fails
/// (type mismatch, division by zero, refused stack growth, etc.).
pub fn run(program: &Program, config: Config) -> Result<Option<i64>, RuntimeError> {
    let mut vm = Processor::new(program, DEFAULT_STACK_CAPACITY, config)?;
    vm.run()
}
