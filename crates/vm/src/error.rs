//! Runtime errors for the BPL processor.
//!
//! Every error aborts the current run. There is no in-program recovery:
//! the error is returned from [`Processor::run`](crate::Processor::run)
//! to the host.

use bpl_common::{ShapeError, TypeError};
use thiserror::Error;

/// Errors raised by the typed stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    /// Pop on an empty stack.
    #[error("stack is empty")]
    Empty,

    /// `pop_level` with only the root level open.
    #[error("no scope level is open")]
    NoOpenLevel,

    /// A new level was asked to adopt more elements than the current
    /// level holds.
    #[error("level holds {available} element(s), {requested} requested")]
    LevelTooShallow { requested: usize, available: usize },

    /// The buffer is full and reallocation is disabled.
    #[error("stack needs {requested} bytes but holds {capacity} and growth is not allowed")]
    GrowthNotAllowed { requested: usize, capacity: usize },

    /// The allocator refused the requested buffer size.
    #[error("cannot grow stack to {requested} bytes")]
    GrowthFailed { requested: usize },

    /// The leaf index space is used up.
    #[error("leaf index space exhausted")]
    LeafSpaceExhausted,

    /// A resize would drop live data.
    #[error("cannot resize stack to {requested} bytes: {top} bytes in use")]
    ShrinkBelowTop { requested: usize, top: usize },

    /// Raw bytes pushed for a type of a different size.
    #[error("{found} byte(s) supplied for a {expected}-byte element")]
    SizeMismatch { expected: usize, found: usize },

    /// Element bookkeeping is inconsistent.
    #[error("stack corrupted: {reason}")]
    Corrupted { reason: String },
}

/// Errors that occur during program execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Malformed instruction.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// Bad descriptor or leaf index.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Stack bookkeeping failure, including refused growth.
    #[error(transparent)]
    Stack(#[from] StackError),

    /// An operator received an operand of a kind it does not accept.
    #[error("{opcode} does not accept {found} operands")]
    UnsupportedOperand { opcode: &'static str, found: String },

    /// A binary operator received operands of different types.
    #[error("{opcode} operands differ: {left} and {right}")]
    OperandMismatch {
        opcode: &'static str,
        left: String,
        right: String,
    },

    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A condition block did not leave exactly one bool.
    #[error("condition must leave exactly one bool, found {found}")]
    ConditionNotBoolean { found: String },

    /// A reference was expected.
    #[error("expected a reference, found {found}")]
    NotAReference { found: String },

    /// A function value (or a reference to one) was expected.
    #[error("expected a function, found {found}")]
    NotAFunction { found: String },

    /// A slot index names no element.
    #[error("{} slot {index} out of range ({available} element(s))", scope_name(.global))]
    SlotOutOfRange {
        index: usize,
        global: bool,
        available: usize,
    },

    /// A reference names no live element.
    #[error("reference to leaf {leaf} does not name a live element")]
    DanglingReference { leaf: u64 },

    /// A sub-index lies outside the referenced value.
    #[error("sub-index {index} out of range for {ty}")]
    SubIndexOutOfRange { index: i64, ty: String },

    /// Assignment between incompatible types.
    #[error("cannot assign {found} to {expected}")]
    AssignMismatch { expected: String, found: String },

    /// A call argument does not match its parameter type.
    #[error("argument {index}: expected {expected}, found {found}")]
    ArgumentMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    /// Fewer values are in scope than the callee takes.
    #[error("call expects {expected} argument(s), {found} in scope")]
    MissingArguments { expected: usize, found: usize },

    /// A returned value does not match the signature.
    #[error("return: expected {expected}, found {found}")]
    ReturnMismatch { expected: String, found: String },

    /// A non-void function ran off the end of its body.
    #[error("function returning {expected} finished without a return")]
    MissingReturnValue { expected: String },

    /// `return` executed outside any call.
    #[error("return outside of a function")]
    ReturnOutsideFunction,

    /// A function handle that names no function literal.
    #[error("unknown function handle {handle}")]
    UnknownFunction { handle: u64 },

    /// Nested calls went deeper than the limit.
    #[error("call depth exceeded limit {limit}")]
    CallDepthExceeded { limit: usize },

    /// `grow` with a negative capacity.
    #[error("invalid stack capacity {requested}")]
    InvalidCapacity { requested: i64 },

    /// Console read or write failed.
    #[error("i/o error: {message}")]
    Io { message: String },
}

fn scope_name(global: &bool) -> &'static str {
    if *global {
        "global"
    } else {
        "local"
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Io {
            message: err.to_string(),
        }
    }
}
