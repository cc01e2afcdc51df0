//! BPL common types and the instruction tree.
//!
//! This crate provides the data structures shared by the processor and the
//! text front-end:
//!
//! - [`Type`]: the closed set of type descriptors with leaf addressing
//! - [`Value`]: primitive literal values and their stack encoding
//! - [`Opcode`]: the instruction set
//! - [`Instruction`]: an opcode with its arguments, forming a tree
//! - [`Program`]: a top-level instruction sequence
//! - [`Config`]: per-processor validation and growth policy
//! - [`TypeError`], [`ShapeError`]: construction errors
//!
//! # Dependencies
//!
//! This crate uses `thiserror` (compile-time proc-macro, zero runtime cost)
//! and has no other dependencies.

pub mod config;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod types;
pub mod value;

// Re-export commonly used types at the crate root.
pub use config::{Config, ValidationLevel};
pub use error::{ShapeError, TypeError};
pub use instruction::{Argument, Block, Function, Instruction, SlotRef};
pub use opcode::Opcode;
pub use program::Program;
pub use types::{ArrayType, CompositeType, Primitive, Resolved, Signature, Type};
pub use value::Value;
