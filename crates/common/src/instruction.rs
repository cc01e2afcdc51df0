//! The instruction tree.
//!
//! An [`Instruction`] is an opcode plus a list of [`Argument`]s. Control
//! flow opcodes carry their nested code as [`Block`] arguments, so a
//! program is a tree rather than a flat stream. Blocks are shared behind
//! [`Arc`]; cloning an instruction never copies nested code.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::ShapeError;
use crate::opcode::Opcode;
use crate::types::{Primitive, Signature, Type};
use crate::value::Value;

/// Names a stack slot by its element index.
///
/// Frame-relative slots count from the first argument of the current call
/// (or from the bottom of the stack outside any call); global slots always
/// count from the bottom of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Element index within the frame.
    pub index: usize,
    /// Count from the bottom of the stack instead of the current frame.
    pub global: bool,
}

impl SlotRef {
    /// A frame-relative slot.
    pub fn local(index: usize) -> Self {
        Self {
            index,
            global: false,
        }
    }

    /// A slot counted from the bottom of the stack.
    pub fn global(index: usize) -> Self {
        Self {
            index,
            global: true,
        }
    }
}

/// A nested instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    instructions: Arc<Vec<Instruction>>,
}

impl Block {
    /// Wraps a sequence of instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions: Arc::new(instructions),
        }
    }

    /// Identity of the shared body. Two clones of one block share an id.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.instructions) as usize
    }
}

impl Deref for Block {
    type Target = [Instruction];

    fn deref(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl From<Vec<Instruction>> for Block {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

/// A function literal: a signature paired with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Parameter and return types.
    pub signature: Arc<Signature>,
    /// Instructions run on each call.
    pub body: Block,
}

impl Function {
    /// Builds a function literal.
    pub fn new(signature: Signature, body: Vec<Instruction>) -> Self {
        Self {
            signature: Arc::new(signature),
            body: Block::new(body),
        }
    }

    /// Type of values holding this function.
    pub fn ty(&self) -> Type {
        Type::Function(Arc::clone(&self.signature))
    }
}

/// One instruction argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A primitive literal.
    Literal(Value),
    /// A type descriptor.
    Type(Type),
    /// A stack slot.
    Slot(SlotRef),
    /// Nested code.
    Block(Block),
    /// A function literal.
    Function(Function),
}

impl Argument {
    /// Article-prefixed kind name, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Argument::Literal(_) => "a literal",
            Argument::Type(_) => "a type",
            Argument::Slot(_) => "a slot",
            Argument::Block(_) => "a block",
            Argument::Function(_) => "a function",
        }
    }
}

/// A single BPL instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The operation to perform.
    pub opcode: Opcode,
    /// Arguments carried by the instruction itself, as opposed to operands
    /// taken from the stack.
    pub args: Vec<Argument>,
}

impl Instruction {
    /// Create a new instruction.
    pub fn new(opcode: Opcode, args: Vec<Argument>) -> Self {
        Self { opcode, args }
    }

    /// An instruction with no arguments.
    pub fn op(opcode: Opcode) -> Self {
        Self::new(opcode, Vec::new())
    }

    pub fn declare(ty: Type) -> Self {
        Self::new(Opcode::Declare, vec![Argument::Type(ty)])
    }

    pub fn get_ref(slot: SlotRef) -> Self {
        Self::new(Opcode::GetRef, vec![Argument::Slot(slot)])
    }

    pub fn literal(value: Value) -> Self {
        Self::new(Opcode::Literal, vec![Argument::Literal(value)])
    }

    pub fn function(function: Function) -> Self {
        Self::new(Opcode::Literal, vec![Argument::Function(function)])
    }

    /// `if(cond, then[, otherwise])`.
    pub fn branch(
        cond: Vec<Instruction>,
        then: Vec<Instruction>,
        otherwise: Option<Vec<Instruction>>,
    ) -> Self {
        let mut args = vec![
            Argument::Block(Block::new(cond)),
            Argument::Block(Block::new(then)),
        ];
        if let Some(otherwise) = otherwise {
            args.push(Argument::Block(Block::new(otherwise)));
        }
        Self::new(Opcode::If, args)
    }

    pub fn while_loop(cond: Vec<Instruction>, body: Vec<Instruction>) -> Self {
        Self::new(
            Opcode::While,
            vec![
                Argument::Block(Block::new(cond)),
                Argument::Block(Block::new(body)),
            ],
        )
    }

    pub fn block(body: Vec<Instruction>) -> Self {
        Self::new(Opcode::Block, vec![Argument::Block(Block::new(body))])
    }

    pub fn terminate(code: Option<i64>) -> Self {
        let args = code
            .map(|c| vec![Argument::Literal(Value::Int64(c))])
            .unwrap_or_default();
        Self::new(Opcode::Terminate, args)
    }

    pub fn grow(capacity: i64) -> Self {
        Self::new(Opcode::Grow, vec![Argument::Literal(Value::Int64(capacity))])
    }

    pub fn non_blocking(enabled: bool) -> Self {
        Self::new(Opcode::NonBlocking, vec![Argument::Literal(Value::Bool(enabled))])
    }

    /// Checks the argument list of this instruction, without descending
    /// into nested blocks.
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        match self.opcode {
            Opcode::Declare => {
                self.expect_count(1, 1, "1")?;
                self.type_arg(0)?;
            }
            Opcode::GetRef => {
                self.expect_count(1, 1, "1")?;
                self.slot_arg(0)?;
            }
            Opcode::Literal => {
                self.expect_count(1, 1, "1")?;
                match &self.args[0] {
                    Argument::Literal(_) | Argument::Function(_) => {}
                    other => return Err(self.kind_error(0, "a literal or function", other)),
                }
            }
            Opcode::If => {
                self.expect_count(2, 3, "2 or 3")?;
                for i in 0..self.args.len() {
                    self.block_arg(i)?;
                }
            }
            Opcode::While => {
                self.expect_count(2, 2, "2")?;
                self.block_arg(0)?;
                self.block_arg(1)?;
            }
            Opcode::Block => {
                self.expect_count(1, 1, "1")?;
                self.block_arg(0)?;
            }
            Opcode::Terminate => {
                self.expect_count(0, 1, "0 or 1")?;
                if !self.args.is_empty() {
                    self.int_arg(0)?;
                }
            }
            Opcode::Grow => {
                self.expect_count(1, 1, "1")?;
                self.int_arg(0)?;
            }
            Opcode::NonBlocking => {
                self.expect_count(1, 1, "1")?;
                self.bool_arg(0)?;
            }
            _ => self.expect_count(0, 0, "0")?,
        }
        Ok(())
    }

    /// Nested blocks directly carried by this instruction, including
    /// function literal bodies.
    pub fn nested_blocks(&self) -> impl Iterator<Item = &Block> {
        self.args.iter().filter_map(|arg| match arg {
            Argument::Block(block) => Some(block),
            Argument::Function(function) => Some(&function.body),
            _ => None,
        })
    }

    fn expect_count(&self, min: usize, max: usize, expected: &'static str) -> Result<(), ShapeError> {
        let found = self.args.len();
        if found < min || found > max {
            return Err(ShapeError::ArgumentCount {
                opcode: self.opcode.mnemonic(),
                expected,
                found,
            });
        }
        Ok(())
    }

    fn arg(&self, index: usize) -> Result<&Argument, ShapeError> {
        self.args.get(index).ok_or(ShapeError::ArgumentCount {
            opcode: self.opcode.mnemonic(),
            expected: "more",
            found: self.args.len(),
        })
    }

    fn kind_error(&self, index: usize, expected: &'static str, found: &Argument) -> ShapeError {
        ShapeError::ArgumentKind {
            opcode: self.opcode.mnemonic(),
            index,
            expected,
            found: found.kind_name(),
        }
    }

    /// Argument `index` as a type descriptor.
    pub fn type_arg(&self, index: usize) -> Result<&Type, ShapeError> {
        match self.arg(index)? {
            Argument::Type(ty) => Ok(ty),
            other => Err(self.kind_error(index, "a type", other)),
        }
    }

    /// Argument `index` as a slot.
    pub fn slot_arg(&self, index: usize) -> Result<SlotRef, ShapeError> {
        match self.arg(index)? {
            Argument::Slot(slot) => Ok(*slot),
            other => Err(self.kind_error(index, "a slot", other)),
        }
    }

    /// Argument `index` as a nested block.
    pub fn block_arg(&self, index: usize) -> Result<&Block, ShapeError> {
        match self.arg(index)? {
            Argument::Block(block) => Ok(block),
            other => Err(self.kind_error(index, "a block", other)),
        }
    }

    /// Argument `index` as a literal of any primitive type.
    pub fn literal_arg(&self, index: usize) -> Result<Value, ShapeError> {
        match self.arg(index)? {
            Argument::Literal(value) => Ok(*value),
            other => Err(self.kind_error(index, "a literal", other)),
        }
    }

    /// Argument `index` as an int64 literal.
    pub fn int_arg(&self, index: usize) -> Result<i64, ShapeError> {
        match self.literal_arg(index)? {
            Value::Int64(v) => Ok(v),
            other => Err(self.literal_type_error(index, Primitive::Int64, other)),
        }
    }

    /// Argument `index` as a bool literal.
    pub fn bool_arg(&self, index: usize) -> Result<bool, ShapeError> {
        match self.literal_arg(index)? {
            Value::Bool(v) => Ok(v),
            other => Err(self.literal_type_error(index, Primitive::Bool, other)),
        }
    }

    fn literal_type_error(&self, index: usize, expected: Primitive, found: Value) -> ShapeError {
        ShapeError::LiteralType {
            opcode: self.opcode.mnemonic(),
            index,
            expected: expected.name(),
            found: found.primitive().name(),
        }
    }
}
