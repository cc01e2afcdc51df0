//! Program representation: the top-level instruction sequence.

use crate::error::ShapeError;
use crate::instruction::Instruction;

/// A BPL program: a sequence of instructions, possibly carrying nested
/// blocks and function bodies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// The top-level instructions.
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Create a new program from a vector of instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Number of top-level instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Shape-checks every instruction in the tree, nested blocks and
    /// function bodies included. Stops at the first malformed instruction.
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        let mut pending: Vec<&[Instruction]> = vec![&self.instructions];
        while let Some(instructions) = pending.pop() {
            for instr in instructions {
                instr.check_shape()?;
                pending.extend(instr.nested_blocks().map(|block| &**block));
            }
        }
        Ok(())
    }

    /// Total number of instructions in the tree.
    pub fn instruction_count(&self) -> usize {
        fn count(instructions: &[Instruction]) -> usize {
            instructions
                .iter()
                .map(|i| 1 + i.nested_blocks().map(|b| count(b)).sum::<usize>())
                .sum()
        }
        count(&self.instructions)
    }
}
