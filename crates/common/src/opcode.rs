//! Opcode definitions for the BPL instruction set.

/// Identifies the operation to perform.
///
/// Operand order for binary operators: `a` is the element below the top,
/// `b` is the top, and the result is `a op b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Variables & references
    /// Push a zero-filled element of the argument type.
    Declare,
    /// Push a reference to a frame-relative or global slot.
    GetRef,
    /// Pop a value and a reference, store the value through the reference.
    Set,
    /// Pop a reference, push a copy of the value it names.
    Deref,
    /// Pop an int64 leaf index and a reference, push a reference into the
    /// referenced value.
    SubRef,

    // Constants
    /// Push a primitive literal or a function value.
    Literal,

    // Functions
    /// Pop a function value (or a reference to one) and invoke it.
    Call,
    /// Leave the current function, optionally with the top value.
    Return,

    // Control flow
    /// `if(cond, then[, else])`.
    If,
    /// `while(cond, body)`.
    While,
    /// Run a nested block in its own scope level.
    Block,
    /// Stop the program with an optional exit code.
    Terminate,

    // Arithmetic (int64 or char)
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Truncating division. Division by zero is a runtime error.
    Div,
    /// Remainder. Division by zero is a runtime error.
    Mod,
    /// Shift left; the shift amount is taken modulo the bit width.
    Shl,
    /// Arithmetic shift right for int64, logical for char.
    Shr,

    // Logic (bool)
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Logical NOT.
    Not,

    // Comparison
    /// `a < b`.
    Lt,
    /// `a <= b`.
    Lte,
    /// `a > b`.
    Gt,
    /// `a >= b`.
    Gte,
    /// `a == b`; also accepts two bools.
    Eq,
    /// `a != b`; also accepts two bools.
    Neq,

    // Console I/O
    /// Pop a char and write it.
    PrintChar,
    /// Pop an int64 and write it in decimal.
    PrintNumber,
    /// Push the next input byte as a char.
    ReadChar,
    /// Parse a decimal int64 from input and push it.
    ReadNumber,
    /// Toggle non-blocking input.
    NonBlocking,
    /// Push whether input is available without blocking.
    InputAvailable,

    // Stack control
    /// Reallocate the stack buffer to the given byte capacity.
    Grow,
}

/// All opcodes, in definition order.
pub const ALL_OPCODES: [Opcode; 35] = [
    Opcode::Declare,
    Opcode::GetRef,
    Opcode::Set,
    Opcode::Deref,
    Opcode::SubRef,
    Opcode::Literal,
    Opcode::Call,
    Opcode::Return,
    Opcode::If,
    Opcode::While,
    Opcode::Block,
    Opcode::Terminate,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Shl,
    Opcode::Shr,
    Opcode::And,
    Opcode::Or,
    Opcode::Not,
    Opcode::Lt,
    Opcode::Lte,
    Opcode::Gt,
    Opcode::Gte,
    Opcode::Eq,
    Opcode::Neq,
    Opcode::PrintChar,
    Opcode::PrintNumber,
    Opcode::ReadChar,
    Opcode::ReadNumber,
    Opcode::NonBlocking,
    Opcode::InputAvailable,
    Opcode::Grow,
];

impl Opcode {
    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Declare => "declare",
            Opcode::GetRef => "getRef",
            Opcode::Set => "set",
            Opcode::Deref => "deref",
            Opcode::SubRef => "subRef",
            Opcode::Literal => "literal",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::If => "if",
            Opcode::While => "while",
            Opcode::Block => "block",
            Opcode::Terminate => "terminate",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Not => "not",
            Opcode::Lt => "lt",
            Opcode::Lte => "lte",
            Opcode::Gt => "gt",
            Opcode::Gte => "gte",
            Opcode::Eq => "eq",
            Opcode::Neq => "neq",
            Opcode::PrintChar => "printChar",
            Opcode::PrintNumber => "printNumber",
            Opcode::ReadChar => "readChar",
            Opcode::ReadNumber => "readNumber",
            Opcode::NonBlocking => "nonBlocking",
            Opcode::InputAvailable => "inputAvailable",
            Opcode::Grow => "grow",
        }
    }

    /// Looks an opcode up by mnemonic.
    ///
    /// The long spellings `getReference`, `setThroughReference`,
    /// `dereference` and `subReference` are accepted as aliases.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        match name {
            "getReference" => Some(Opcode::GetRef),
            "setThroughReference" => Some(Opcode::Set),
            "dereference" => Some(Opcode::Deref),
            "subReference" => Some(Opcode::SubRef),
            _ => ALL_OPCODES.iter().find(|op| op.mnemonic() == name).copied(),
        }
    }

    /// True for opcodes whose arguments include nested instruction blocks.
    pub fn takes_blocks(&self) -> bool {
        matches!(self, Opcode::If | Opcode::While | Opcode::Block)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
