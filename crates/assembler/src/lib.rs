//! BPL assembler: line-oriented text ↔ instruction trees.
//!
//! Every line is `opcode[:operand]`. Nested blocks and function bodies
//! follow the line that owns them and close with `endInstructions` and
//! `end`. Indentation is ignored on input and canonical on output.
//!
//! # Usage
//!
//! ```
//! use bpl_assembler::{assemble, disassemble};
//!
//! let text = "literal:int64:42\nprintNumber\n";
//! let program = assemble(text).unwrap();
//! assert_eq!(disassemble(&program), text);
//! ```
//!
//! # Canonical Form
//!
//! `assemble(disassemble(program)) == program` holds for every well-shaped
//! program. The disassembler writes canonical text; the assembler also
//! accepts non-canonical input (hex integers, opcode aliases, any
//! indentation).

pub mod error;

mod disassembler;
mod lexer;
mod parser;

pub use error::AsmError;

use bpl_common::{Program, Type};
use lexer::tokenize;
use parser::Parser;

/// Assemble text into a program.
///
/// Every instruction is shape-checked as it is built. Returns the first
/// error encountered.
pub fn assemble(text: &str) -> Result<Program, AsmError> {
    let lines = tokenize(text)?;
    let instructions = Parser::new(lines).parse_program()?;
    Ok(Program::new(instructions))
}

/// Disassemble a program into canonical assembly text.
pub fn disassemble(program: &Program) -> String {
    disassembler::disassemble(program)
}

/// Parse a standalone type descriptor, e.g. `array<int64, 4>`.
pub fn parse_type(text: &str) -> Result<Type, AsmError> {
    parser::parse_type(text, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpl_common::opcode::ALL_OPCODES;
    use bpl_common::types::ALL_PRIMITIVES;
    use bpl_common::{Instruction, Opcode, Value};

    #[test]
    fn assemble_minimal() {
        let program = assemble("literal:int64:42\nprintNumber\n").unwrap();
        assert_eq!(program.instructions.len(), 2);
        assert_eq!(program.instructions[0], Instruction::literal(Value::Int64(42)));
        assert_eq!(program.instructions[1].opcode, Opcode::PrintNumber);
    }

    #[test]
    fn disassemble_minimal() {
        let program = Program::new(vec![
            Instruction::literal(Value::Int64(42)),
            Instruction::op(Opcode::PrintNumber),
        ]);
        assert_eq!(disassemble(&program), "literal:int64:42\nprintNumber\n");
    }

    #[test]
    fn disassembled_text_reassembles() {
        let original = Program::new(vec![
            Instruction::literal(Value::Int64(5)),
            Instruction::literal(Value::Int64(3)),
            Instruction::op(Opcode::Add),
            Instruction::terminate(None),
        ]);
        let text = disassemble(&original);
        assert_eq!(assemble(&text).unwrap(), original);
    }

    #[test]
    fn assemble_with_comments_and_blanks() {
        let text = "\
; push 42
literal:int64:42  ; the answer

printNumber
";
        let program = assemble(text).unwrap();
        assert_eq!(program.instructions.len(), 2);
    }

    #[test]
    fn indentation_is_ignored() {
        let flat = assemble("block\ninstructions\nadd\nendInstructions\n").unwrap();
        let nested = assemble("block\n  instructions\n        add\n  endInstructions\n").unwrap();
        assert_eq!(flat, nested);
    }

    #[test]
    fn decimal_and_hex_produce_same_result() {
        let hex = assemble("literal:int64:0x2a\n").unwrap();
        let dec = assemble("literal:int64:42\n").unwrap();
        assert_eq!(hex, dec);
    }

    #[test]
    fn error_unknown_opcode() {
        let err = assemble("foobar\n").unwrap_err();
        assert!(matches!(err, AsmError::UnknownOpcode { line: 1, .. }));
    }

    #[test]
    fn error_missing_argument() {
        let err = assemble("declare\n").unwrap_err();
        assert!(matches!(err, AsmError::MissingArgument { line: 1, .. }));
    }

    #[test]
    fn error_invalid_number() {
        let err = assemble("getRef:0xZZ\n").unwrap_err();
        assert!(matches!(err, AsmError::InvalidNumber { line: 1, .. }));
    }

    #[test]
    fn error_reports_correct_line() {
        let err = assemble("add\n\n; x\nfoobar\n").unwrap_err();
        assert!(matches!(err, AsmError::UnknownOpcode { line: 4, .. }));
    }

    #[test]
    fn all_operandless_opcodes_reassemble() {
        for opcode in ALL_OPCODES {
            let instr = Instruction::op(opcode);
            if instr.check_shape().is_err() {
                continue;
            }
            let text = format!("{}\n", opcode.mnemonic());
            let program = assemble(&text).unwrap();
            assert_eq!(disassemble(&program), text, "reassembly failed for {opcode}");
        }
    }

    #[test]
    fn all_primitives_declare() {
        for primitive in ALL_PRIMITIVES {
            let text = format!("declare:{}\n", primitive.name());
            let program = assemble(&text).unwrap();
            assert_eq!(disassemble(&program), text, "reassembly failed for {}", primitive.name());
        }
    }

    #[test]
    fn standalone_type() {
        let ty = parse_type("array<ref, 2>").unwrap();
        assert_eq!(ty.leaf_count(), 3);
    }
}
