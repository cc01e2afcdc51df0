//! Disassembler: instruction tree → canonical assembly text.
//!
//! One instruction per line, nested arguments indented two spaces under
//! their owner, no comments, no blank lines.

use bpl_common::{Argument, Instruction, Opcode, Program, Value};

const INDENT: &str = "  ";

/// Disassemble a program into canonical assembly text.
///
/// The output reassembles to an equal program.
pub fn disassemble(program: &Program) -> String {
    let mut lines = Vec::new();
    write_block(&mut lines, &program.instructions, 0);

    let mut result = lines.join("\n");
    if !result.is_empty() {
        result.push('\n');
    }
    result
}

fn write_block(lines: &mut Vec<String>, instrs: &[Instruction], depth: usize) {
    for instr in instrs {
        write_instruction(lines, instr, depth);
    }
}

fn write_instruction(lines: &mut Vec<String>, instr: &Instruction, depth: usize) {
    let indent = INDENT.repeat(depth);

    if let [Argument::Function(function)] = instr.args.as_slice() {
        lines.push(format!("{indent}function:{}", function.signature));
        write_block(lines, &function.body, depth + 1);
        lines.push(format!("{indent}end"));
        return;
    }

    let mut head = instr.opcode.mnemonic().to_string();
    for arg in &instr.args {
        if let Some(text) = operand_text(instr.opcode, arg) {
            head.push(':');
            head.push_str(&text);
        }
    }
    lines.push(format!("{indent}{head}"));

    for arg in &instr.args {
        if let Argument::Block(block) = arg {
            lines.push(format!("{indent}{INDENT}instructions"));
            write_block(lines, block, depth + 2);
            lines.push(format!("{indent}{INDENT}endInstructions"));
        }
    }
}

fn operand_text(opcode: Opcode, arg: &Argument) -> Option<String> {
    match arg {
        Argument::Literal(value) if opcode == Opcode::Literal => {
            Some(format!("{}:{}", value.primitive().name(), value_text(value)))
        }
        Argument::Literal(value) => Some(value_text(value)),
        Argument::Type(ty) => Some(ty.to_string()),
        Argument::Slot(slot) if slot.global => Some(format!("global:{}", slot.index)),
        Argument::Slot(slot) => Some(slot.index.to_string()),
        Argument::Block(_) | Argument::Function(_) => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Int64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Char(c) => char_text(*c),
        Value::Double(v) => format!("{v:?}"),
    }
}

/// Canonical spelling of a char literal. Bytes that would be trimmed,
/// start a comment or read as an escape are written as `#NN`.
fn char_text(c: u8) -> String {
    match c {
        b'\n' => "\\n".to_string(),
        b'\t' => "\\t".to_string(),
        b' ' => "\\s".to_string(),
        b'\\' => "\\\\".to_string(),
        b'#' | b';' => format!("#{c}"),
        c if c.is_ascii_graphic() => char::from(c).to_string(),
        c => format!("#{c}"),
    }
}
