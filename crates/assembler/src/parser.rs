//! Parser for BPL assembly lines → instruction trees.
//!
//! Each line is one instruction. Nested arguments follow the line that owns
//! them: `instructions` … `endInstructions` for blocks of `if`, `while` and
//! `block`, and `function:<signature>` … `end` for function literals.

use bpl_common::{Argument, Block, Function, Instruction, Opcode, Primitive, Signature, SlotRef, Type, Value};

use crate::error::AsmError;
use crate::lexer::{tokenize_type, Line, TypeToken};

const FUNCTION: &str = "function";
const END_FUNCTION: &str = "end";
const INSTRUCTIONS: &str = "instructions";
const END_INSTRUCTIONS: &str = "endInstructions";

/// Recursive descent over the significant lines of a source text.
pub(crate) struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(lines: Vec<Line<'a>>) -> Self {
        Self { lines, pos: 0 }
    }

    /// Parses every line as a top-level instruction.
    pub(crate) fn parse_program(mut self) -> Result<Vec<Instruction>, AsmError> {
        let mut instructions = Vec::new();
        while let Some(line) = self.next() {
            reject_structural(line)?;
            instructions.push(self.parse_instruction(line)?);
        }
        Ok(instructions)
    }

    fn next(&mut self) -> Option<Line<'a>> {
        let line = self.lines.get(self.pos).copied();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    /// Parses instructions up to the line `terminator`, which is consumed.
    fn parse_body(&mut self, opener: Line<'a>, terminator: &'static str) -> Result<Vec<Instruction>, AsmError> {
        let mut body = Vec::new();
        loop {
            let line = self.next().ok_or(AsmError::UnexpectedEnd {
                line: opener.number,
                expected: terminator,
            })?;
            if line.keyword == terminator {
                expect_no_operand(line)?;
                return Ok(body);
            }
            reject_structural(line)?;
            body.push(self.parse_instruction(line)?);
        }
    }

    fn parse_instruction(&mut self, line: Line<'a>) -> Result<Instruction, AsmError> {
        if line.keyword == FUNCTION {
            return self.parse_function(line);
        }

        let opcode = Opcode::from_mnemonic(line.keyword).ok_or_else(|| AsmError::UnknownOpcode {
            line: line.number,
            token: line.keyword.to_string(),
        })?;
        let mut args = match opcode {
            Opcode::Declare => {
                let text = operand(line, opcode, 1)?;
                vec![Argument::Type(parse_type(text, line.number)?)]
            }
            Opcode::GetRef => vec![Argument::Slot(parse_slot(line, opcode)?)],
            Opcode::Literal => vec![Argument::Literal(parse_literal(line, opcode)?)],
            Opcode::Terminate => match line.operand {
                Some(text) => vec![Argument::Literal(Value::Int64(parse_int(text, line.number)?))],
                None => Vec::new(),
            },
            Opcode::Grow => {
                let text = operand(line, opcode, 1)?;
                vec![Argument::Literal(Value::Int64(parse_int(text, line.number)?))]
            }
            Opcode::NonBlocking => {
                let text = operand(line, opcode, 1)?;
                vec![Argument::Literal(Value::Bool(parse_bool(text, line.number)?))]
            }
            _ => {
                expect_no_operand(line)?;
                Vec::new()
            }
        };

        if opcode.takes_blocks() {
            while let Some(opener) = self.peek().filter(|l| l.keyword == INSTRUCTIONS) {
                self.pos += 1;
                expect_no_operand(opener)?;
                let body = self.parse_body(opener, END_INSTRUCTIONS)?;
                args.push(Argument::Block(Block::new(body)));
            }
        }

        let instr = Instruction::new(opcode, args);
        instr.check_shape().map_err(|source| AsmError::Shape {
            line: line.number,
            source,
        })?;
        Ok(instr)
    }

    fn parse_function(&mut self, line: Line<'a>) -> Result<Instruction, AsmError> {
        let text = line.operand.ok_or(AsmError::MissingArgument {
            line: line.number,
            opcode: FUNCTION,
            expected: 1,
        })?;
        let signature = parse_signature(text, line.number)?;
        let body = self.parse_body(line, END_FUNCTION)?;
        Ok(Instruction::function(Function::new(signature, body)))
    }
}

/// Structural keywords are only valid where a parent expects them.
fn reject_structural(line: Line<'_>) -> Result<(), AsmError> {
    if matches!(line.keyword, INSTRUCTIONS | END_INSTRUCTIONS | END_FUNCTION) {
        return Err(AsmError::UnexpectedToken {
            line: line.number,
            token: line.keyword.to_string(),
        });
    }
    Ok(())
}

fn operand<'a>(line: Line<'a>, opcode: Opcode, expected: usize) -> Result<&'a str, AsmError> {
    line.operand.ok_or(AsmError::MissingArgument {
        line: line.number,
        opcode: opcode.mnemonic(),
        expected,
    })
}

fn expect_no_operand(line: Line<'_>) -> Result<(), AsmError> {
    match line.operand {
        Some(extra) => Err(AsmError::UnexpectedToken {
            line: line.number,
            token: extra.to_string(),
        }),
        None => Ok(()),
    }
}

/// `N`, `local:N` or `global:N`.
fn parse_slot(line: Line<'_>, opcode: Opcode) -> Result<SlotRef, AsmError> {
    let text = operand(line, opcode, 1)?;
    let (global, index) = match text.split_once(':') {
        Some(("global", index)) => (true, index),
        Some(("local", index)) => (false, index),
        Some((scope, _)) => {
            return Err(AsmError::UnexpectedToken {
                line: line.number,
                token: scope.to_string(),
            })
        }
        None => (false, text),
    };
    let index = index.trim().parse().map_err(|_| AsmError::InvalidNumber {
        line: line.number,
        token: index.trim().to_string(),
    })?;
    Ok(if global {
        SlotRef::global(index)
    } else {
        SlotRef::local(index)
    })
}

/// `kind:value`, e.g. `int64:42` or `char:\n`.
fn parse_literal(line: Line<'_>, opcode: Opcode) -> Result<Value, AsmError> {
    let text = operand(line, opcode, 2)?;
    let (kind, value) = text.split_once(':').ok_or(AsmError::MissingArgument {
        line: line.number,
        opcode: opcode.mnemonic(),
        expected: 2,
    })?;
    let value = value.trim();
    match Primitive::from_name(kind.trim()) {
        Some(Primitive::Int64) => parse_int(value, line.number).map(Value::Int64),
        Some(Primitive::Bool) => parse_bool(value, line.number).map(Value::Bool),
        Some(Primitive::Char) => parse_char(value, line.number).map(Value::Char),
        Some(Primitive::Double) => value
            .parse()
            .map(Value::Double)
            .map_err(|_| invalid_literal(line.number, "double", value)),
        Some(Primitive::Void) | None => Err(AsmError::UnknownType {
            line: line.number,
            token: kind.trim().to_string(),
        }),
    }
}

/// Decimal with optional sign, or `0x` hex giving the raw 64-bit pattern.
fn parse_int(text: &str, line: usize) -> Result<i64, AsmError> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok().map(|v| v as i64),
        None => text.parse().ok(),
    };
    parsed.ok_or_else(|| AsmError::InvalidNumber {
        line,
        token: text.to_string(),
    })
}

fn parse_bool(text: &str, line: usize) -> Result<bool, AsmError> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid_literal(line, "bool", text)),
    }
}

/// A single printable character, an escape (`\n`, `\t`, `\s`, `\0`, `\\`)
/// or a decimal byte code `#NN`. A lone `#` is the character itself.
pub(crate) fn parse_char(text: &str, line: usize) -> Result<u8, AsmError> {
    match text {
        "\\n" => Ok(b'\n'),
        "\\t" => Ok(b'\t'),
        "\\s" => Ok(b' '),
        "\\0" => Ok(0),
        "\\\\" => Ok(b'\\'),
        "#" => Ok(b'#'),
        _ => {
            if let Some(code) = text.strip_prefix('#') {
                return code.parse().map_err(|_| invalid_literal(line, "char", text));
            }
            match text.as_bytes() {
                [b] if b.is_ascii_graphic() => Ok(*b),
                _ => Err(invalid_literal(line, "char", text)),
            }
        }
    }
}

fn invalid_literal(line: usize, kind: &str, token: &str) -> AsmError {
    AsmError::InvalidLiteral {
        line,
        kind: kind.to_string(),
        token: token.to_string(),
    }
}

/// Parses a type descriptor.
pub(crate) fn parse_type(text: &str, line: usize) -> Result<Type, AsmError> {
    let mut parser = TypeParser {
        tokens: tokenize_type(text, line)?,
        pos: 0,
        line,
    };
    let ty = parser.ty()?;
    parser.expect_end()?;
    Ok(ty)
}

/// Parses `fn(...) -> T` into its signature.
fn parse_signature(text: &str, line: usize) -> Result<Signature, AsmError> {
    match parse_type(text, line)? {
        Type::Function(signature) => Ok(signature.as_ref().clone()),
        _ => Err(AsmError::UnexpectedToken {
            line,
            token: text.to_string(),
        }),
    }
}

struct TypeParser {
    tokens: Vec<TypeToken>,
    pos: usize,
    line: usize,
}

impl TypeParser {
    fn next(&mut self) -> Option<TypeToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&TypeToken> {
        self.tokens.get(self.pos)
    }

    fn unexpected(&self, token: TypeToken) -> AsmError {
        AsmError::UnexpectedToken {
            line: self.line,
            token: token.to_string(),
        }
    }

    fn end(&self, expected: &'static str) -> AsmError {
        AsmError::UnexpectedEnd {
            line: self.line,
            expected,
        }
    }

    fn type_error(&self, source: bpl_common::TypeError) -> AsmError {
        AsmError::Type {
            line: self.line,
            source,
        }
    }

    fn expect(&mut self, punct: &'static str) -> Result<(), AsmError> {
        match self.next() {
            Some(TypeToken::Punct(p)) if p == punct => Ok(()),
            Some(token) => Err(self.unexpected(token)),
            None => Err(self.end(punct)),
        }
    }

    fn expect_end(&mut self) -> Result<(), AsmError> {
        match self.next() {
            Some(token) => Err(self.unexpected(token)),
            None => Ok(()),
        }
    }

    fn ty(&mut self) -> Result<Type, AsmError> {
        let name = match self.next() {
            Some(TypeToken::Ident(name)) => name,
            Some(TypeToken::Punct("{")) => return self.composite(String::new()),
            Some(token) => return Err(self.unexpected(token)),
            None => return Err(self.end("a type")),
        };

        match name.as_str() {
            "ref" => Ok(Type::Reference),
            "ptr" => {
                self.expect("<")?;
                let pointee = self.ty()?;
                self.expect(">")?;
                Ok(Type::pointer(pointee))
            }
            "array" => {
                self.expect("<")?;
                let element = self.ty()?;
                self.expect(",")?;
                let count = match self.next() {
                    Some(TypeToken::Number(n)) => n,
                    Some(token) => return Err(self.unexpected(token)),
                    None => return Err(self.end("an array length")),
                };
                self.expect(">")?;
                Type::array(element, count).map_err(|e| self.type_error(e))
            }
            "fn" => {
                self.expect("(")?;
                let (params, names) = self.fields(")")?;
                match self.next() {
                    Some(TypeToken::Arrow) => {}
                    Some(token) => return Err(self.unexpected(token)),
                    None => return Err(self.end("->")),
                }
                let ret = self.ty()?;
                Signature::new(params, names, ret)
                    .map(Type::function)
                    .map_err(|e| self.type_error(e))
            }
            other => {
                if let Some(primitive) = Primitive::from_name(other) {
                    return Ok(primitive.into());
                }
                if self.peek() == Some(&TypeToken::Punct("{")) {
                    self.pos += 1;
                    return self.composite(name);
                }
                Err(AsmError::UnknownType {
                    line: self.line,
                    token: name,
                })
            }
        }
    }

    fn composite(&mut self, name: String) -> Result<Type, AsmError> {
        let (fields, names) = self.fields("}")?;
        Type::composite(name, fields, names).map_err(|e| self.type_error(e))
    }

    /// `T [name], ...` up to and including `close`.
    fn fields(&mut self, close: &'static str) -> Result<(Vec<Type>, Vec<String>), AsmError> {
        let mut types = Vec::new();
        let mut names = Vec::new();
        if self.peek() == Some(&TypeToken::Punct(close)) {
            self.pos += 1;
            return Ok((types, names));
        }
        loop {
            types.push(self.ty()?);
            if let Some(TypeToken::Ident(name)) = self.peek().cloned() {
                self.pos += 1;
                names.push(name);
            }
            match self.next() {
                Some(TypeToken::Punct(",")) => {}
                Some(TypeToken::Punct(p)) if p == close => return Ok((types, names)),
                Some(token) => return Err(self.unexpected(token)),
                None => return Err(self.end(close)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(text: &str) -> Result<Vec<Instruction>, AsmError> {
        Parser::new(tokenize(text)?).parse_program()
    }

    fn one(text: &str) -> Instruction {
        let mut instrs = parse(text).unwrap();
        assert_eq!(instrs.len(), 1);
        instrs.remove(0)
    }

    fn int() -> Type {
        Primitive::Int64.into()
    }

    #[test]
    fn parse_empty() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_no_operand_opcode() {
        assert_eq!(one("add"), Instruction::op(Opcode::Add));
    }

    #[test]
    fn no_operand_opcode_rejects_operand() {
        let err = parse("add:5").unwrap_err();
        assert_eq!(
            err,
            AsmError::UnexpectedToken {
                line: 1,
                token: "5".to_string()
            }
        );
    }

    #[test]
    fn parse_aliases() {
        assert_eq!(one("dereference"), Instruction::op(Opcode::Deref));
        assert_eq!(one("setThroughReference"), Instruction::op(Opcode::Set));
    }

    #[test]
    fn parse_slots() {
        assert_eq!(one("getRef:3"), Instruction::get_ref(SlotRef::local(3)));
        assert_eq!(one("getRef:local:3"), Instruction::get_ref(SlotRef::local(3)));
        assert_eq!(one("getRef:global:0"), Instruction::get_ref(SlotRef::global(0)));
    }

    #[test]
    fn slot_missing_argument() {
        let err = parse("getRef").unwrap_err();
        assert!(matches!(
            err,
            AsmError::MissingArgument {
                opcode: "getRef",
                expected: 1,
                ..
            }
        ));
    }

    #[test]
    fn slot_bad_scope() {
        assert!(matches!(
            parse("getRef:outer:1").unwrap_err(),
            AsmError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn parse_literals() {
        assert_eq!(one("literal:int64:-42"), Instruction::literal(Value::Int64(-42)));
        assert_eq!(one("literal:int64:0x2a"), Instruction::literal(Value::Int64(42)));
        assert_eq!(one("literal:bool:true"), Instruction::literal(Value::Bool(true)));
        assert_eq!(one("literal:double:1.5"), Instruction::literal(Value::Double(1.5)));
        assert_eq!(one("literal:char:A"), Instruction::literal(Value::Char(b'A')));
    }

    #[test]
    fn char_escapes() {
        assert_eq!(parse_char("\\n", 1).unwrap(), b'\n');
        assert_eq!(parse_char("\\t", 1).unwrap(), b'\t');
        assert_eq!(parse_char("\\s", 1).unwrap(), b' ');
        assert_eq!(parse_char("\\\\", 1).unwrap(), b'\\');
        assert_eq!(parse_char("#59", 1).unwrap(), b';');
        assert_eq!(parse_char("#", 1).unwrap(), b'#');
        assert_eq!(parse_char(":", 1).unwrap(), b':');
    }

    #[test]
    fn char_rejects_words() {
        assert!(matches!(
            parse_char("ab", 4).unwrap_err(),
            AsmError::InvalidLiteral { line: 4, .. }
        ));
        assert!(parse_char("#300", 4).is_err());
    }

    #[test]
    fn literal_unknown_kind() {
        assert_eq!(
            parse("literal:string:x").unwrap_err(),
            AsmError::UnknownType {
                line: 1,
                token: "string".to_string()
            }
        );
    }

    #[test]
    fn literal_without_kind() {
        assert!(matches!(
            parse("literal:42").unwrap_err(),
            AsmError::MissingArgument { expected: 2, .. }
        ));
    }

    #[test]
    fn bool_literal_rejects_other_words() {
        assert_eq!(
            parse("literal:bool:yes").unwrap_err(),
            AsmError::InvalidLiteral {
                line: 1,
                kind: "bool".to_string(),
                token: "yes".to_string()
            }
        );
    }

    #[test]
    fn parse_terminate_forms() {
        assert_eq!(one("terminate"), Instruction::terminate(None));
        assert_eq!(one("terminate:7"), Instruction::terminate(Some(7)));
    }

    #[test]
    fn parse_grow_and_non_blocking() {
        assert_eq!(one("grow:4096"), Instruction::grow(4096));
        assert_eq!(one("nonBlocking:true"), Instruction::non_blocking(true));
    }

    #[test]
    fn parse_primitive_types() {
        assert_eq!(parse_type("int64", 1).unwrap(), int());
        assert_eq!(parse_type("ref", 1).unwrap(), Type::Reference);
        assert_eq!(parse_type("ptr<char>", 1).unwrap(), Type::pointer(Primitive::Char.into()));
    }

    #[test]
    fn parse_composite_type() {
        let ty = parse_type("Pair{int64 a, array<char, 2> b}", 1).unwrap();
        let expected = Type::composite(
            "Pair",
            vec![int(), Type::array(Primitive::Char.into(), 2).unwrap()],
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap();
        assert_eq!(ty, expected);
        assert_eq!(ty.to_string(), "Pair{int64 a, array<char, 2> b}");
    }

    #[test]
    fn parse_function_type() {
        let ty = parse_type("fn(int64 a, bool b) -> void", 1).unwrap();
        assert_eq!(ty.to_string(), "fn(int64 a, bool b) -> void");
        let bare = parse_type("fn() -> int64", 1).unwrap();
        assert_eq!(bare.to_string(), "fn() -> int64");
    }

    #[test]
    fn unknown_type_name() {
        assert_eq!(
            parse_type("string", 6).unwrap_err(),
            AsmError::UnknownType {
                line: 6,
                token: "string".to_string()
            }
        );
    }

    #[test]
    fn zero_length_array_rejected() {
        assert!(matches!(
            parse_type("array<int64, 0>", 2).unwrap_err(),
            AsmError::Type { line: 2, .. }
        ));
    }

    #[test]
    fn empty_composite_rejected() {
        assert!(matches!(
            parse_type("Empty{}", 2).unwrap_err(),
            AsmError::Type { line: 2, .. }
        ));
    }

    #[test]
    fn oversized_declare_is_a_type_error() {
        let err = parse("add\ndeclare:array<int64, 4611686018427387904>\n").unwrap_err();
        assert_eq!(
            err,
            AsmError::Type {
                line: 2,
                source: bpl_common::TypeError::TooLarge {
                    ty: "array<int64, 4611686018427387904>".to_string()
                }
            }
        );
    }

    #[test]
    fn unterminated_type() {
        assert_eq!(
            parse_type("array<int64, 3", 1).unwrap_err(),
            AsmError::UnexpectedEnd {
                line: 1,
                expected: ">"
            }
        );
    }

    #[test]
    fn trailing_type_tokens() {
        assert!(matches!(
            parse_type("int64 int64", 1).unwrap_err(),
            AsmError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn parse_nested_blocks() {
        let text = "\
if
  instructions
    literal:bool:true
  endInstructions
  instructions
    literal:char:y
    printChar
  endInstructions
";
        let expected = Instruction::branch(
            vec![Instruction::literal(Value::Bool(true))],
            vec![
                Instruction::literal(Value::Char(b'y')),
                Instruction::op(Opcode::PrintChar),
            ],
            None,
        );
        assert_eq!(one(text), expected);
    }

    #[test]
    fn block_count_is_shape_checked() {
        let text = "while\n  instructions\n  endInstructions\n";
        assert!(matches!(
            parse(text).unwrap_err(),
            AsmError::Shape { line: 1, .. }
        ));
    }

    #[test]
    fn unclosed_block() {
        let text = "block\n  instructions\n    add\n";
        assert_eq!(
            parse(text).unwrap_err(),
            AsmError::UnexpectedEnd {
                line: 2,
                expected: "endInstructions"
            }
        );
    }

    #[test]
    fn stray_terminator() {
        assert_eq!(
            parse("add\nend\n").unwrap_err(),
            AsmError::UnexpectedToken {
                line: 2,
                token: "end".to_string()
            }
        );
    }

    #[test]
    fn parse_function_literal() {
        let text = "\
function:fn(int64 n) -> int64
  getRef:0
  dereference
  return
end
";
        let instr = one(text);
        let signature = Signature::new(vec![int()], vec!["n".to_string()], int()).unwrap();
        let expected = Instruction::function(Function::new(
            signature,
            vec![
                Instruction::get_ref(SlotRef::local(0)),
                Instruction::op(Opcode::Deref),
                Instruction::op(Opcode::Return),
            ],
        ));
        assert_eq!(instr, expected);
    }

    #[test]
    fn function_requires_signature_type() {
        assert!(matches!(
            parse("function:int64\nend\n").unwrap_err(),
            AsmError::UnexpectedToken { line: 1, .. }
        ));
    }

    #[test]
    fn unknown_opcode() {
        assert_eq!(
            parse("add\nfoobar\n").unwrap_err(),
            AsmError::UnknownOpcode {
                line: 2,
                token: "foobar".to_string()
            }
        );
    }
}
