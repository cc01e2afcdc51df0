//! Error types for the BPL assembler.

use bpl_common::{ShapeError, TypeError};
use thiserror::Error;

/// Errors produced while assembling text into a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    /// An unrecognized opcode mnemonic was encountered.
    #[error("line {line}: unknown opcode '{token}'")]
    UnknownOpcode { line: usize, token: String },

    /// A type name that is neither a primitive nor followed by a field list.
    #[error("line {line}: unknown type '{token}'")]
    UnknownType { line: usize, token: String },

    /// An opcode did not have enough arguments.
    #[error("line {line}: {opcode} expects {expected} argument(s)")]
    MissingArgument {
        line: usize,
        opcode: &'static str,
        expected: usize,
    },

    /// A numeric literal could not be parsed or is out of range.
    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    /// A literal value does not parse as its declared kind.
    #[error("line {line}: invalid {kind} literal '{token}'")]
    InvalidLiteral {
        line: usize,
        kind: String,
        token: String,
    },

    /// A token appeared where it was not expected.
    #[error("line {line}: unexpected token '{token}'")]
    UnexpectedToken { line: usize, token: String },

    /// Input ended inside a nested block or a type.
    #[error("line {line}: unexpected end of input, expected {expected}")]
    UnexpectedEnd { line: usize, expected: &'static str },

    /// A type descriptor was rejected on construction.
    #[error("line {line}: {source}")]
    Type { line: usize, source: TypeError },

    /// An instruction was assembled with the wrong argument shape.
    #[error("line {line}: {source}")]
    Shape { line: usize, source: ShapeError },
}

impl AsmError {
    /// Source line the error refers to (1-based).
    pub fn line(&self) -> usize {
        match self {
            AsmError::UnknownOpcode { line, .. }
            | AsmError::UnknownType { line, .. }
            | AsmError::MissingArgument { line, .. }
            | AsmError::InvalidNumber { line, .. }
            | AsmError::InvalidLiteral { line, .. }
            | AsmError::UnexpectedToken { line, .. }
            | AsmError::UnexpectedEnd { line, .. }
            | AsmError::Type { line, .. }
            | AsmError::Shape { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unknown_opcode() {
        let e = AsmError::UnknownOpcode {
            line: 3,
            token: "foo".to_string(),
        };
        assert_eq!(e.to_string(), "line 3: unknown opcode 'foo'");
    }

    #[test]
    fn error_display_unknown_type() {
        let e = AsmError::UnknownType {
            line: 5,
            token: "string".to_string(),
        };
        assert_eq!(e.to_string(), "line 5: unknown type 'string'");
    }

    #[test]
    fn error_display_missing_argument() {
        let e = AsmError::MissingArgument {
            line: 7,
            opcode: "getRef",
            expected: 1,
        };
        assert_eq!(e.to_string(), "line 7: getRef expects 1 argument(s)");
    }

    #[test]
    fn error_display_invalid_literal() {
        let e = AsmError::InvalidLiteral {
            line: 2,
            kind: "bool".to_string(),
            token: "yes".to_string(),
        };
        assert_eq!(e.to_string(), "line 2: invalid bool literal 'yes'");
    }

    #[test]
    fn error_display_unexpected_end() {
        let e = AsmError::UnexpectedEnd {
            line: 4,
            expected: "endInstructions",
        };
        assert_eq!(
            e.to_string(),
            "line 4: unexpected end of input, expected endInstructions"
        );
    }

    #[test]
    fn error_display_wraps_type_error() {
        let e = AsmError::Type {
            line: 9,
            source: TypeError::EmptyArray {
                element: "int64".to_string(),
            },
        };
        assert_eq!(e.to_string(), "line 9: array of int64 has zero length");
    }

    #[test]
    fn line_accessor() {
        let e = AsmError::Shape {
            line: 12,
            source: ShapeError::ArgumentCount {
                opcode: "if",
                expected: "2 or 3",
                found: 1,
            },
        };
        assert_eq!(e.line(), 12);
    }
}
