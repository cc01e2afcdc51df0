//! Construction and shape errors for BPL type descriptors and instructions.

use thiserror::Error;

/// Errors raised while building or navigating a type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A composite type was declared with no fields.
    #[error("composite type '{name}' has no fields")]
    EmptyComposite { name: String },

    /// Field names were supplied but do not match the number of fields.
    #[error("composite type '{name}' has {fields} field(s) but {names} name(s)")]
    FieldNameCount {
        name: String,
        fields: usize,
        names: usize,
    },

    /// A repeated type was declared with zero cells.
    #[error("array of {element} has zero length")]
    EmptyArray { element: String },

    /// Parameter names were supplied but do not match the parameter types.
    #[error("signature has {params} parameter(s) but {names} name(s)")]
    ParamNameCount { params: usize, names: usize },

    /// The size or leaf count of a descriptor does not fit in `usize`.
    #[error("type {ty} is too large")]
    TooLarge { ty: String },

    /// A leaf index does not name any part of the value.
    #[error("leaf index {index} out of range for {ty} (leaf count {leaf_count})")]
    LeafOutOfRange {
        index: usize,
        ty: String,
        leaf_count: usize,
    },
}

/// Errors raised when an instruction's argument list has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// The instruction carries the wrong number of arguments.
    #[error("{opcode} expects {expected} argument(s), found {found}")]
    ArgumentCount {
        opcode: &'static str,
        expected: &'static str,
        found: usize,
    },

    /// An argument has the wrong kind.
    #[error("{opcode} argument {index} must be {expected}, found {found}")]
    ArgumentKind {
        opcode: &'static str,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A literal argument has the right kind but the wrong primitive type.
    #[error("{opcode} argument {index} must be a {expected} literal, found {found}")]
    LiteralType {
        opcode: &'static str,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}
