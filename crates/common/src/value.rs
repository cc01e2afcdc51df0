//! Primitive literal values.
//!
//! A `Value` is what a `literal` instruction carries and what arithmetic
//! reads back off the stack. On the stack it is stored as little-endian
//! bytes in a slot sized by its [`Primitive`].

use std::fmt;

use crate::types::Primitive;

/// A primitive value.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    /// Signed 64-bit integer.
    Int64(i64),
    /// Boolean value.
    Bool(bool),
    /// Single byte character.
    Char(u8),
    /// IEEE 754 64-bit float.
    Double(f64),
}

// Doubles compare by bit pattern so that Value can implement Eq; a
// literal and the bytes read back from its slot are then always equal,
// NaN included.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    /// Returns the primitive type of this value.
    pub fn primitive(&self) -> Primitive {
        match self {
            Value::Int64(_) => Primitive::Int64,
            Value::Bool(_) => Primitive::Bool,
            Value::Char(_) => Primitive::Char,
            Value::Double(_) => Primitive::Double,
        }
    }

    /// The zero value of a primitive, or `None` for `void`.
    pub fn zero(primitive: Primitive) -> Option<Self> {
        match primitive {
            Primitive::Int64 => Some(Value::Int64(0)),
            Primitive::Bool => Some(Value::Bool(false)),
            Primitive::Char => Some(Value::Char(0)),
            Primitive::Double => Some(Value::Double(0.0)),
            Primitive::Void => None,
        }
    }

    /// Writes the stack representation into `out`, which must be exactly
    /// `self.primitive().size()` bytes long.
    pub fn write_bytes(&self, out: &mut [u8]) {
        match self {
            Value::Int64(v) => out.copy_from_slice(&v.to_le_bytes()),
            Value::Bool(v) => out[0] = u8::from(*v),
            Value::Char(v) => out[0] = *v,
            Value::Double(v) => out.copy_from_slice(&v.to_le_bytes()),
        }
    }

    /// Stack representation as an owned byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0; self.primitive().size()];
        self.write_bytes(&mut out);
        out
    }

    /// Decodes a value of type `primitive` from its stack bytes.
    ///
    /// Returns `None` for `void` or when `bytes` has the wrong length.
    /// Any non-zero byte reads back as `true`.
    pub fn from_bytes(primitive: Primitive, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != primitive.size() {
            return None;
        }
        match primitive {
            Primitive::Int64 => Some(Value::Int64(i64::from_le_bytes(bytes.try_into().ok()?))),
            Primitive::Bool => Some(Value::Bool(bytes[0] != 0)),
            Primitive::Char => Some(Value::Char(bytes[0])),
            Primitive::Double => Some(Value::Double(f64::from_le_bytes(bytes.try_into().ok()?))),
            Primitive::Void => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{}", char::from(*v).escape_default()),
            Value::Double(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        assert_eq!(Value::Int64(42).primitive(), Primitive::Int64);
        assert_eq!(Value::Bool(true).primitive(), Primitive::Bool);
        assert_eq!(Value::Char(b'a').primitive(), Primitive::Char);
        assert_eq!(Value::Double(1.5).primitive(), Primitive::Double);
    }

    #[test]
    fn byte_width_matches_primitive_size() {
        for v in [
            Value::Int64(-7),
            Value::Bool(true),
            Value::Char(b'x'),
            Value::Double(2.5),
        ] {
            assert_eq!(v.to_bytes().len(), v.primitive().size(), "{v:?}");
        }
    }

    #[test]
    fn int64_is_little_endian() {
        assert_eq!(Value::Int64(0x0102).to_bytes(), vec![2, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn decode_negative_int() {
        let bytes = Value::Int64(-13).to_bytes();
        assert_eq!(
            Value::from_bytes(Primitive::Int64, &bytes),
            Some(Value::Int64(-13))
        );
    }

    #[test]
    fn decode_rejects_wrong_width() {
        assert_eq!(Value::from_bytes(Primitive::Int64, &[0; 4]), None);
        assert_eq!(Value::from_bytes(Primitive::Void, &[]), None);
    }

    #[test]
    fn nonzero_byte_is_true() {
        assert_eq!(Value::from_bytes(Primitive::Bool, &[7]), Some(Value::Bool(true)));
    }

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(Primitive::Int64), Some(Value::Int64(0)));
        assert_eq!(Value::zero(Primitive::Char), Some(Value::Char(0)));
        assert_eq!(Value::zero(Primitive::Void), None);
    }

    #[test]
    fn equality_double_bitwise_nan() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    }

    #[test]
    fn equality_different_types() {
        assert_ne!(Value::Int64(1), Value::Bool(true));
        assert_ne!(Value::Char(65), Value::Int64(65));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int64(-3).to_string(), "-3");
        assert_eq!(Value::Char(b'\n').to_string(), "\\n");
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
    }
}
