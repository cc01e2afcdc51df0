//! Type descriptors for values that live on the BPL stack.
//!
//! Every descriptor knows its byte size and its *leaf count*: the number of
//! integer indices needed to name the value and each of its parts. Index 0
//! always names the whole value; indices `1..leaf_count` walk into fields
//! and array cells in declaration order, depth first.
//!
//! ```text
//! Pair{int64 a, array<char, 2> b}
//!   leaf 0  Pair          offset 0
//!   leaf 1  a   int64     offset 0
//!   leaf 2  b   array     offset 8
//!   leaf 3  b[0] char     offset 8
//!   leaf 4  b[1] char     offset 9
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::TypeError;

/// Size in bytes of a reference value and of a function handle.
pub const WORD_SIZE: usize = 8;

/// Size in bytes of a raw pointer value.
pub const POINTER_SIZE: usize = std::mem::size_of::<usize>();

/// Leaf types. The set is closed, so two primitives are the same type
/// exactly when they are the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Signed 64-bit integer.
    Int64,
    /// Boolean, one byte (0 or 1).
    Bool,
    /// Single byte character.
    Char,
    /// IEEE 754 64-bit float.
    Double,
    /// Zero-size type, used as the return type of procedures.
    Void,
}

/// All primitive types, in catalog order.
pub const ALL_PRIMITIVES: [Primitive; 5] = [
    Primitive::Int64,
    Primitive::Bool,
    Primitive::Char,
    Primitive::Double,
    Primitive::Void,
];

impl Primitive {
    /// Returns the source name of this primitive.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Int64 => "int64",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Primitive::Int64 | Primitive::Double => 8,
            Primitive::Bool | Primitive::Char => 1,
            Primitive::Void => 0,
        }
    }

    /// Looks a primitive up by its source name.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_PRIMITIVES.iter().find(|p| p.name() == name).copied()
    }
}

/// A type descriptor.
///
/// Nested descriptors are shared behind [`Arc`], so cloning a `Type` is
/// cheap and a named composite can be referenced from many places.
#[derive(Debug, Clone)]
pub enum Type {
    /// A leaf type.
    Primitive(Primitive),
    /// Fixed heterogeneous layout (struct).
    Composite(Arc<CompositeType>),
    /// Fixed homogeneous layout (array).
    Array(Arc<ArrayType>),
    /// Raw address-sized value. Does not own storage for its pointee.
    Pointer(Arc<Type>),
    /// Callable value; stored on the stack as an opaque body handle.
    Function(Arc<Signature>),
    /// Names exactly one stack slot.
    Reference,
}

/// A resolved sub-element: the descriptor found at a leaf index and the
/// byte offset where its storage begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Descriptor of the sub-element.
    pub ty: Type,
    /// Absolute byte offset of the sub-element.
    pub offset: usize,
}

impl From<Primitive> for Type {
    fn from(p: Primitive) -> Self {
        Type::Primitive(p)
    }
}

impl Type {
    /// Builds a composite type. See [`CompositeType::new`].
    pub fn composite(
        name: impl Into<String>,
        fields: Vec<Type>,
        field_names: Vec<String>,
    ) -> Result<Self, TypeError> {
        CompositeType::new(name, fields, field_names).map(|c| Type::Composite(Arc::new(c)))
    }

    /// Builds an array type. See [`ArrayType::new`].
    pub fn array(element: Type, count: usize) -> Result<Self, TypeError> {
        ArrayType::new(element, count).map(|a| Type::Array(Arc::new(a)))
    }

    /// Builds a pointer to `pointee`.
    pub fn pointer(pointee: Type) -> Self {
        Type::Pointer(Arc::new(pointee))
    }

    /// Wraps a signature.
    pub fn function(signature: Signature) -> Self {
        Type::Function(Arc::new(signature))
    }

    /// Byte size of a value of this type.
    pub fn size(&self) -> usize {
        match self {
            Type::Primitive(p) => p.size(),
            Type::Composite(c) => c.size,
            Type::Array(a) => a.size,
            Type::Pointer(_) => POINTER_SIZE,
            Type::Function(_) | Type::Reference => WORD_SIZE,
        }
    }

    /// Number of leaf indices the value occupies, including index 0.
    pub fn leaf_count(&self) -> usize {
        match self {
            Type::Composite(c) => c.leaf_count,
            Type::Array(a) => a.leaf_count,
            _ => 1,
        }
    }

    /// Returns the primitive if this is a leaf type.
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// True if this is exactly the given primitive.
    pub fn is(&self, primitive: Primitive) -> bool {
        self.primitive() == Some(primitive)
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Type::Primitive(p) => p.name(),
            Type::Composite(_) => "struct",
            Type::Array(_) => "array",
            Type::Pointer(_) => "pointer",
            Type::Function(_) => "function",
            Type::Reference => "reference",
        }
    }

    /// Recursively checks the construction invariants.
    pub fn is_valid(&self) -> bool {
        match self {
            Type::Primitive(_) | Type::Reference => true,
            Type::Composite(c) => c.is_valid(),
            Type::Array(a) => a.count > 0 && a.element.is_valid(),
            Type::Pointer(p) => p.is_valid(),
            Type::Function(s) => s.is_valid(),
        }
    }

    /// True if a value of type `other` may be stored into a slot of this type.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        self == other
    }

    /// Array identity check. With `ignore_count`, two arrays match when
    /// their element types are equal, whatever their lengths. Non-array
    /// types fall back to plain equality.
    pub fn is_array_compatible(&self, other: &Type, ignore_count: bool) -> bool {
        match (self, other) {
            (Type::Array(a), Type::Array(b)) if ignore_count => a.element == b.element,
            _ => self == other,
        }
    }

    /// Finds the sub-element named by `leaf` inside a value of this type
    /// whose storage begins at `offset`.
    ///
    /// Each hop into a composite is a binary search over field leaf ranges,
    /// each hop into an array is a division, so the cost is logarithmic in
    /// the number of fields per level.
    pub fn resolve(&self, leaf: usize, offset: usize) -> Result<Resolved, TypeError> {
        let mut ty = self;
        let mut leaf = leaf;
        let mut offset = offset;

        loop {
            if leaf == 0 {
                return Ok(Resolved {
                    ty: ty.clone(),
                    offset,
                });
            }
            match ty {
                Type::Composite(c) if leaf < c.leaf_count => {
                    let field = c.locate(leaf);
                    offset += c.offsets[field];
                    leaf -= c.leaf_starts[field];
                    ty = &c.fields[field];
                }
                Type::Array(a) if leaf < a.leaf_count => {
                    let per_cell = a.element.leaf_count();
                    let cell = (leaf - 1) / per_cell;
                    offset += cell * a.element.size();
                    leaf = (leaf - 1) % per_cell;
                    ty = &a.element;
                }
                _ => {
                    return Err(TypeError::LeafOutOfRange {
                        index: leaf,
                        ty: ty.to_string(),
                        leaf_count: ty.leaf_count(),
                    })
                }
            }
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (Type::Composite(a), Type::Composite(b)) => Arc::ptr_eq(a, b) || a.fields == b.fields,
            (Type::Array(a), Type::Array(b)) => {
                Arc::ptr_eq(a, b) || (a.count == b.count && a.element == b.element)
            }
            (Type::Pointer(a), Type::Pointer(b)) => a == b,
            (Type::Function(a), Type::Function(b)) => Arc::ptr_eq(a, b) || a.as_ref() == b.as_ref(),
            (Type::Reference, Type::Reference) => true,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Composite(c) => {
                write!(f, "{}{{", c.name)?;
                write_fields(f, &c.fields, &c.field_names)?;
                f.write_str("}")
            }
            Type::Array(a) => write!(f, "array<{}, {}>", a.element, a.count),
            Type::Pointer(p) => write!(f, "ptr<{p}>"),
            Type::Function(s) => write!(f, "{s}"),
            Type::Reference => f.write_str("ref"),
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, types: &[Type], names: &[String]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
        if let Some(name) = names.get(i) {
            write!(f, " {name}")?;
        }
    }
    Ok(())
}

/// Struct-like layout. Field sizes, offsets and leaf ranges are computed
/// once, when the descriptor is built.
#[derive(Debug, Clone)]
pub struct CompositeType {
    name: String,
    fields: Vec<Type>,
    field_names: Vec<String>,
    offsets: Vec<usize>,
    /// Leaf index of each field relative to the composite; the first is 1.
    leaf_starts: Vec<usize>,
    size: usize,
    leaf_count: usize,
}

impl CompositeType {
    /// Builds a composite from its fields.
    ///
    /// `field_names` is either empty (anonymous fields) or holds exactly one
    /// name per field. A composite must have at least one field.
    pub fn new(
        name: impl Into<String>,
        fields: Vec<Type>,
        field_names: Vec<String>,
    ) -> Result<Self, TypeError> {
        let name = name.into();
        if fields.is_empty() {
            return Err(TypeError::EmptyComposite { name });
        }
        if !field_names.is_empty() && field_names.len() != fields.len() {
            return Err(TypeError::FieldNameCount {
                name,
                fields: fields.len(),
                names: field_names.len(),
            });
        }

        let mut offsets = Vec::with_capacity(fields.len());
        let mut leaf_starts = Vec::with_capacity(fields.len());
        let mut size: usize = 0;
        let mut leaf: usize = 1;
        for field in &fields {
            offsets.push(size);
            leaf_starts.push(leaf);
            let (Some(next_size), Some(next_leaf)) = (
                size.checked_add(field.size()),
                leaf.checked_add(field.leaf_count()),
            ) else {
                return Err(TypeError::TooLarge {
                    ty: format!("'{name}'"),
                });
            };
            size = next_size;
            leaf = next_leaf;
        }

        Ok(Self {
            name,
            fields,
            field_names,
            offsets,
            leaf_starts,
            size,
            leaf_count: leaf,
        })
    }

    /// Type name; may be empty for anonymous composites.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptors in declaration order.
    pub fn fields(&self) -> &[Type] {
        &self.fields
    }

    /// Field names; empty when the fields are anonymous.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Byte offset of field `index` relative to the start of the value.
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Leaf index of field `index` relative to the value's own index.
    pub fn leaf_of(&self, index: usize) -> Option<usize> {
        self.leaf_starts.get(index).copied()
    }

    /// Position of the field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|n| n == name)
    }

    /// Index of the field whose leaf range contains `leaf` (`1..leaf_count`).
    fn locate(&self, leaf: usize) -> usize {
        self.leaf_starts.partition_point(|&start| start <= leaf) - 1
    }

    fn is_valid(&self) -> bool {
        !self.fields.is_empty()
            && (self.field_names.is_empty() || self.field_names.len() == self.fields.len())
            && self.fields.iter().all(Type::is_valid)
    }
}

/// Array-like layout: `count` cells of one element type.
#[derive(Debug, Clone)]
pub struct ArrayType {
    element: Type,
    count: usize,
    size: usize,
    leaf_count: usize,
}

impl ArrayType {
    /// Builds an array of `count` cells. `count` must be non-zero.
    pub fn new(element: Type, count: usize) -> Result<Self, TypeError> {
        if count == 0 {
            return Err(TypeError::EmptyArray {
                element: element.to_string(),
            });
        }
        let size = element.size().checked_mul(count);
        let leaf_count = element
            .leaf_count()
            .checked_mul(count)
            .and_then(|n| n.checked_add(1));
        let (Some(size), Some(leaf_count)) = (size, leaf_count) else {
            return Err(TypeError::TooLarge {
                ty: format!("array<{element}, {count}>"),
            });
        };
        Ok(Self {
            element,
            count,
            size,
            leaf_count,
        })
    }

    /// Cell type.
    pub fn element(&self) -> &Type {
        &self.element
    }

    /// Number of cells.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Contract of a callable: parameter types and names, and return type.
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<Type>,
    param_names: Vec<String>,
    ret: Type,
}

impl Signature {
    /// Builds a signature. `param_names` is empty or matches `params`.
    pub fn new(params: Vec<Type>, param_names: Vec<String>, ret: Type) -> Result<Self, TypeError> {
        if !param_names.is_empty() && param_names.len() != params.len() {
            return Err(TypeError::ParamNameCount {
                params: params.len(),
                names: param_names.len(),
            });
        }
        Ok(Self {
            params,
            param_names,
            ret,
        })
    }

    /// Parameter types in order.
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// Parameter names; empty when unnamed.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Return type; `void` for procedures.
    pub fn ret(&self) -> &Type {
        &self.ret
    }

    /// True if calls yield no value.
    pub fn returns_void(&self) -> bool {
        self.ret.is(Primitive::Void)
    }

    fn is_valid(&self) -> bool {
        (self.param_names.is_empty() || self.param_names.len() == self.params.len())
            && self.params.iter().all(Type::is_valid)
            && self.ret.is_valid()
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.ret == other.ret
    }
}

impl Eq for Signature {}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        write_fields(f, &self.params, &self.param_names)?;
        write!(f, ") -> {}", self.ret)
    }
}
