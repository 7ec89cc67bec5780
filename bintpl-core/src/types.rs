//! Type descriptors: the primitive alias table, struct/enum descriptors,
//! and the array wrapper flag. See the data model: a type is one of
//! primitive numeric, string, struct, or any of those wrapped as an array.

use crate::ast::Block;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumKind {
    Int,
    Float,
}

/// A primitive numeric type: byte length, signedness, and whether it's
/// integral or floating point. `endian_code` resolves the two opaque host
/// tokens used to tag annotated ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveType {
    pub length: u8,
    pub signed: bool,
    pub kind: NumKind,
}

impl PrimitiveType {
    pub const fn int(length: u8, signed: bool) -> Self {
        Self {
            length,
            signed,
            kind: NumKind::Int,
        }
    }

    pub const fn float(length: u8) -> Self {
        Self {
            length,
            signed: true,
            kind: NumKind::Float,
        }
    }

    /// The opaque endian-code string passed to `Host::set_data_type`.
    pub fn endian_code(&self, big_endian: bool) -> &'static str {
        use NumKind::*;
        match (self.length, self.signed, self.kind, big_endian) {
            (1, true, Int, _) => "s8",
            (1, false, Int, _) => "u8",
            (2, true, Int, false) => "s16le",
            (2, true, Int, true) => "s16be",
            (2, false, Int, false) => "u16le",
            (2, false, Int, true) => "u16be",
            (4, true, Int, false) => "s32le",
            (4, true, Int, true) => "s32be",
            (4, false, Int, false) => "u32le",
            (4, false, Int, true) => "u32be",
            (8, true, Int, false) => "s64le",
            (8, true, Int, true) => "s64be",
            (8, false, Int, false) => "u64le",
            (8, false, Int, true) => "u64be",
            (4, _, Float, false) => "f32le",
            (4, _, Float, true) => "f32be",
            (8, _, Float, false) => "f64le",
            (8, _, Float, true) => "f64be",
            _ => unreachable!("invalid primitive type descriptor {:?}", self),
        }
    }

    /// The `unsigned TYPE` qualifier: flips signedness of an integral type.
    /// Floating point types have no unsigned form and are returned as-is.
    pub fn unsigned(self) -> Self {
        match self.kind {
            NumKind::Int => Self {
                signed: false,
                ..self
            },
            NumKind::Float => self,
        }
    }
}

/// A user struct: its declared parameters and the statements that, when
/// executed against a fresh struct frame, populate its members.
#[derive(Debug)]
pub struct StructDef {
    pub name: Option<String>,
    pub params: Vec<(String, TypeDescriptor)>,
    pub body: Rc<Block>,
}

/// A user enum: an underlying primitive type plus an ordered list of named
/// constant members.
#[derive(Debug)]
pub struct EnumDef {
    pub name: Option<String>,
    pub underlying: PrimitiveType,
    pub members: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub enum TypeBase {
    Primitive(PrimitiveType),
    String,
    Struct(Rc<StructDef>),
    Enum(Rc<EnumDef>),
}

impl PartialEq for TypeBase {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeBase::Primitive(a), TypeBase::Primitive(b)) => a == b,
            (TypeBase::String, TypeBase::String) => true,
            (TypeBase::Struct(a), TypeBase::Struct(b)) => Rc::ptr_eq(a, b),
            (TypeBase::Enum(a), TypeBase::Enum(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A fully resolved type: a base plus whether this particular binding is an
/// array of that base.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub base: TypeBase,
    pub is_array: bool,
}

impl TypeDescriptor {
    pub fn scalar(base: TypeBase) -> Self {
        Self {
            base,
            is_array: false,
        }
    }

    pub fn as_array(&self) -> Self {
        Self {
            base: self.base.clone(),
            is_array: true,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.base, TypeBase::Primitive(_) | TypeBase::Enum(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.base, TypeBase::Struct(_))
    }

    /// Size in bytes of one element of this type, if statically known.
    /// Structs have no static size (it depends on the data bound at
    /// instantiation time), so this only covers primitives/enums/strings.
    pub fn fixed_element_size(&self) -> Option<usize> {
        match &self.base {
            TypeBase::Primitive(p) => Some(p.length as usize),
            TypeBase::Enum(e) => Some(e.underlying.length as usize),
            TypeBase::String | TypeBase::Struct(_) => None,
        }
    }

    pub fn endian_code(&self, big_endian: bool) -> Option<&'static str> {
        match &self.base {
            TypeBase::Primitive(p) => Some(p.endian_code(big_endian)),
            TypeBase::Enum(e) => Some(e.underlying.endian_code(big_endian)),
            TypeBase::String | TypeBase::Struct(_) => None,
        }
    }
}

/// Resolves a bare identifier against the fixed alias table of §6. Returns
/// `None` for names that are not built-in primitive aliases (user structs,
/// enums and typedefs live in the type-name tables of each frame instead).
pub fn primitive_alias(name: &str) -> Option<PrimitiveType> {
    use NumKind::*;
    let p = |length, signed, kind| PrimitiveType {
        length,
        signed,
        kind,
    };
    Some(match name {
        "char" | "byte" | "CHAR" | "BYTE" => p(1, true, Int),
        "uchar" | "ubyte" | "UCHAR" | "UBYTE" => p(1, false, Int),
        "short" | "int16" | "SHORT" | "INT16" => p(2, true, Int),
        "ushort" | "uint16" | "USHORT" | "UINT16" | "WORD" => p(2, false, Int),
        "int" | "int32" | "long" | "INT" | "INT32" | "LONG" => p(4, true, Int),
        "uint" | "uint32" | "ulong" | "UINT" | "UINT32" | "ULONG" | "DWORD" => p(4, false, Int),
        "int64" | "quad" | "QUAD" | "INT64" | "__int64" => p(8, true, Int),
        "uint64" | "uquad" | "UQUAD" | "UINT64" | "QWORD" | "__uint64" => p(8, false, Int),
        "float" | "FLOAT" => p(4, true, Float),
        "double" | "DOUBLE" => p(8, true, Float),
        _ => return None,
    })
}
