//! Runtime values: the polymorphic cell described in the data model,
//! specialized into five concrete shapes. `Handle` is the shared,
//! interior-mutable reference every path expression resolves to, so that
//! re-reading a file-backed variable re-reads through the host rather than
//! returning a stale, copied value.

use crate::error::{Location, TemplateError};
use crate::host::Host;
use crate::types::{PrimitiveType, TypeDescriptor};
use std::cell::RefCell;
use std::rc::Rc;

pub type Handle = Rc<RefCell<Value>>;

/// The "get()" result of a leaf value: a number or a string, never an
/// aggregate (structs/arrays are traversed by path, not read as a scalar).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn as_i64(&self, loc: &Location) -> Result<i64, TemplateError> {
        match self {
            Scalar::Int(i) => Ok(*i),
            Scalar::Float(f) => Ok(*f as i64),
            Scalar::Str(_) => Err(TemplateError::TypeMismatch {
                message: "expected a number, found a string".into(),
                location: loc.clone(),
            }),
        }
    }

    pub fn truthy(&self, loc: &Location) -> Result<bool, TemplateError> {
        Ok(self.as_i64(loc)? != 0)
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One member of a struct value, or one element of an array value.
pub type Member = (String, TypeDescriptor, Handle);

pub enum Value {
    /// In-memory, immutable: literals and expression results.
    Constant(Scalar),
    /// In-memory, read/write: `local` variables.
    Mutable(Scalar),
    /// Lazily read through the host at a fixed offset.
    FileBacked {
        offset: u64,
        prim: PrimitiveType,
        big_endian: bool,
    },
    /// An ordered mapping from member name to its type and value handle.
    Struct(Vec<Member>),
    /// An ordered sequence of element handles.
    Array(Vec<Handle>),
}

impl Value {
    pub fn get(&self, host: &mut dyn Host, loc: &Location) -> Result<Scalar, TemplateError> {
        match self {
            Value::Constant(s) | Value::Mutable(s) => Ok(s.clone()),
            Value::FileBacked {
                offset,
                prim,
                big_endian,
            } => read_primitive(host, *offset, *prim, *big_endian, loc),
            Value::Struct(_) | Value::Array(_) => Err(TemplateError::TypeMismatch {
                message: "cannot use an aggregate (struct/array) value as a number or string"
                    .into(),
                location: loc.clone(),
            }),
        }
    }

    pub fn set(&mut self, new: Scalar, loc: &Location) -> Result<(), TemplateError> {
        match self {
            Value::Mutable(s) => {
                *s = new;
                Ok(())
            }
            Value::Constant(_) => Err(TemplateError::AssignmentToConstant {
                location: loc.clone(),
            }),
            Value::FileBacked { .. } => Err(TemplateError::AssignmentToFileVariable {
                location: loc.clone(),
            }),
            Value::Struct(_) | Value::Array(_) => Err(TemplateError::AssignmentToConstant {
                location: loc.clone(),
            }),
        }
    }

    pub fn as_struct(&self) -> Option<&[Member]> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Handle]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

fn read_primitive(
    host: &mut dyn Host,
    offset: u64,
    prim: PrimitiveType,
    big_endian: bool,
    loc: &Location,
) -> Result<Scalar, TemplateError> {
    let len = prim.length as usize;
    let bytes = host.read_data(offset, len);
    if bytes.len() < len {
        log::warn!("short read at offset {offset}: wanted {len} byte(s), host returned {}", bytes.len());
        return Err(TemplateError::EndOfBuffer {
            location: loc.clone(),
        });
    }
    Ok(decode(&bytes[..len], prim, big_endian))
}

/// Decode `len` bytes of a primitive type's wire representation into a
/// scalar, honoring the current endianness.
pub fn decode(bytes: &[u8], prim: PrimitiveType, big_endian: bool) -> Scalar {
    use crate::types::NumKind;
    macro_rules! int_arm {
        ($ty:ty) => {{
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            buf.copy_from_slice(bytes);
            let v = if big_endian {
                <$ty>::from_be_bytes(buf)
            } else {
                <$ty>::from_le_bytes(buf)
            };
            Scalar::Int(v as i64)
        }};
    }
    match (prim.kind, prim.length, prim.signed) {
        (NumKind::Int, 1, true) => int_arm!(i8),
        (NumKind::Int, 1, false) => int_arm!(u8),
        (NumKind::Int, 2, true) => int_arm!(i16),
        (NumKind::Int, 2, false) => int_arm!(u16),
        (NumKind::Int, 4, true) => int_arm!(i32),
        (NumKind::Int, 4, false) => int_arm!(u32),
        (NumKind::Int, 8, true) => int_arm!(i64),
        (NumKind::Int, 8, false) => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            let v = if big_endian {
                u64::from_be_bytes(buf)
            } else {
                u64::from_le_bytes(buf)
            };
            Scalar::Int(v as i64)
        }
        (NumKind::Float, 4, _) => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            let v = if big_endian {
                f32::from_be_bytes(buf)
            } else {
                f32::from_le_bytes(buf)
            };
            Scalar::Float(v as f64)
        }
        (NumKind::Float, 8, _) => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            let v = if big_endian {
                f64::from_be_bytes(buf)
            } else {
                f64::from_le_bytes(buf)
            };
            Scalar::Float(v)
        }
        _ => unreachable!("invalid primitive type {:?}", prim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    #[test]
    fn decode_little_and_big_endian() {
        let le = decode(&[0x01, 0x00, 0x00, 0x00], PrimitiveType::int(4, false), false);
        assert_eq!(le, Scalar::Int(1));
        let be = decode(&[0x00, 0x00, 0x00, 0x01], PrimitiveType::int(4, false), true);
        assert_eq!(be, Scalar::Int(1));
    }

    #[test]
    fn decode_signed_negative() {
        let v = decode(&[0xff], PrimitiveType::int(1, true), false);
        assert_eq!(v, Scalar::Int(-1));
    }
}
