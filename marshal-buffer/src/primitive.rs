//! Primitive codec.
//!
//! Primitives are encoded little-endian at a fixed width and never need a
//! resolver:
//!
//! ```text
//! +--------+-------+-------+--------+-------+--------+-------+--------+
//! | bool   | i8/u8 | char16| i16/u16| i32   | u32    | f32   | i64/u64|
//! | 1 byte | 1     | 2     | 2      | 4     | 4      | 4     | 8      |
//! +--------+-------+-------+--------+-------+--------+-------+--------+
//! ```
//!
//! `f64` is 8 bytes. `isize` and `usize` are reserved: their width depends on
//! the host, so they are rejected wherever a type is validated.

use crate::error::BufferError;
use crate::identity::TypeIdentity;
use std::any::Any;
use std::fmt;

/// A UTF-16 code unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Char16(pub u16);

impl Char16 {
    /// Converts to a `char`, failing for unpaired surrogates.
    pub fn to_char(self) -> Option<char> {
        char::from_u32(self.0 as u32)
    }
}

impl TryFrom<char> for Char16 {
    type Error = char;

    /// Fails for characters outside the basic multilingual plane.
    fn try_from(c: char) -> Result<Self, Self::Error> {
        u16::try_from(c as u32).map(Char16).map_err(|_| c)
    }
}

impl fmt::Display for Char16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(c) => write!(f, "{}", c),
            None => write!(f, "\\u{{{:04x}}}", self.0),
        }
    }
}

/// The closed set of primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    UInt8,
    Char16,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 12] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Int8,
        PrimitiveKind::UInt8,
        PrimitiveKind::Char16,
        PrimitiveKind::Int16,
        PrimitiveKind::UInt16,
        PrimitiveKind::Int32,
        PrimitiveKind::UInt32,
        PrimitiveKind::Int64,
        PrimitiveKind::UInt64,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
    ];

    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Int8 | PrimitiveKind::UInt8 => 1,
            PrimitiveKind::Char16 | PrimitiveKind::Int16 | PrimitiveKind::UInt16 => 2,
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 | PrimitiveKind::Float32 => 4,
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 | PrimitiveKind::Float64 => 8,
        }
    }

    /// Classifies a type identity.
    ///
    /// Returns `Ok(None)` for non-primitive types and `ReservedType` for
    /// pointer-sized integers.
    pub fn classify(identity: TypeIdentity) -> Result<Option<PrimitiveKind>, BufferError> {
        if identity.is::<isize>() || identity.is::<usize>() {
            return Err(BufferError::ReservedType {
                type_name: identity.name(),
            });
        }

        let kind = if identity.is::<bool>() {
            PrimitiveKind::Bool
        } else if identity.is::<i8>() {
            PrimitiveKind::Int8
        } else if identity.is::<u8>() {
            PrimitiveKind::UInt8
        } else if identity.is::<Char16>() {
            PrimitiveKind::Char16
        } else if identity.is::<i16>() {
            PrimitiveKind::Int16
        } else if identity.is::<u16>() {
            PrimitiveKind::UInt16
        } else if identity.is::<i32>() {
            PrimitiveKind::Int32
        } else if identity.is::<u32>() {
            PrimitiveKind::UInt32
        } else if identity.is::<i64>() {
            PrimitiveKind::Int64
        } else if identity.is::<u64>() {
            PrimitiveKind::UInt64
        } else if identity.is::<f32>() {
            PrimitiveKind::Float32
        } else if identity.is::<f64>() {
            PrimitiveKind::Float64
        } else {
            return Ok(None);
        };

        Ok(Some(kind))
    }

    /// Identity of the Rust type backing this kind.
    pub fn identity(self) -> TypeIdentity {
        match self {
            PrimitiveKind::Bool => TypeIdentity::of::<bool>(),
            PrimitiveKind::Int8 => TypeIdentity::of::<i8>(),
            PrimitiveKind::UInt8 => TypeIdentity::of::<u8>(),
            PrimitiveKind::Char16 => TypeIdentity::of::<Char16>(),
            PrimitiveKind::Int16 => TypeIdentity::of::<i16>(),
            PrimitiveKind::UInt16 => TypeIdentity::of::<u16>(),
            PrimitiveKind::Int32 => TypeIdentity::of::<i32>(),
            PrimitiveKind::UInt32 => TypeIdentity::of::<u32>(),
            PrimitiveKind::Int64 => TypeIdentity::of::<i64>(),
            PrimitiveKind::UInt64 => TypeIdentity::of::<u64>(),
            PrimitiveKind::Float32 => TypeIdentity::of::<f32>(),
            PrimitiveKind::Float64 => TypeIdentity::of::<f64>(),
        }
    }

    /// Parses the short names used in shape lists (`i32`, `char16`, ...).
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        Some(match name {
            "bool" => PrimitiveKind::Bool,
            "i8" => PrimitiveKind::Int8,
            "u8" => PrimitiveKind::UInt8,
            "char16" => PrimitiveKind::Char16,
            "i16" => PrimitiveKind::Int16,
            "u16" => PrimitiveKind::UInt16,
            "i32" => PrimitiveKind::Int32,
            "u32" => PrimitiveKind::UInt32,
            "i64" => PrimitiveKind::Int64,
            "u64" => PrimitiveKind::UInt64,
            "f32" => PrimitiveKind::Float32,
            "f64" => PrimitiveKind::Float64,
            _ => return None,
        })
    }
}

/// A single primitive value tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Char16(Char16),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

impl PrimitiveValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveValue::Bool(_) => PrimitiveKind::Bool,
            PrimitiveValue::Int8(_) => PrimitiveKind::Int8,
            PrimitiveValue::UInt8(_) => PrimitiveKind::UInt8,
            PrimitiveValue::Char16(_) => PrimitiveKind::Char16,
            PrimitiveValue::Int16(_) => PrimitiveKind::Int16,
            PrimitiveValue::UInt16(_) => PrimitiveKind::UInt16,
            PrimitiveValue::Int32(_) => PrimitiveKind::Int32,
            PrimitiveValue::UInt32(_) => PrimitiveKind::UInt32,
            PrimitiveValue::Int64(_) => PrimitiveKind::Int64,
            PrimitiveValue::UInt64(_) => PrimitiveKind::UInt64,
            PrimitiveValue::Float32(_) => PrimitiveKind::Float32,
            PrimitiveValue::Float64(_) => PrimitiveKind::Float64,
        }
    }

    /// Writes exactly `kind().width()` bytes at the front of `dest`.
    ///
    /// The caller guarantees `dest` is at least that long.
    pub fn encode(&self, dest: &mut [u8]) {
        match *self {
            PrimitiveValue::Bool(v) => dest[0] = v as u8,
            PrimitiveValue::Int8(v) => dest[0] = v as u8,
            PrimitiveValue::UInt8(v) => dest[0] = v,
            PrimitiveValue::Char16(v) => dest[..2].copy_from_slice(&v.0.to_le_bytes()),
            PrimitiveValue::Int16(v) => dest[..2].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::UInt16(v) => dest[..2].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::Int32(v) => dest[..4].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::UInt32(v) => dest[..4].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::Int64(v) => dest[..8].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::UInt64(v) => dest[..8].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::Float32(v) => dest[..4].copy_from_slice(&v.to_le_bytes()),
            PrimitiveValue::Float64(v) => dest[..8].copy_from_slice(&v.to_le_bytes()),
        }
    }

    /// Reads exactly `kind.width()` bytes from the front of `src`.
    ///
    /// Any non-zero byte decodes as `true` for [`PrimitiveKind::Bool`].
    pub fn decode(kind: PrimitiveKind, src: &[u8]) -> PrimitiveValue {
        match kind {
            PrimitiveKind::Bool => PrimitiveValue::Bool(src[0] != 0),
            PrimitiveKind::Int8 => PrimitiveValue::Int8(src[0] as i8),
            PrimitiveKind::UInt8 => PrimitiveValue::UInt8(src[0]),
            PrimitiveKind::Char16 => PrimitiveValue::Char16(Char16(u16::from_le_bytes([
                src[0], src[1],
            ]))),
            PrimitiveKind::Int16 => PrimitiveValue::Int16(i16::from_le_bytes([src[0], src[1]])),
            PrimitiveKind::UInt16 => PrimitiveValue::UInt16(u16::from_le_bytes([src[0], src[1]])),
            PrimitiveKind::Int32 => {
                PrimitiveValue::Int32(i32::from_le_bytes([src[0], src[1], src[2], src[3]]))
            }
            PrimitiveKind::UInt32 => {
                PrimitiveValue::UInt32(u32::from_le_bytes([src[0], src[1], src[2], src[3]]))
            }
            PrimitiveKind::Int64 => PrimitiveValue::Int64(i64::from_le_bytes(array8(src))),
            PrimitiveKind::UInt64 => PrimitiveValue::UInt64(u64::from_le_bytes(array8(src))),
            PrimitiveKind::Float32 => {
                PrimitiveValue::Float32(f32::from_le_bytes([src[0], src[1], src[2], src[3]]))
            }
            PrimitiveKind::Float64 => PrimitiveValue::Float64(f64::from_le_bytes(array8(src))),
        }
    }

    /// Extracts a primitive of `kind` from a type-erased reference.
    pub fn from_any(kind: PrimitiveKind, value: &dyn Any) -> Option<PrimitiveValue> {
        Some(match kind {
            PrimitiveKind::Bool => PrimitiveValue::Bool(*value.downcast_ref::<bool>()?),
            PrimitiveKind::Int8 => PrimitiveValue::Int8(*value.downcast_ref::<i8>()?),
            PrimitiveKind::UInt8 => PrimitiveValue::UInt8(*value.downcast_ref::<u8>()?),
            PrimitiveKind::Char16 => PrimitiveValue::Char16(*value.downcast_ref::<Char16>()?),
            PrimitiveKind::Int16 => PrimitiveValue::Int16(*value.downcast_ref::<i16>()?),
            PrimitiveKind::UInt16 => PrimitiveValue::UInt16(*value.downcast_ref::<u16>()?),
            PrimitiveKind::Int32 => PrimitiveValue::Int32(*value.downcast_ref::<i32>()?),
            PrimitiveKind::UInt32 => PrimitiveValue::UInt32(*value.downcast_ref::<u32>()?),
            PrimitiveKind::Int64 => PrimitiveValue::Int64(*value.downcast_ref::<i64>()?),
            PrimitiveKind::UInt64 => PrimitiveValue::UInt64(*value.downcast_ref::<u64>()?),
            PrimitiveKind::Float32 => PrimitiveValue::Float32(*value.downcast_ref::<f32>()?),
            PrimitiveKind::Float64 => PrimitiveValue::Float64(*value.downcast_ref::<f64>()?),
        })
    }

    /// Boxes the inner value as its concrete Rust type.
    pub fn into_any(self) -> Box<dyn Any + Send> {
        match self {
            PrimitiveValue::Bool(v) => Box::new(v),
            PrimitiveValue::Int8(v) => Box::new(v),
            PrimitiveValue::UInt8(v) => Box::new(v),
            PrimitiveValue::Char16(v) => Box::new(v),
            PrimitiveValue::Int16(v) => Box::new(v),
            PrimitiveValue::UInt16(v) => Box::new(v),
            PrimitiveValue::Int32(v) => Box::new(v),
            PrimitiveValue::UInt32(v) => Box::new(v),
            PrimitiveValue::Int64(v) => Box::new(v),
            PrimitiveValue::UInt64(v) => Box::new(v),
            PrimitiveValue::Float32(v) => Box::new(v),
            PrimitiveValue::Float64(v) => Box::new(v),
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Bool(v) => write!(f, "{}", v),
            PrimitiveValue::Int8(v) => write!(f, "{}", v),
            PrimitiveValue::UInt8(v) => write!(f, "{}", v),
            PrimitiveValue::Char16(v) => write!(f, "{}", v),
            PrimitiveValue::Int16(v) => write!(f, "{}", v),
            PrimitiveValue::UInt16(v) => write!(f, "{}", v),
            PrimitiveValue::Int32(v) => write!(f, "{}", v),
            PrimitiveValue::UInt32(v) => write!(f, "{}", v),
            PrimitiveValue::Int64(v) => write!(f, "{}", v),
            PrimitiveValue::UInt64(v) => write!(f, "{}", v),
            PrimitiveValue::Float32(v) => write!(f, "{}", v),
            PrimitiveValue::Float64(v) => write!(f, "{}", v),
        }
    }
}

fn array8(src: &[u8]) -> [u8; 8] {
    [
        src[0], src[1], src[2], src[3], src[4], src[5], src[6], src[7],
    ]
}

/// Rust types that map onto a [`PrimitiveKind`].
pub trait Primitive: Copy + Any + Send + Sync {
    const KIND: PrimitiveKind;

    fn into_value(self) -> PrimitiveValue;

    fn from_value(value: PrimitiveValue) -> Option<Self>;
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$variant;

                fn into_value(self) -> PrimitiveValue {
                    PrimitiveValue::$variant(self)
                }

                fn from_value(value: PrimitiveValue) -> Option<Self> {
                    match value {
                        PrimitiveValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for PrimitiveValue {
                fn from(value: $ty) -> Self {
                    PrimitiveValue::$variant(value)
                }
            }
        )*
    };
}

impl_primitive! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    Char16 => Char16,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}
