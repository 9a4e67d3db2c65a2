//! Scalar kind enumeration shared by the type-name parser and the walker

use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaf scalar kinds understood by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

/// Encoder-side carrier a scalar value is widened to before emission.
///
/// The binary value model's smallest signed integer may be narrower than
/// an unsigned source of the same width, so unsigned 32-bit values are
/// promoted to the 64-bit signed carrier instead of the 32-bit one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Boolean,
    Int,
    Long,
    Float,
    Double,
}

impl ScalarKind {
    /// Size in bytes of one stored value
    pub fn byte_size(&self) -> usize {
        match self {
            ScalarKind::Bool | ScalarKind::I8 | ScalarKind::U8 => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::U64 | ScalarKind::F64 => 8,
        }
    }

    /// Check if this is a signed integer kind
    pub fn is_signed_int(&self) -> bool {
        matches!(
            self,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64
        )
    }

    /// Check if this is an unsigned integer kind
    pub fn is_unsigned_int(&self) -> bool {
        matches!(
            self,
            ScalarKind::U8 | ScalarKind::U16 | ScalarKind::U32 | ScalarKind::U64
        )
    }

    /// Check if this is a floating point kind
    pub fn is_float(&self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    /// Carrier the value is widened to before it reaches an encoder.
    ///
    /// u32 does not fit the 32-bit signed carrier; u64 rides the 64-bit
    /// carrier with its bit pattern preserved.
    pub fn carrier(&self) -> Carrier {
        match self {
            ScalarKind::Bool => Carrier::Boolean,
            ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 => Carrier::Int,
            ScalarKind::U8 | ScalarKind::U16 => Carrier::Int,
            ScalarKind::I64 | ScalarKind::U32 | ScalarKind::U64 => Carrier::Long,
            ScalarKind::F32 => Carrier::Float,
            ScalarKind::F64 => Carrier::Double,
        }
    }

    /// Canonical short name for display and debug output
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }

    /// Primitive type name used in the emitted schema document
    pub fn schema_name(&self) -> &'static str {
        match self.carrier() {
            Carrier::Boolean => "boolean",
            Carrier::Int => "int",
            Carrier::Long => "long",
            Carrier::Float => "float",
            Carrier::Double => "double",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
