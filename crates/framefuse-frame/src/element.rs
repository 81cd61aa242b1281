use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Fixed-width numeric element type of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    /// All supported element types.
    pub const ALL: [ElementType; 10] = [
        ElementType::I8,
        ElementType::U8,
        ElementType::I16,
        ElementType::U16,
        ElementType::I32,
        ElementType::U32,
        ElementType::I64,
        ElementType::U64,
        ElementType::F32,
        ElementType::F64,
    ];

    /// Size of one element in bytes.
    pub fn byte_width(self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Short lowercase name (`i16`, `f32`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::I8 => "i8",
            ElementType::U8 => "u8",
            ElementType::I16 => "i16",
            ElementType::U16 => "u16",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = FrameError;

    /// Accepts short names (`i16`) and long names (`int16`, `float32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "i8" | "int8" => ElementType::I8,
            "u8" | "uint8" => ElementType::U8,
            "i16" | "int16" => ElementType::I16,
            "u16" | "uint16" => ElementType::U16,
            "i32" | "int32" => ElementType::I32,
            "u32" | "uint32" => ElementType::U32,
            "i64" | "int64" => ElementType::I64,
            "u64" | "uint64" => ElementType::U64,
            "f32" | "float32" => ElementType::F32,
            "f64" | "float64" => ElementType::F64,
            _ => return Err(FrameError::UnknownElementType(s.to_string())),
        };
        Ok(ty)
    }
}
